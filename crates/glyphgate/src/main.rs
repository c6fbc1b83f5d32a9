//! # Glyphgate service
//!
//! Serves the event API, runs the expiry sweeper and shuts both down on
//! Ctrl+C.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use glyphgate::config::AppConfig;
use glyphgate::routes;
use glyphgate::state::AppState;
use glyphgate::sweeper::sweeper_worker;

/// Glyphgate - emoji captcha for group chats
#[derive(Parser, Debug)]
#[command(name = "glyphgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/glyphgate.toml")]
    config: PathBuf,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Glyph directory (overrides config)
    #[arg(long, env = "GLYPH_DIR")]
    glyph_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Glyphgate v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args.config)?.with_overrides(args.listen, args.glyph_dir);
    info!(path = ?args.config, "Configuration loaded");

    let state = AppState::new(config.clone())?;

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let sweeper = Arc::new(state.sweeper());
    let sweeper_shutdown = shutdown_tx.subscribe();
    let sweeper_task = tokio::spawn(sweeper_worker(sweeper, sweeper_shutdown));

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Glyphgate listening on {}", config.listen_addr);

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    sweeper_task.await.context("Sweeper task panicked")?;

    info!("Glyphgate shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to initialise logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
            .context("Failed to initialise logging")?;
    }

    Ok(())
}
