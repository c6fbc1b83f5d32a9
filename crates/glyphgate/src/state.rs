//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;

use crate::assets::{AssetStore, FsAssetStore};
use crate::catalog::GlyphCatalog;
use crate::config::AppConfig;
use crate::handler::Gatekeeper;
use crate::registry::ChallengeRegistry;
use crate::sweeper::Sweeper;
use crate::transport::{Boundary, OutboxTransport};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Event handlers
    pub gatekeeper: Arc<Gatekeeper>,

    /// Commands waiting for the chat adapter
    pub outbox: Arc<OutboxTransport>,

    /// Transport calls bounded by the configured timeout
    pub boundary: Boundary,

    pub started_at: Instant,
}

impl AppState {
    /// Load the glyph catalog and wire the engine together
    pub fn new(config: AppConfig) -> Result<Self> {
        let assets = Arc::new(FsAssetStore::new(
            config.captcha.background_path.clone(),
            config.captcha.backgrounds_dir.clone(),
        ));

        let catalog = GlyphCatalog::load(
            assets.as_ref(),
            &config.catalog.glyph_dir,
            config.catalog.min_codepoints,
            config.catalog.max_codepoints,
        )
        .with_context(|| format!("Failed to load glyphs from {}", config.catalog.glyph_dir.display()))?;

        Ok(Self::with_parts(config, catalog, assets))
    }

    /// Wire the engine around an already loaded catalog
    pub fn with_parts(config: AppConfig, catalog: GlyphCatalog, assets: Arc<dyn AssetStore>) -> Self {
        let outbox = Arc::new(OutboxTransport::new(config.transport.outbox_capacity));
        let boundary = Boundary::new(outbox.clone(), config.call_timeout());

        let gatekeeper = Arc::new(Gatekeeper::new(
            Arc::new(catalog),
            Arc::new(ChallengeRegistry::new()),
            assets,
            boundary.clone(),
            config.gate_settings(),
        ));

        Self {
            config,
            gatekeeper,
            outbox,
            boundary,
            started_at: Instant::now(),
        }
    }

    pub fn registry(&self) -> &Arc<ChallengeRegistry> {
        self.gatekeeper.registry()
    }

    /// Expiry sweeper over this state's registry
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(self.registry().clone(), self.boundary.clone(), self.config.sweeper_config())
    }
}
