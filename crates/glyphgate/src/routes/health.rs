//! Health check endpoints.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    glyphs: usize,
}

/// Readiness check: challenges can only be issued with a non-empty catalog
pub async fn ready_check(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    let glyphs = state.gatekeeper.catalog().len();

    if glyphs > 0 {
        Ok(Json(ReadyResponse { status: "ready", glyphs }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
