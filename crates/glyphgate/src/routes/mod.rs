//! HTTP route handlers for Glyphgate.
//!
//! The chat adapter posts chat events here and drains the resulting
//! transport commands from `/commands`.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use glyphgate_common::{ChallengeSummary, GateError};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::transport::Command;

mod events;
mod health;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Chat events
        .nest("/events", event_routes())
        .route("/groups/{group_id}/background", put(events::set_background))

        // Commands for the chat adapter
        .route("/commands", get(drain_commands))

        .nest("/admin", admin_routes())

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/join", post(events::join))
        .route("/check", post(events::force_check))
        .route("/button", post(events::button))
        .route("/leave", post(events::leave))
        .route("/unrestrict", post(events::unrestrict))
        .route("/group_added", post(events::group_added))
}

fn admin_routes() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}

/// Engine error rendered as a JSON body with the matching status
pub struct ApiError(GateError);

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

// === Command Queue ===

#[derive(Deserialize)]
struct DrainQuery {
    #[serde(default = "default_drain_max")]
    max: usize,
}

fn default_drain_max() -> usize {
    100
}

async fn drain_commands(State(state): State<AppState>, Query(query): Query<DrainQuery>) -> Json<Vec<Command>> {
    Json(state.outbox.drain(query.max).await)
}

// === Admin Handlers ===

#[derive(Serialize)]
struct StatsResponse {
    active_challenges: usize,
    catalog_size: usize,
    pending_commands: usize,
    uptime_secs: u64,
    challenges: Vec<ChallengeSummary>,
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let challenges = state.registry().summaries().await;
    Json(StatsResponse {
        active_challenges: challenges.len(),
        catalog_size: state.gatekeeper.catalog().len(),
        pending_commands: state.outbox.len().await,
        uptime_secs: state.started_at.elapsed().as_secs(),
        challenges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::FsAssetStore;
    use crate::catalog::GlyphCatalog;
    use crate::config::AppConfig;
    use crate::handler::tests::write_assets;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state(dir: &TempDir) -> AppState {
        test_state_with(dir, |_| {})
    }

    fn test_state_with(dir: &TempDir, configure: impl FnOnce(&mut AppConfig)) -> AppState {
        let glyph_dir = write_assets(dir.path());
        let assets = Arc::new(FsAssetStore::new(
            dir.path().join("background.jpg"),
            dir.path().join("backgrounds"),
        ));
        let catalog = GlyphCatalog::load(assets.as_ref(), &glyph_dir, 1, 1).unwrap();

        let mut config = AppConfig::default();
        config.admins = vec![glyphgate_common::UserId(1)];
        config.captcha.correct_glyphs = 2;
        config.captcha.total_buttons = 6;
        config.captcha.canvas_width = 64;
        config.captcha.canvas_height = 64;
        config.captcha.cell_padding = 2;
        config.captcha.artifact_dir = dir.path().join("artifacts");
        configure(&mut config);

        AppState::with_parts(config, catalog, assets)
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(test_state(&dir));

        let (status, body) = call(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = call(&router, "GET", "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["glyphs"], 13);
    }

    #[tokio::test]
    async fn test_join_then_drain_commands() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(test_state(&dir));

        let (status, body) = call(
            &router,
            "POST",
            "/events/join",
            Some(json!({"group_id": -1001234, "user_id": 42, "display_name": "Ada"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "issued");
        let message_id = body["message_id"].clone();

        let (_, stats) = call(&router, "GET", "/admin/stats", None).await;
        assert_eq!(stats["active_challenges"], 1);
        assert_eq!(stats["pending_commands"], 2);
        assert_eq!(stats["challenges"][0]["state"], "awaiting_input");

        let (status, commands) = call(&router, "GET", "/commands?max=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(commands.as_array().unwrap().len(), 1);
        assert_eq!(commands[0]["type"], "restrict_user");

        let (_, commands) = call(&router, "GET", "/commands", None).await;
        assert_eq!(commands[0]["type"], "deliver_challenge");
        assert_eq!(commands[0]["message_id"], message_id);

        let (status, removed) = call(
            &router,
            "POST",
            "/events/leave",
            Some(json!({"group_id": -1001234, "user_id": 42})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(removed["removed"], true);
    }

    #[tokio::test]
    async fn test_button_reply_for_stale_press() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(test_state(&dir));

        let (status, reply) = call(
            &router,
            "POST",
            "/events/button",
            Some(json!({
                "group_id": -1001234,
                "user_id": 42,
                "callback_data": "button:1f600:user42",
                "message_id": 5
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["text"], crate::handler::text::STALE_CHALLENGE);
        assert_eq!(reply["show_alert"], false);
    }

    #[tokio::test]
    async fn test_admin_operations_are_guarded() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(test_state(&dir));

        let (status, body) = call(
            &router,
            "POST",
            "/events/unrestrict",
            Some(json!({"group_id": -1001234, "actor_id": 9, "target_id": 42})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["reason"], "not_super_admin");

        let request = Request::builder()
            .method("PUT")
            .uri("/groups/-1001234/background?admin=true")
            .body(Body::from("not an image"))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = call(&router, "PUT", "/groups/-1001234/background", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_group_added_by_unknown_user() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(test_state_with(&dir, |config| config.leave_unknown_groups = true));

        let (status, body) = call(
            &router,
            "POST",
            "/events/group_added",
            Some(json!({"group_id": -1001234, "added_by": 9})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "left");

        let (_, commands) = call(&router, "GET", "/commands", None).await;
        assert_eq!(commands[0]["type"], "leave_group");
    }

    #[tokio::test]
    async fn test_malformed_event_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(test_state(&dir));

        let (status, _) = call(&router, "POST", "/events/join", Some(json!({"group_id": "x"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
