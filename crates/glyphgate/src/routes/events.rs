//! Chat event endpoints.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use glyphgate_common::{ButtonReply, GroupId};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::handler::{
    AdminOutcome, ButtonEvent, GroupAddedEvent, GroupOutcome, JoinEvent, JoinOutcome, LeaveEvent, UnrestrictEvent,
};
use crate::state::AppState;

/// Member joined the group
pub async fn join(
    State(state): State<AppState>,
    Json(event): Json<JoinEvent>,
) -> Result<Json<JoinOutcome>, ApiError> {
    Ok(Json(state.gatekeeper.on_join(&event).await?))
}

/// Admin asked to test a member
pub async fn force_check(
    State(state): State<AppState>,
    Json(event): Json<JoinEvent>,
) -> Result<Json<JoinOutcome>, ApiError> {
    Ok(Json(state.gatekeeper.on_force_check(&event).await?))
}

/// Keyboard button pressed; the reply is shown to the presser
pub async fn button(State(state): State<AppState>, Json(event): Json<ButtonEvent>) -> Json<ButtonReply> {
    Json(state.gatekeeper.on_button(&event).await)
}

#[derive(Serialize)]
pub struct LeaveResponse {
    removed: bool,
}

pub async fn leave(State(state): State<AppState>, Json(event): Json<LeaveEvent>) -> Json<LeaveResponse> {
    Json(LeaveResponse {
        removed: state.gatekeeper.on_leave(&event).await,
    })
}

pub async fn unrestrict(
    State(state): State<AppState>,
    Json(event): Json<UnrestrictEvent>,
) -> Result<(StatusCode, Json<AdminOutcome>), ApiError> {
    let outcome = state.gatekeeper.on_unrestrict(&event).await?;
    Ok((admin_status(&outcome), Json(outcome)))
}

/// The bot was added to a group
pub async fn group_added(
    State(state): State<AppState>,
    Json(event): Json<GroupAddedEvent>,
) -> Result<Json<GroupOutcome>, ApiError> {
    Ok(Json(state.gatekeeper.on_group_added(&event).await?))
}

#[derive(Deserialize)]
pub struct BackgroundQuery {
    /// Uploader is a group admin, as asserted by the chat adapter
    #[serde(default)]
    admin: bool,
}

/// Replace a group's challenge background with the uploaded image
pub async fn set_background(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Query(query): Query<BackgroundQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<AdminOutcome>), ApiError> {
    let outcome = state
        .gatekeeper
        .on_set_background(GroupId(group_id), query.admin, body.to_vec())
        .await?;
    Ok((admin_status(&outcome), Json(outcome)))
}

fn admin_status(outcome: &AdminOutcome) -> StatusCode {
    match outcome {
        AdminOutcome::Done => StatusCode::OK,
        AdminOutcome::Rejected { .. } => StatusCode::FORBIDDEN,
    }
}
