//! Command submission and ack lookup endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use gcs_core::CommandAck;
use crate::state::AppState;

/// Run one operator command through the orchestrator.
/// POST /v1/commands
///
/// Returns every ack emitted for the command, in emission order; the same
/// acks are also broadcast on the stream.
pub async fn submit_command(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Json<Vec<CommandAck>> {
    let acks = state.submit_command(&payload);
    Json(acks)
}

/// Latest ack recorded for a command id.
/// GET /v1/commands/:id
pub async fn get_command_ack(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CommandAck>, StatusCode> {
    state.ack_for(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}
