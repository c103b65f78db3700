//! REST API routes.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use gcs_core::TelemetrySnapshot;
use crate::api::{commands, ws};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/telemetry", get(get_telemetry))
        .route("/v1/commands", post(commands::submit_command))
        .route("/v1/commands/:id", get(commands::get_command_ack))
        .route("/v1/stream", get(ws::ws_handler))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "mode": state.backend_mode(),
    }))
}

async fn get_telemetry(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TelemetrySnapshot>, StatusCode> {
    state.latest_telemetry().map(Json).ok_or(StatusCode::NOT_FOUND)
}
