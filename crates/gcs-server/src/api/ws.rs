//! WebSocket event stream.
//!
//! Pushes `telemetry`, `command_ack` and `conn_status` events to every
//! client; text frames received from a client are command messages.
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use gcs_core::StreamEvent;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Handler for WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<WsQuery>,
) -> axum::response::Response {
    if let Some(expected) = state.config().ws_token.as_deref() {
        let provided = params.token.clone().or_else(|| extract_bearer(&headers));
        if provided.as_deref() != Some(expected) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

#[derive(Debug, Deserialize, Default)]
pub struct WsQuery {
    token: Option<String>,
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    let trimmed = token.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn encode(event: &StreamEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text)),
        Err(err) => {
            tracing::error!("Failed to encode stream event: {}", err);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before the first command so its acks are not missed.
    let mut rx = state.subscribe();
    tracing::info!("Stream client connected");

    let hello = StreamEvent::ConnStatus(state.connection_status());
    if let Some(message) = encode(&hello) {
        if sender.send(message).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let payload = serde_json::from_str::<Value>(&text)
                            .unwrap_or(Value::String(text));
                        tracing::info!("Received command: {}", payload);
                        state.submit_command(&payload);
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let Some(message) = encode(&event) else {
                            continue;
                        };
                        if sender.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Drop missed updates; a newer snapshot will arrive soon.
                        tracing::debug!("Stream client lagged, skipped {} events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::info!("Stream client disconnected");
}
