//! Ground-control SDK client for the HTTP API and event stream.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use gcs_core::{BackendMode, CommandAck, StreamEvent, TelemetrySnapshot};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::commands::CommandRequest;

/// Client for a ground-control server.
pub struct GcsClient {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
    pub(crate) client: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    pub mode: BackendMode,
}

/// WebSocket event stream.
pub struct EventStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl GcsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            client: reqwest::Client::new(),
        }
    }

    /// Set the stream token sent as a bearer header.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<Health> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Health check failed: {}", response.status());
        }
        Ok(response.json().await?)
    }

    /// Latest telemetry, `None` before the server's first tick.
    pub async fn telemetry(&self) -> Result<Option<TelemetrySnapshot>> {
        let url = format!("{}/v1/telemetry", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch telemetry: {}", response.status());
        }
        Ok(Some(response.json().await?))
    }

    // ========== COMMAND HANDLING ==========

    /// Submit a command over HTTP; returns the acks emitted while handling it.
    pub async fn submit_command(&self, command: &CommandRequest) -> Result<Vec<CommandAck>> {
        let url = format!("{}/v1/commands", self.base_url);
        let response = self.client.post(&url).json(command).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to submit command: {}", response.status());
        }
        Ok(response.json().await?)
    }

    /// Latest recorded ack for a command id.
    pub async fn command_ack(&self, id: &str) -> Result<Option<CommandAck>> {
        let url = format!("{}/v1/commands/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch ack {}: {}", id, response.status());
        }
        Ok(Some(response.json().await?))
    }

    /// Connect to the event stream.
    pub async fn connect_stream(&self) -> Result<EventStream> {
        let url = build_ws_url(&self.base_url, "/v1/stream")?;
        let mut request = url.as_str().into_client_request()?;
        if let Some(token) = self.token.as_deref() {
            request.headers_mut().insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        let (socket, _) = connect_async(request).await?;
        tracing::debug!("Connected to {}", url);
        Ok(EventStream { socket })
    }
}

impl EventStream {
    /// Read the next event (returns None on close). Frames that do not
    /// decode as events are skipped.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        while let Some(msg) = self.socket.next().await {
            let text = match msg? {
                Message::Text(text) => text,
                Message::Binary(data) => match String::from_utf8(data) {
                    Ok(text) => text,
                    Err(_) => continue,
                },
                Message::Close(_) => return Ok(None),
                _ => continue,
            };
            match serde_json::from_str(&text) {
                Ok(event) => return Ok(Some(event)),
                Err(err) => tracing::debug!("Skipping undecodable frame: {}", err),
            }
        }
        Ok(None)
    }

    /// Send a command over the stream; its acks arrive as events.
    pub async fn send_command(&mut self, command: &CommandRequest) -> Result<()> {
        let text = serde_json::to_string(command)?;
        self.socket.send(Message::Text(text)).await?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        self.socket.close(None).await?;
        Ok(())
    }
}

fn build_ws_url(base: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(base)?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => other,
    }.to_string();

    url.set_scheme(&scheme)
        .map_err(|_| anyhow::anyhow!("Invalid base URL scheme"))?;
    url.set_path(path);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_from_http() {
        let url = build_ws_url("http://localhost:5000", "/v1/stream").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:5000/v1/stream");
        let url = build_ws_url("https://gcs.example.com", "/v1/stream").unwrap();
        assert_eq!(url.as_str(), "wss://gcs.example.com/v1/stream");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = GcsClient::new("http://localhost:5000/");
        assert_eq!(client.base_url(), "http://localhost:5000");
    }
}
