//! Stream session that tracks the latest telemetry and every ack seen.

use std::time::Duration;

use anyhow::Result;
use gcs_core::{AckStatus, CommandAck, CommandType, ConnectionStatus, StreamEvent, TelemetrySnapshot};
use serde_json::Value;

use crate::client::{EventStream, GcsClient};
use crate::commands::CommandRequest;

/// What a session has observed so far.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    telemetry: Option<TelemetrySnapshot>,
    conn_status: Option<ConnectionStatus>,
    acks: Vec<CommandAck>,
}

impl SessionState {
    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Telemetry(snapshot) => self.telemetry = Some(snapshot),
            StreamEvent::CommandAck(ack) => self.acks.push(ack),
            StreamEvent::ConnStatus(status) => self.conn_status = Some(status),
        }
    }

    pub fn telemetry(&self) -> Option<&TelemetrySnapshot> {
        self.telemetry.as_ref()
    }

    pub fn conn_status(&self) -> Option<&ConnectionStatus> {
        self.conn_status.as_ref()
    }

    /// Every ack in arrival order.
    pub fn acks(&self) -> &[CommandAck] {
        &self.acks
    }

    /// Most recent ack for `id`.
    pub fn latest_ack(&self, id: &str) -> Option<&CommandAck> {
        self.acks.iter().rev().find(|ack| ack.id == id)
    }

    pub fn has_ack(&self, id: &str, status: AckStatus) -> bool {
        self.acks
            .iter()
            .any(|ack| ack.id == id && ack.status == status)
    }

    /// First terminal ack for `id`, if any has arrived.
    pub fn terminal_ack(&self, id: &str) -> Option<&CommandAck> {
        self.acks
            .iter()
            .find(|ack| ack.id == id && ack.status.is_terminal())
    }
}

/// Event stream plus the state folded from it.
pub struct Session {
    stream: EventStream,
    state: SessionState,
}

impl Session {
    pub async fn connect(client: &GcsClient) -> Result<Self> {
        let stream = client.connect_stream().await?;
        Ok(Self {
            stream,
            state: SessionState::default(),
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Send a command over the stream and return its id.
    pub async fn send(&mut self, command_type: CommandType, params: Value) -> Result<String> {
        let request = CommandRequest::new(command_type, params);
        tracing::info!("Sending {} ({})", command_type, request.id);
        self.stream.send_command(&request).await?;
        Ok(request.id)
    }

    /// Read one event into the session state.
    pub async fn pump(&mut self) -> Result<()> {
        match self.stream.next_event().await? {
            Some(event) => {
                self.state.apply(event);
                Ok(())
            }
            None => anyhow::bail!("Event stream closed"),
        }
    }

    /// Pump events until `predicate` holds.
    pub async fn wait_for<F>(&mut self, timeout: Duration, desc: &str, mut predicate: F) -> Result<()>
    where
        F: FnMut(&SessionState) -> bool,
    {
        let waited = tokio::time::timeout(timeout, async {
            while !predicate(&self.state) {
                self.pump().await?;
            }
            Ok::<(), anyhow::Error>(())
        })
        .await;
        match waited {
            Ok(result) => result,
            Err(_) => anyhow::bail!("Timeout waiting for {}", desc),
        }
    }

    /// Wait for the first terminal ack of `id`.
    pub async fn wait_terminal(&mut self, id: &str, timeout: Duration) -> Result<CommandAck> {
        self.wait_for(timeout, &format!("terminal ack for {id}"), |state| {
            state.terminal_ack(id).is_some()
        })
        .await?;
        self.state
            .terminal_ack(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("terminal ack for {} vanished", id))
    }

    /// Wait for `id` to finish and require `completed`.
    pub async fn expect_completed(&mut self, id: &str, timeout: Duration) -> Result<()> {
        let ack = self.wait_terminal(id, timeout).await?;
        if ack.status != AckStatus::Completed {
            anyhow::bail!(
                "Expected completed for {}, got {:?} ({})",
                id,
                ack.status,
                ack.reason.unwrap_or_default()
            );
        }
        Ok(())
    }

    /// Wait for `id` to finish and require `rejected`.
    pub async fn expect_rejected(&mut self, id: &str, timeout: Duration) -> Result<String> {
        let ack = self.wait_terminal(id, timeout).await?;
        if ack.status != AckStatus::Rejected {
            anyhow::bail!("Expected rejected for {}, got {:?}", id, ack.status);
        }
        Ok(ack.reason.unwrap_or_default())
    }

    pub async fn close(self) -> Result<()> {
        self.stream.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acks_tracked_in_order() {
        let mut state = SessionState::default();
        state.apply(StreamEvent::CommandAck(CommandAck::accepted("a")));
        state.apply(StreamEvent::CommandAck(CommandAck::executing("a")));
        assert!(state.terminal_ack("a").is_none());
        assert!(state.has_ack("a", AckStatus::Executing));

        state.apply(StreamEvent::CommandAck(CommandAck::completed("a")));
        assert_eq!(state.latest_ack("a").unwrap().status, AckStatus::Completed);
        assert_eq!(state.terminal_ack("a").unwrap().status, AckStatus::Completed);
        assert_eq!(state.acks().len(), 3);
    }

    #[test]
    fn test_latest_telemetry_replaces() {
        let mut state = SessionState::default();
        state.apply(StreamEvent::Telemetry(TelemetrySnapshot::permissive(false, 0.0)));
        state.apply(StreamEvent::Telemetry(TelemetrySnapshot::permissive(true, 3.0)));
        let telemetry = state.telemetry().unwrap();
        assert!(telemetry.armed);
        assert_eq!(telemetry.position.alt_rel, 3.0);
    }
}
