//! Application state: the orchestrator, latest telemetry, event bus and
//! ack history, built once at startup and shared by handlers and loops.

use chrono::Utc;
use dashmap::DashMap;
use gcs_core::{
    AckSink, BackendMode, CommandAck, CommandGate, ConnectionStatus, LinkStatus, Orchestrator,
    SafetyPolicy, StreamEvent, TelemetrySnapshot, Vehicle, VehicleContract,
};
use serde_json::Value;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::broadcast;

use crate::cache::{prune_cache, CacheEntry};
use crate::config::Config;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct AckRecord {
    ack: CommandAck,
    recorded_at: Instant,
}

impl CacheEntry for AckRecord {
    fn fetched_at(&self) -> Instant {
        self.recorded_at
    }
}

pub struct AppState {
    config: Config,
    orchestrator: Orchestrator,
    latest_telemetry: RwLock<Option<TelemetrySnapshot>>,
    events: broadcast::Sender<StreamEvent>,
    ack_history: DashMap<String, AckRecord>,
}

impl AppState {
    pub fn new(config: Config, vehicle: Vehicle) -> Self {
        let gate = CommandGate::new(config.command_ledger_size, SafetyPolicy::default());
        let orchestrator = Orchestrator::new(gate, vehicle, config.auto_mode_switch);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            orchestrator,
            latest_telemetry: RwLock::new(None),
            events,
            ack_history: DashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn vehicle(&self) -> &Vehicle {
        self.orchestrator.vehicle()
    }

    pub fn backend_mode(&self) -> BackendMode {
        self.vehicle().backend_mode()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    /// Latest telemetry sample, if the loop has produced one.
    pub fn latest_telemetry(&self) -> Option<TelemetrySnapshot> {
        self.latest_telemetry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store a fresh sample and fan it out to stream subscribers.
    pub fn update_telemetry(&self, snapshot: TelemetrySnapshot) {
        *self
            .latest_telemetry
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        // no subscribers is fine
        let _ = self.events.send(StreamEvent::Telemetry(snapshot));
    }

    /// Record an ack for lookup and broadcast it.
    pub fn publish_ack(&self, ack: CommandAck) {
        tracing::info!("Sent command_ack: {} {:?}", ack.id, ack.status);
        self.ack_history.insert(
            ack.id.clone(),
            AckRecord {
                ack: ack.clone(),
                recorded_at: Instant::now(),
            },
        );
        if self.ack_history.len() > self.prune_threshold() {
            self.prune_ack_history();
        }
        let _ = self.events.send(StreamEvent::CommandAck(ack));
    }

    /// Most recent ack recorded for `id`.
    pub fn ack_for(&self, id: &str) -> Option<CommandAck> {
        self.ack_history.get(id).map(|record| record.ack.clone())
    }

    /// History length that triggers an inline prune: size plus 10%.
    fn prune_threshold(&self) -> usize {
        let size = self.config.ack_history_size;
        size.saturating_add(size / 10)
    }

    pub fn prune_ack_history(&self) {
        prune_cache(
            &self.ack_history,
            self.config.ack_history_size,
            self.config.ack_history_ttl,
        );
    }

    /// Orchestrate one operator command against the latest telemetry.
    /// Every ack is published as it is emitted; the ordered list is returned.
    pub fn submit_command(&self, payload: &Value) -> Vec<CommandAck> {
        let telemetry = self.latest_telemetry();
        let mut publisher = AckPublisher {
            state: self,
            emitted: Vec::new(),
        };
        self.orchestrator
            .handle_command(payload, telemetry.as_ref(), &mut publisher);
        publisher.emitted
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        let status = match self.vehicle().connected() {
            Some(false) => LinkStatus::Disconnected,
            _ => LinkStatus::Connected,
        };
        ConnectionStatus {
            status,
            server_time: Utc::now(),
            mode: self.backend_mode(),
        }
    }
}

/// Publishes each ack to the stream as soon as the orchestrator emits it.
struct AckPublisher<'a> {
    state: &'a AppState,
    emitted: Vec<CommandAck>,
}

impl AckSink for AckPublisher<'_> {
    fn emit(&mut self, ack: CommandAck) {
        self.state.publish_ack(ack.clone());
        self.emitted.push(ack);
    }
}
