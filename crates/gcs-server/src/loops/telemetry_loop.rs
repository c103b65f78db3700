//! Telemetry loop.
//!
//! Advances the simulator (or samples the link cache) at the configured rate,
//! publishes the snapshot and any execution completion acks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use gcs_core::{TelemetrySnapshot, Vehicle, VehicleContract};

use crate::state::AppState;

const ACK_PRUNE_INTERVAL: Duration = Duration::from_secs(30);

pub async fn run_telemetry_loop(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) {
    let period = state.config().telemetry_period();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_prune = Instant::now();

    tracing::info!(
        "Telemetry loop started ({} mode, every {:?})",
        state.backend_mode(),
        period
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Telemetry loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                tick(&state);
                if last_prune.elapsed() >= ACK_PRUNE_INTERVAL {
                    state.prune_ack_history();
                    last_prune = Instant::now();
                }
            }
        }
    }
}

/// One telemetry cycle. Exposed for tests that drive the loop by hand.
pub fn tick(state: &AppState) -> TelemetrySnapshot {
    let vehicle = state.vehicle();
    let snapshot = match vehicle {
        Vehicle::Simulated(sim) => {
            let snapshot = sim.advance();
            if let Some(ack) = sim.check_command_completion() {
                state.publish_ack(ack);
            }
            snapshot
        }
        Vehicle::Link(_) => vehicle.get_telemetry(),
    };
    state.update_telemetry(snapshot.clone());
    snapshot
}
