//! Background loops for telemetry publishing and link receive.

pub mod link_receive_loop;
pub mod telemetry_loop;

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use gcs_core::VehicleContract;

use crate::state::AppState;

/// Spawn every loop the active backend needs.
pub fn spawn_loops(state: &Arc<AppState>, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
    let mut handles = vec![tokio::spawn(telemetry_loop::run_telemetry_loop(
        state.clone(),
        shutdown.subscribe(),
    ))];
    if let Some(link) = state.vehicle().as_link() {
        handles.push(tokio::spawn(link_receive_loop::run_link_receive_loop(
            link.clone(),
            shutdown.subscribe(),
        )));
    }
    handles
}

/// Signal the loops, give them `state.config().shutdown_grace` to finish,
/// then stop the vehicle.
pub async fn shutdown_loops(
    state: &AppState,
    shutdown: &broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
) {
    let _ = shutdown.send(());
    let grace = state.config().shutdown_grace;
    if tokio::time::timeout(grace, join_all(handles)).await.is_err() {
        tracing::warn!("Background loops still running after {:?}", grace);
    }
    state.vehicle().stop();
    tracing::info!("Vehicle stopped");
}
