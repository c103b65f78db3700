//! The vehicle contract and the backend selected at startup.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::link::LinkAdapter;
use crate::models::{BackendMode, CommandAck, TelemetrySnapshot, VehicleCommand};
use crate::simulator::Simulator;

/// What the orchestrator needs from a vehicle endpoint.
///
/// `send_command` must not block on movement: long-running commands return
/// `executing` and complete later.
pub trait VehicleContract: Send + Sync {
    fn send_command(&self, id: Uuid, command: &VehicleCommand) -> Result<CommandAck, DispatchError>;

    fn get_telemetry(&self) -> TelemetrySnapshot;

    fn armed(&self) -> Option<bool> {
        None
    }

    fn connected(&self) -> Option<bool> {
        None
    }

    fn relative_altitude(&self) -> Option<f64> {
        None
    }

    /// Release the endpoint. Must be idempotent.
    fn stop(&self) {}
}

/// The active backend.
#[derive(Clone)]
pub enum Vehicle {
    Simulated(Arc<Simulator>),
    Link(Arc<LinkAdapter>),
}

impl Vehicle {
    pub fn backend_mode(&self) -> BackendMode {
        match self {
            Vehicle::Simulated(_) => BackendMode::Sim,
            Vehicle::Link(_) => BackendMode::Sitl,
        }
    }

    pub fn as_simulator(&self) -> Option<&Arc<Simulator>> {
        match self {
            Vehicle::Simulated(sim) => Some(sim),
            Vehicle::Link(_) => None,
        }
    }

    pub fn as_link(&self) -> Option<&Arc<LinkAdapter>> {
        match self {
            Vehicle::Link(link) => Some(link),
            Vehicle::Simulated(_) => None,
        }
    }

    fn contract(&self) -> &dyn VehicleContract {
        match self {
            Vehicle::Simulated(sim) => &**sim,
            Vehicle::Link(link) => &**link,
        }
    }
}

impl VehicleContract for Vehicle {
    fn send_command(&self, id: Uuid, command: &VehicleCommand) -> Result<CommandAck, DispatchError> {
        self.contract().send_command(id, command)
    }

    fn get_telemetry(&self) -> TelemetrySnapshot {
        self.contract().get_telemetry()
    }

    fn armed(&self) -> Option<bool> {
        self.contract().armed()
    }

    fn connected(&self) -> Option<bool> {
        self.contract().connected()
    }

    fn relative_altitude(&self) -> Option<f64> {
        self.contract().relative_altitude()
    }

    fn stop(&self) {
        self.contract().stop()
    }
}

impl<V: VehicleContract + ?Sized> VehicleContract for Arc<V> {
    fn send_command(&self, id: Uuid, command: &VehicleCommand) -> Result<CommandAck, DispatchError> {
        (**self).send_command(id, command)
    }

    fn get_telemetry(&self) -> TelemetrySnapshot {
        (**self).get_telemetry()
    }

    fn armed(&self) -> Option<bool> {
        (**self).armed()
    }

    fn connected(&self) -> Option<bool> {
        (**self).connected()
    }

    fn relative_altitude(&self) -> Option<f64> {
        (**self).relative_altitude()
    }

    fn stop(&self) {
        (**self).stop()
    }
}
