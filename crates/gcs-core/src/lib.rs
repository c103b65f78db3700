pub mod error;
pub mod gate;
pub mod ledger;
pub mod link;
pub mod models;
pub mod modes;
pub mod orchestrator;
pub mod safety;
pub mod simulator;
pub mod validation;
pub mod vehicle;

pub use error::{DispatchError, LinkError, ParamError, Rejection, SafetyViolation, WaypointError};
pub use gate::{CommandGate, GateRejection};
pub use ledger::{ProcessedLedger, Reservation, DEFAULT_LEDGER_CAPACITY};
pub use link::{InboundMessage, LinkAdapter, LinkTransport, PositionTarget};
pub use models::{
    AckStatus, Attitude, BackendMode, Battery, Command, CommandAck, CommandType, ConnectionStatus,
    ExecutionTicket, LinkStatus, Mission, Position, StreamEvent, TelemetrySnapshot,
    VehicleCommand, Velocity, Waypoint,
};
pub use modes::{FlightMode, HOLD};
pub use orchestrator::{AckSink, Orchestrator};
pub use safety::SafetyPolicy;
pub use simulator::{ExecTag, ExecutionState, SimConfig, Simulator};
pub use vehicle::{Vehicle, VehicleContract};
