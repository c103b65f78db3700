//! Error taxonomy for the command path.
//!
//! Every rejection and failure the gate or a vehicle backend can produce is a
//! typed value here; its `Display` text is exactly the `reason` carried by the
//! resulting ack.

use std::time::Duration;
use thiserror::Error;

/// A malformed command or parameter set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("command must be a JSON object")]
    NotAnObject,
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{0} must be a string")]
    NotAString(&'static str),
    #[error("{0} must be a number")]
    NotANumber(&'static str),
    #[error("id must be a valid UUID")]
    InvalidUuid,
    #[error("Unknown command type: {0}")]
    UnknownType(String),
    #[error("params must be an object")]
    ParamsNotAnObject,
    #[error("Altitude must be > 0 m")]
    AltitudeNotPositive,
    #[error("Latitude must be between -90 and 90")]
    LatitudeOutOfRange,
    #[error("Longitude must be between -180 and 180")]
    LongitudeOutOfRange,
    #[error("speed must be > 0")]
    SpeedNotPositive,
    #[error("duration must be >= 0")]
    NegativeDuration,
    #[error("mode must be a non-empty string")]
    EmptyMode,
    #[error("mission must be a list of waypoints")]
    MissionNotAList,
    #[error("Mission must contain at least one waypoint")]
    EmptyMission,
    #[error("Waypoint {index}: {source}")]
    Waypoint { index: usize, source: WaypointError },
}

/// Why a single mission waypoint was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaypointError {
    #[error("lat/lon/alt must be numbers")]
    NotNumeric,
    #[error("latitude must be between -90 and 90.")]
    Latitude,
    #[error("longitude must be between -180 and 180.")]
    Longitude,
    #[error("altitude must be > 0 m")]
    Altitude,
    #[error("command must be an integer")]
    CommandCode,
}

/// A policy decision refusing an otherwise well-formed command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SafetyViolation {
    #[error("No telemetry yet; try again")]
    NoTelemetry,
    #[error("Already disarmed")]
    AlreadyDisarmed,
    #[error("Cannot disarm while airborne. Land first.")]
    Airborne,
    #[error("Not armed")]
    NotArmed,
    #[error("Takeoff altitude must be > 0 m")]
    TakeoffAltitude,
    #[error("Invalid waypoint: latitude must be between -90 and 90.")]
    GotoLatitude,
    #[error("Invalid waypoint: longitude must be between -180 and 180.")]
    GotoLongitude,
    #[error("Goto altitude must be > 0 m")]
    GotoAltitude,
    #[error("Altitude must be > 0 m")]
    Altitude,
    #[error("Mission must contain at least one waypoint")]
    EmptyMission,
    #[error("Waypoint {index}: {source}")]
    Waypoint { index: usize, source: WaypointError },
}

/// Terminal gate outcome for a command that will not be dispatched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("Validation error: {0}")]
    Invalid(#[from] ParamError),
    #[error("Duplicate command ID")]
    Duplicate,
    #[error(transparent)]
    Unsafe(#[from] SafetyViolation),
}

/// Failure of the live link primitives.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link closed")]
    Closed,
    #[error("no heartbeat received within {0:?}")]
    HeartbeatTimeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Raised when handing a command to a vehicle backend fails outright.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Link(#[from] LinkError),
}
