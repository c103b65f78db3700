//! Core data models for the ground-control command path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ParamError;
use crate::validation;

// ========== COMMAND MODELS ==========

/// Closed set of operator command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Arm,
    Disarm,
    Takeoff,
    Goto,
    Hover,
    SetAlt,
    Rtl,
    UploadMission,
    StartMission,
    PauseMission,
    ContinueMission,
    AbortMission,
    Stop,
    SetMode,
}

impl CommandType {
    pub const ALL: [CommandType; 14] = [
        CommandType::Arm,
        CommandType::Disarm,
        CommandType::Takeoff,
        CommandType::Goto,
        CommandType::Hover,
        CommandType::SetAlt,
        CommandType::Rtl,
        CommandType::UploadMission,
        CommandType::StartMission,
        CommandType::PauseMission,
        CommandType::ContinueMission,
        CommandType::AbortMission,
        CommandType::Stop,
        CommandType::SetMode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandType::Arm => "arm",
            CommandType::Disarm => "disarm",
            CommandType::Takeoff => "takeoff",
            CommandType::Goto => "goto",
            CommandType::Hover => "hover",
            CommandType::SetAlt => "set_alt",
            CommandType::Rtl => "rtl",
            CommandType::UploadMission => "upload_mission",
            CommandType::StartMission => "start_mission",
            CommandType::PauseMission => "pause_mission",
            CommandType::ContinueMission => "continue_mission",
            CommandType::AbortMission => "abort_mission",
            CommandType::Stop => "stop",
            CommandType::SetMode => "set_mode",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| ParamError::UnknownType(s.to_string()))
    }
}

/// A shape-checked operator command. Parameters are still raw JSON until
/// [`validation::validate_params`] turns them into a [`VehicleCommand`].
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    id: Uuid,
    command_type: CommandType,
    params: Map<String, Value>,
}

impl Command {
    pub fn new(id: Uuid, command_type: CommandType, params: Map<String, Value>) -> Self {
        Self {
            id,
            command_type,
            params,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Accepted,
    Rejected,
    Executing,
    Completed,
    Failed,
}

impl AckStatus {
    /// Whether no further ack follows this one for the same id.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AckStatus::Rejected | AckStatus::Completed | AckStatus::Failed
        )
    }
}

/// Status report for a single command id.
///
/// `reason` is present exactly when the status is `rejected` or `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub id: String,
    pub status: AckStatus,
    pub reason: Option<String>,
}

impl CommandAck {
    fn plain(id: impl fmt::Display, status: AckStatus) -> Self {
        Self {
            id: id.to_string(),
            status,
            reason: None,
        }
    }

    pub fn accepted(id: impl fmt::Display) -> Self {
        Self::plain(id, AckStatus::Accepted)
    }

    pub fn executing(id: impl fmt::Display) -> Self {
        Self::plain(id, AckStatus::Executing)
    }

    pub fn completed(id: impl fmt::Display) -> Self {
        Self::plain(id, AckStatus::Completed)
    }

    pub fn rejected(id: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            status: AckStatus::Rejected,
            reason: Some(reason.into()),
        }
    }

    pub fn failed(id: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            status: AckStatus::Failed,
            reason: Some(reason.into()),
        }
    }
}

// ========== MISSION MODELS ==========

/// MAV_CMD_NAV_WAYPOINT
pub const NAV_WAYPOINT: u16 = 16;

fn default_command_code() -> u16 {
    NAV_WAYPOINT
}

/// A single mission waypoint. Altitude is relative to home.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    #[serde(
        rename = "command",
        alias = "command_code",
        default = "default_command_code"
    )]
    pub command_code: u16,
}

impl Waypoint {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            lat,
            lon,
            alt,
            command_code: NAV_WAYPOINT,
        }
    }
}

/// Ordered, never-empty list of validated waypoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Mission {
    waypoints: Vec<Waypoint>,
}

impl Mission {
    /// Build a mission, checking every waypoint's ranges in order.
    pub fn new(waypoints: Vec<Waypoint>) -> Result<Self, ParamError> {
        if waypoints.is_empty() {
            return Err(ParamError::EmptyMission);
        }
        for (index, wp) in waypoints.iter().enumerate() {
            validation::check_waypoint(wp.lat, wp.lon, wp.alt)
                .map_err(|source| ParamError::Waypoint { index, source })?;
        }
        Ok(Self { waypoints })
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

impl<'de> Deserialize<'de> for Mission {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let waypoints = Vec::<Waypoint>::deserialize(deserializer)?;
        Mission::new(waypoints).map_err(serde::de::Error::custom)
    }
}

/// A command whose parameters passed validation, in the form the vehicle
/// backends consume.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    Arm,
    Disarm,
    Takeoff {
        alt: f64,
    },
    Goto {
        lat: f64,
        lon: f64,
        alt: f64,
        speed: Option<f64>,
    },
    Hover {
        duration: f64,
    },
    SetAlt {
        alt: f64,
        speed: Option<f64>,
    },
    Rtl,
    UploadMission(Mission),
    StartMission,
    PauseMission,
    ContinueMission,
    AbortMission,
    Stop,
    SetMode {
        mode: String,
    },
}

impl VehicleCommand {
    pub fn command_type(&self) -> CommandType {
        match self {
            VehicleCommand::Arm => CommandType::Arm,
            VehicleCommand::Disarm => CommandType::Disarm,
            VehicleCommand::Takeoff { .. } => CommandType::Takeoff,
            VehicleCommand::Goto { .. } => CommandType::Goto,
            VehicleCommand::Hover { .. } => CommandType::Hover,
            VehicleCommand::SetAlt { .. } => CommandType::SetAlt,
            VehicleCommand::Rtl => CommandType::Rtl,
            VehicleCommand::UploadMission(_) => CommandType::UploadMission,
            VehicleCommand::StartMission => CommandType::StartMission,
            VehicleCommand::PauseMission => CommandType::PauseMission,
            VehicleCommand::ContinueMission => CommandType::ContinueMission,
            VehicleCommand::AbortMission => CommandType::AbortMission,
            VehicleCommand::Stop => CommandType::Stop,
            VehicleCommand::SetMode { .. } => CommandType::SetMode,
        }
    }
}

/// Output of a passed gate: the id was reserved and the command authorized.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionTicket {
    pub id: Uuid,
    pub command: VehicleCommand,
}

impl ExecutionTicket {
    pub fn command_type(&self) -> CommandType {
        self.command.command_type()
    }
}

// ========== TELEMETRY MODELS ==========

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    /// Altitude above mean sea level.
    #[serde(rename = "alt")]
    pub alt_msl: f64,
    /// Altitude above home.
    #[serde(rename = "relative_alt")]
    pub alt_rel: f64,
}

/// Attitude in degrees; yaw normalised to 0..360.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// NED velocity in m/s, so a climbing vehicle reports negative `vz`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub voltage: f64,
    pub current: Option<f64>,
    /// Remaining charge, 0-100.
    pub level: u8,
}

/// Immutable point-in-time vehicle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub timestamp: DateTime<Utc>,
    pub position: Position,
    pub attitude: Attitude,
    pub velocity: Velocity,
    pub battery: Battery,
    pub mode: String,
    pub armed: bool,
}

impl TelemetrySnapshot {
    /// Minimal snapshot carrying only the fields the safety policy reads.
    pub fn permissive(armed: bool, alt_rel: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            position: Position {
                alt_rel,
                ..Position::default()
            },
            attitude: Attitude::default(),
            velocity: Velocity::default(),
            battery: Battery {
                level: 100,
                ..Battery::default()
            },
            mode: "UNKNOWN".to_string(),
            armed,
        }
    }
}

// ========== STREAM MODELS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BackendMode {
    Sim,
    Sitl,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Sim => f.write_str("SIM"),
            BackendMode::Sitl => f.write_str("SITL"),
        }
    }
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SIM" => Ok(BackendMode::Sim),
            "SITL" => Ok(BackendMode::Sitl),
            other => Err(format!("unknown backend mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

/// Sent to every stream subscriber when it connects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub status: LinkStatus,
    pub server_time: DateTime<Utc>,
    pub mode: BackendMode,
}

/// Frame on the event stream: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Telemetry(TelemetrySnapshot),
    CommandAck(CommandAck),
    ConnStatus(ConnectionStatus),
}
