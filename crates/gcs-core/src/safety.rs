//! Flight-safety policy applied to validated commands.

use serde::{Deserialize, Serialize};

use crate::error::SafetyViolation;
use crate::models::{CommandType, TelemetrySnapshot, VehicleCommand};
use crate::validation;

/// Thresholds for the safety decision table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyPolicy {
    /// Disarm is refused above this relative altitude (meters)
    pub disarm_max_relative_alt_m: f64,
    /// Disarm is refused above this ground speed (m/s)
    pub disarm_max_speed_mps: f64,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            disarm_max_relative_alt_m: 0.5,
            disarm_max_speed_mps: 0.5,
        }
    }
}

/// Commands that may run before the first telemetry sample arrives.
pub const ALLOWED_WITHOUT_TELEMETRY: [CommandType; 4] = [
    CommandType::Arm,
    CommandType::UploadMission,
    CommandType::StartMission,
    CommandType::SetMode,
];

fn requires_armed(command_type: CommandType) -> bool {
    matches!(
        command_type,
        CommandType::Takeoff
            | CommandType::Goto
            | CommandType::Hover
            | CommandType::SetAlt
            | CommandType::Rtl
            | CommandType::PauseMission
            | CommandType::ContinueMission
    )
}

impl SafetyPolicy {
    /// Decide whether `command` may be dispatched given the latest telemetry.
    pub fn allowed(
        &self,
        command: &VehicleCommand,
        telemetry: Option<&TelemetrySnapshot>,
    ) -> Result<(), SafetyViolation> {
        let command_type = command.command_type();
        let Some(telemetry) = telemetry else {
            if ALLOWED_WITHOUT_TELEMETRY.contains(&command_type) {
                return Ok(());
            }
            return Err(SafetyViolation::NoTelemetry);
        };

        if command_type == CommandType::Disarm {
            if !telemetry.armed {
                return Err(SafetyViolation::AlreadyDisarmed);
            }
            if telemetry.position.alt_rel > self.disarm_max_relative_alt_m
                || telemetry.velocity.speed > self.disarm_max_speed_mps
            {
                return Err(SafetyViolation::Airborne);
            }
            return Ok(());
        }

        if requires_armed(command_type) && !telemetry.armed {
            return Err(SafetyViolation::NotArmed);
        }

        match command {
            VehicleCommand::Takeoff { alt } if *alt <= 0.0 => Err(SafetyViolation::TakeoffAltitude),
            VehicleCommand::Goto { lat, lon, alt, .. } => {
                if !(-90.0..=90.0).contains(lat) {
                    Err(SafetyViolation::GotoLatitude)
                } else if !(-180.0..=180.0).contains(lon) {
                    Err(SafetyViolation::GotoLongitude)
                } else if *alt <= 0.0 {
                    Err(SafetyViolation::GotoAltitude)
                } else {
                    Ok(())
                }
            }
            VehicleCommand::SetAlt { alt, .. } if *alt <= 0.0 => Err(SafetyViolation::Altitude),
            VehicleCommand::UploadMission(mission) => {
                if mission.is_empty() {
                    return Err(SafetyViolation::EmptyMission);
                }
                for (index, wp) in mission.waypoints().iter().enumerate() {
                    validation::check_waypoint(wp.lat, wp.lon, wp.alt)
                        .map_err(|source| SafetyViolation::Waypoint { index, source })?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
