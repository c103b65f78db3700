//! Shape and parameter validation for raw command payloads.
//!
//! Checks run in field order and stop at the first failure, so the reason
//! reported is always the earliest problem in the payload.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ParamError, WaypointError};
use crate::models::{Command, CommandType, Mission, VehicleCommand, Waypoint, NAV_WAYPOINT};

/// The id to echo back when a payload fails shape validation.
pub fn echo_id(payload: &Value) -> String {
    match payload.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Parse `{id, type, params}`. A missing `params` is an empty mapping.
pub fn parse_command(payload: &Value) -> Result<Command, ParamError> {
    let object = payload.as_object().ok_or(ParamError::NotAnObject)?;

    let id = match object.get("id") {
        None | Some(Value::Null) => return Err(ParamError::Missing("id")),
        Some(Value::String(raw)) => Uuid::parse_str(raw).map_err(|_| ParamError::InvalidUuid)?,
        Some(_) => return Err(ParamError::NotAString("id")),
    };

    let command_type = match object.get("type") {
        None | Some(Value::Null) => return Err(ParamError::Missing("type")),
        Some(Value::String(raw)) => raw.parse::<CommandType>()?,
        Some(other) => return Err(ParamError::UnknownType(other.to_string())),
    };

    let params = match object.get("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params.clone(),
        Some(_) => return Err(ParamError::ParamsNotAnObject),
    };

    Ok(Command::new(id, command_type, params))
}

/// Per-type parameter validation.
pub fn validate_params(command: &Command) -> Result<VehicleCommand, ParamError> {
    let params = command.params();
    let validated = match command.command_type() {
        CommandType::Arm => VehicleCommand::Arm,
        CommandType::Disarm => VehicleCommand::Disarm,
        CommandType::Rtl => VehicleCommand::Rtl,
        CommandType::StartMission => VehicleCommand::StartMission,
        CommandType::PauseMission => VehicleCommand::PauseMission,
        CommandType::ContinueMission => VehicleCommand::ContinueMission,
        CommandType::AbortMission => VehicleCommand::AbortMission,
        CommandType::Stop => VehicleCommand::Stop,
        CommandType::Takeoff => VehicleCommand::Takeoff {
            alt: positive_altitude(params)?,
        },
        CommandType::Goto => {
            let lat = required_number(params, "lat")
                .ok()
                .filter(|lat| (-90.0..=90.0).contains(lat))
                .ok_or(ParamError::LatitudeOutOfRange)?;
            let lon = required_number(params, "lon")
                .ok()
                .filter(|lon| (-180.0..=180.0).contains(lon))
                .ok_or(ParamError::LongitudeOutOfRange)?;
            let alt = positive_altitude(params)?;
            let speed = positive_speed(params)?;
            VehicleCommand::Goto {
                lat,
                lon,
                alt,
                speed,
            }
        }
        CommandType::SetAlt => VehicleCommand::SetAlt {
            alt: positive_altitude(params)?,
            speed: positive_speed(params)?,
        },
        CommandType::Hover => {
            let duration = optional_number(params, "duration")?.unwrap_or(0.0);
            if duration < 0.0 {
                return Err(ParamError::NegativeDuration);
            }
            VehicleCommand::Hover { duration }
        }
        CommandType::SetMode => match params.get("mode") {
            None | Some(Value::Null) => return Err(ParamError::Missing("mode")),
            Some(Value::String(mode)) if !mode.trim().is_empty() => VehicleCommand::SetMode {
                mode: mode.clone(),
            },
            Some(Value::String(_)) => return Err(ParamError::EmptyMode),
            Some(_) => return Err(ParamError::NotAString("mode")),
        },
        CommandType::UploadMission => VehicleCommand::UploadMission(parse_mission(params)?),
    };
    Ok(validated)
}

/// Range checks shared by mission parsing and the safety re-validation.
pub fn check_waypoint(lat: f64, lon: f64, alt: f64) -> Result<(), WaypointError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(WaypointError::Latitude);
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(WaypointError::Longitude);
    }
    if alt <= 0.0 {
        return Err(WaypointError::Altitude);
    }
    Ok(())
}

fn parse_mission(params: &Map<String, Value>) -> Result<Mission, ParamError> {
    let raw = match params.get("mission") {
        None | Some(Value::Null) => return Err(ParamError::Missing("mission")),
        Some(Value::Array(raw)) => raw,
        Some(_) => return Err(ParamError::MissionNotAList),
    };
    if raw.is_empty() {
        return Err(ParamError::EmptyMission);
    }

    let waypoints = raw
        .iter()
        .enumerate()
        .map(|(index, value)| {
            parse_waypoint(value).map_err(|source| ParamError::Waypoint { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Mission::new(waypoints)
}

fn parse_waypoint(value: &Value) -> Result<Waypoint, WaypointError> {
    let field = |key: &str| value.get(key).and_then(Value::as_f64);
    let (Some(lat), Some(lon), Some(alt)) = (field("lat"), field("lon"), field("alt")) else {
        return Err(WaypointError::NotNumeric);
    };
    check_waypoint(lat, lon, alt)?;

    let command_code = match value.get("command").or_else(|| value.get("command_code")) {
        None | Some(Value::Null) => NAV_WAYPOINT,
        Some(code) => code
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
            .ok_or(WaypointError::CommandCode)?,
    };

    Ok(Waypoint {
        lat,
        lon,
        alt,
        command_code,
    })
}

fn required_number(params: &Map<String, Value>, field: &'static str) -> Result<f64, ParamError> {
    optional_number(params, field)?.ok_or(ParamError::Missing(field))
}

fn optional_number(
    params: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<f64>, ParamError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or(ParamError::NotANumber(field)),
    }
}

fn positive_altitude(params: &Map<String, Value>) -> Result<f64, ParamError> {
    let alt = required_number(params, "alt")?;
    if alt <= 0.0 {
        return Err(ParamError::AltitudeNotPositive);
    }
    Ok(alt)
}

fn positive_speed(params: &Map<String, Value>) -> Result<Option<f64>, ParamError> {
    match optional_number(params, "speed")? {
        Some(speed) if speed <= 0.0 => Err(ParamError::SpeedNotPositive),
        speed => Ok(speed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command(kind: &str, params: Value) -> Command {
        parse_command(&json!({
            "id": Uuid::new_v4().to_string(),
            "type": kind,
            "params": params,
        }))
        .unwrap()
    }

    #[test]
    fn test_shape_errors() {
        assert_eq!(parse_command(&json!([1, 2])).unwrap_err(), ParamError::NotAnObject);
        assert_eq!(
            parse_command(&json!({"type": "arm"})).unwrap_err(),
            ParamError::Missing("id")
        );
        assert_eq!(
            parse_command(&json!({"id": "nope", "type": "arm"})).unwrap_err(),
            ParamError::InvalidUuid
        );
        let id = Uuid::new_v4().to_string();
        assert_eq!(
            parse_command(&json!({"id": id, "type": "fly"})).unwrap_err(),
            ParamError::UnknownType("fly".into())
        );
        assert_eq!(
            parse_command(&json!({"id": id, "type": "arm", "params": 3})).unwrap_err(),
            ParamError::ParamsNotAnObject
        );
    }

    #[test]
    fn test_missing_params_defaults_to_empty() {
        let id = Uuid::new_v4();
        let parsed = parse_command(&json!({"id": id.to_string(), "type": "arm"})).unwrap();
        assert_eq!(parsed.id(), id);
        assert!(parsed.params().is_empty());
    }

    #[test]
    fn test_echo_id() {
        assert_eq!(echo_id(&json!({"id": "abc"})), "abc");
        assert_eq!(echo_id(&json!({"type": "arm"})), "unknown");
        assert_eq!(echo_id(&json!("text")), "unknown");
    }

    #[test]
    fn test_takeoff_altitude_must_be_positive() {
        for alt in [0.0, -5.0] {
            let err = validate_params(&command("takeoff", json!({"alt": alt}))).unwrap_err();
            assert_eq!(err, ParamError::AltitudeNotPositive);
        }
        assert_eq!(
            validate_params(&command("takeoff", json!({}))).unwrap_err(),
            ParamError::Missing("alt")
        );
    }

    #[test]
    fn test_goto_bad_coordinates_use_range_message() {
        let err = validate_params(&command("goto", json!({"lon": 80.0, "alt": 10})))
            .unwrap_err();
        assert_eq!(err, ParamError::LatitudeOutOfRange);
        let err = validate_params(&command("goto", json!({"lat": "north", "lon": 80.0, "alt": 10})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Latitude must be between -90 and 90");
        let err = validate_params(&command("goto", json!({"lat": 26.0, "alt": 10})))
            .unwrap_err();
        assert_eq!(err, ParamError::LongitudeOutOfRange);
        let err = validate_params(&command("goto", json!({"lat": 26.0, "lon": null, "alt": 10})))
            .unwrap_err();
        assert_eq!(err, ParamError::LongitudeOutOfRange);
    }

    #[test]
    fn test_goto_checks_in_field_order() {
        let err = validate_params(&command("goto", json!({"lat": 91.0, "lon": 200.0, "alt": 0})))
            .unwrap_err();
        assert_eq!(err, ParamError::LatitudeOutOfRange);
        let err = validate_params(&command("goto", json!({"lat": 10.0, "lon": 200.0, "alt": 0})))
            .unwrap_err();
        assert_eq!(err, ParamError::LongitudeOutOfRange);
        let err = validate_params(&command(
            "goto",
            json!({"lat": 10.0, "lon": 20.0, "alt": 5, "speed": 0}),
        ))
        .unwrap_err();
        assert_eq!(err, ParamError::SpeedNotPositive);

        let ok = validate_params(&command("goto", json!({"lat": 26.6, "lon": 80.4, "alt": 20})))
            .unwrap();
        assert_eq!(
            ok,
            VehicleCommand::Goto {
                lat: 26.6,
                lon: 80.4,
                alt: 20.0,
                speed: None
            }
        );
    }

    #[test]
    fn test_hover_duration() {
        assert_eq!(
            validate_params(&command("hover", json!({}))).unwrap(),
            VehicleCommand::Hover { duration: 0.0 }
        );
        assert_eq!(
            validate_params(&command("hover", json!({"duration": -1}))).unwrap_err(),
            ParamError::NegativeDuration
        );
    }

    #[test]
    fn test_set_mode_requires_name() {
        assert_eq!(
            validate_params(&command("set_mode", json!({"mode": "  "}))).unwrap_err(),
            ParamError::EmptyMode
        );
        assert_eq!(
            validate_params(&command("set_mode", json!({"mode": "GUIDED"}))).unwrap(),
            VehicleCommand::SetMode {
                mode: "GUIDED".into()
            }
        );
    }

    #[test]
    fn test_mission_names_failing_index() {
        let err = validate_params(&command(
            "upload_mission",
            json!({"mission": [
                {"lat": 26.5, "lon": 80.3, "alt": 10},
                {"lat": 26.5, "lon": 80.3, "alt": "high"},
            ]}),
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "Waypoint 1: lat/lon/alt must be numbers");

        let err = validate_params(&command("upload_mission", json!({"mission": []}))).unwrap_err();
        assert_eq!(err, ParamError::EmptyMission);
    }

    #[test]
    fn test_mission_accepts_command_code() {
        let parsed = validate_params(&command(
            "upload_mission",
            json!({"mission": [
                {"lat": 26.5, "lon": 80.3, "alt": 10},
                {"lat": 26.6, "lon": 80.3, "alt": 10, "command": 21},
            ]}),
        ))
        .unwrap();
        let VehicleCommand::UploadMission(mission) = parsed else {
            panic!("expected mission");
        };
        assert_eq!(mission.len(), 2);
        assert_eq!(mission.waypoints()[0].command_code, NAV_WAYPOINT);
        assert_eq!(mission.waypoints()[1].command_code, 21);
    }
}
