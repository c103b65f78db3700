//! Outbound command messages.

use gcs_core::CommandType;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Operator command message `{id, type, params}` with a fresh v4 id.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub command_type: CommandType,
    pub params: Map<String, Value>,
}

impl CommandRequest {
    /// Build a command; `params` that is not a JSON object becomes `{}`.
    pub fn new(command_type: CommandType, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: Uuid::new_v4().to_string(),
            command_type,
            params,
        }
    }

    pub fn bare(command_type: CommandType) -> Self {
        Self::new(command_type, Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let request = CommandRequest::new(CommandType::SetAlt, json!({"alt": 12}));
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["type"], json!("set_alt"));
        assert_eq!(wire["params"], json!({"alt": 12}));
        assert!(Uuid::parse_str(wire["id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_bare_has_empty_params() {
        let a = CommandRequest::bare(CommandType::Arm);
        let b = CommandRequest::bare(CommandType::Arm);
        assert!(a.params.is_empty());
        assert_ne!(a.id, b.id);
    }
}
