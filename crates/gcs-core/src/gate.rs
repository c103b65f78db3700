//! Command gate: shape validation, idempotency and safety authorization.
//!
//! The gate never dispatches. It either hands back an [`ExecutionTicket`]
//! with the id recorded in the ledger, or a [`GateRejection`] to be sent to
//! the operator as-is.

use serde_json::Value;

use crate::error::Rejection;
use crate::ledger::ProcessedLedger;
use crate::models::{CommandAck, ExecutionTicket, TelemetrySnapshot};
use crate::safety::SafetyPolicy;
use crate::validation;

/// A command refused by the gate, with the id to report it under.
#[derive(Debug, Clone, PartialEq)]
pub struct GateRejection {
    pub id: String,
    pub reason: Rejection,
}

impl GateRejection {
    pub fn to_ack(&self) -> CommandAck {
        CommandAck::rejected(&self.id, self.reason.to_string())
    }
}

#[derive(Debug, Default)]
pub struct CommandGate {
    ledger: ProcessedLedger,
    policy: SafetyPolicy,
}

impl CommandGate {
    pub fn new(ledger_capacity: usize, policy: SafetyPolicy) -> Self {
        Self {
            ledger: ProcessedLedger::new(ledger_capacity),
            policy,
        }
    }

    pub fn ledger(&self) -> &ProcessedLedger {
        &self.ledger
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    /// Validate, dedupe and authorize a raw payload.
    pub fn prepare(
        &self,
        payload: &Value,
        telemetry: Option<&TelemetrySnapshot>,
    ) -> Result<ExecutionTicket, GateRejection> {
        let command = validation::parse_command(payload).map_err(|err| GateRejection {
            id: validation::echo_id(payload),
            reason: err.into(),
        })?;
        let id = command.id();
        let reject = |reason: Rejection| GateRejection {
            id: id.to_string(),
            reason,
        };

        let Some(reservation) = self.ledger.reserve(id) else {
            tracing::warn!("Duplicate command ID: {}", id);
            return Err(reject(Rejection::Duplicate));
        };

        let vehicle_command = validation::validate_params(&command).map_err(|err| reject(err.into()))?;
        self.policy
            .allowed(&vehicle_command, telemetry)
            .map_err(|violation| {
                tracing::info!(
                    "Command {} ({}) refused: {}",
                    id,
                    command.command_type(),
                    violation
                );
                reject(violation.into())
            })?;

        reservation.commit();
        tracing::debug!("Command {} ({}) accepted by gate", id, command.command_type());
        Ok(ExecutionTicket {
            id,
            command: vehicle_command,
        })
    }

    /// Keep the `max_age` most recent processed ids; zero clears them all.
    pub fn clear(&self, max_age: usize) {
        self.ledger.resize(max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AckStatus, VehicleCommand};
    use serde_json::json;
    use uuid::Uuid;

    fn armed() -> TelemetrySnapshot {
        TelemetrySnapshot::permissive(true, 0.0)
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let gate = CommandGate::default();
        let payload = json!({"id": Uuid::new_v4().to_string(), "type": "arm"});
        assert!(gate.prepare(&payload, Some(&armed())).is_ok());
        let rejection = gate.prepare(&payload, Some(&armed())).unwrap_err();
        assert_eq!(rejection.reason, Rejection::Duplicate);
        assert_eq!(rejection.to_ack().reason.as_deref(), Some("Duplicate command ID"));
    }

    #[test]
    fn test_rejected_id_can_be_resubmitted() {
        let gate = CommandGate::default();
        let id = Uuid::new_v4().to_string();
        let bad = json!({"id": id, "type": "takeoff", "params": {"alt": 0}});
        let rejection = gate.prepare(&bad, Some(&armed())).unwrap_err();
        assert_eq!(
            rejection.to_ack().reason.as_deref(),
            Some("Validation error: Altitude must be > 0 m")
        );

        let good = json!({"id": id, "type": "takeoff", "params": {"alt": 10}});
        let ticket = gate.prepare(&good, Some(&armed())).unwrap();
        assert_eq!(ticket.command, VehicleCommand::Takeoff { alt: 10.0 });
    }

    #[test]
    fn test_shape_rejection_echoes_raw_id() {
        let gate = CommandGate::default();
        let rejection = gate
            .prepare(&json!({"id": "not-a-uuid", "type": "arm"}), None)
            .unwrap_err();
        let ack = rejection.to_ack();
        assert_eq!(ack.id, "not-a-uuid");
        assert_eq!(ack.status, AckStatus::Rejected);
        assert_eq!(ack.reason.as_deref(), Some("Validation error: id must be a valid UUID"));

        let rejection = gate.prepare(&json!({"type": "arm"}), None).unwrap_err();
        assert_eq!(rejection.id, "unknown");
    }

    #[test]
    fn test_safety_reason_not_prefixed() {
        let gate = CommandGate::default();
        let payload = json!({"id": Uuid::new_v4().to_string(), "type": "takeoff", "params": {"alt": 10}});
        let rejection = gate.prepare(&payload, None).unwrap_err();
        assert_eq!(
            rejection.to_ack().reason.as_deref(),
            Some("No telemetry yet; try again")
        );
    }

    #[test]
    fn test_clear_forgets_ids() {
        let gate = CommandGate::default();
        let payload = json!({"id": Uuid::new_v4().to_string(), "type": "arm"});
        gate.prepare(&payload, None).unwrap();
        gate.clear(0);
        gate.prepare(&payload, None).unwrap();
    }

    #[test]
    fn test_concurrent_submissions_accept_once() {
        let gate = CommandGate::default();
        let payload = json!({"id": Uuid::new_v4().to_string(), "type": "arm"});
        let accepted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| gate.prepare(&payload, None).is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap() as usize)
                .sum()
        });
        assert_eq!(accepted, 1);
    }
}
