//! Ack sequencing around the gate and the active vehicle.
//!
//! Per command id the emitted acks are either a single `rejected`, or
//! `accepted` followed by the vehicle's `executing`/`completed`/`failed`.

use serde_json::Value;
use uuid::Uuid;

use crate::gate::CommandGate;
use crate::models::{AckStatus, CommandAck, CommandType, TelemetrySnapshot, VehicleCommand};
use crate::modes::HOLD;
use crate::vehicle::{Vehicle, VehicleContract};

pub const HOLD_GOTO_REJECTION: &str = "Vehicle in HOLD — set mode to GUIDED to accept GOTO";
pub const MODE_CHANGE_FAILED: &str = "Mode change failed — cannot send GOTO";

/// Receiver for acks in emission order.
pub trait AckSink {
    fn emit(&mut self, ack: CommandAck);
}

impl AckSink for Vec<CommandAck> {
    fn emit(&mut self, ack: CommandAck) {
        self.push(ack);
    }
}

pub struct Orchestrator<V = Vehicle> {
    gate: CommandGate,
    vehicle: V,
    auto_mode_switch: bool,
}

impl<V: VehicleContract> Orchestrator<V> {
    pub fn new(gate: CommandGate, vehicle: V, auto_mode_switch: bool) -> Self {
        Self {
            gate,
            vehicle,
            auto_mode_switch,
        }
    }

    pub fn gate(&self) -> &CommandGate {
        &self.gate
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn auto_mode_switch(&self) -> bool {
        self.auto_mode_switch
    }

    /// Run one command through the gate and the vehicle, emitting every ack
    /// in order. Never fails; all outcomes are acks.
    pub fn handle_command(
        &self,
        payload: &Value,
        telemetry: Option<&TelemetrySnapshot>,
        sink: &mut impl AckSink,
    ) {
        let ticket = match self.gate.prepare(payload, telemetry) {
            Ok(ticket) => ticket,
            Err(rejection) => {
                let ack = rejection.to_ack();
                tracing::info!("Command {} rejected: {}", ack.id, rejection.reason);
                sink.emit(ack);
                return;
            }
        };

        let in_hold = telemetry.is_some_and(|t| t.mode == HOLD);
        if ticket.command_type() == CommandType::Goto && in_hold {
            if !self.auto_mode_switch {
                sink.emit(CommandAck::rejected(ticket.id, HOLD_GOTO_REJECTION));
                return;
            }
            if !self.switch_to_guided(sink) {
                sink.emit(CommandAck::rejected(ticket.id, MODE_CHANGE_FAILED));
                return;
            }
        }

        sink.emit(CommandAck::accepted(ticket.id));
        match self.vehicle.send_command(ticket.id, &ticket.command) {
            Ok(result)
                if matches!(
                    result.status,
                    AckStatus::Executing | AckStatus::Completed | AckStatus::Failed
                ) =>
            {
                sink.emit(result)
            }
            Ok(result) => {
                tracing::warn!(
                    "Vehicle returned {:?} for accepted command {}: {}",
                    result.status,
                    ticket.id,
                    result.reason.as_deref().unwrap_or_default()
                );
            }
            Err(err) => {
                tracing::error!("Command execution failed: {}", err);
                sink.emit(CommandAck::failed(ticket.id, err.to_string()));
            }
        }
    }

    /// Issue an internal `set_mode GUIDED` ahead of a goto. Returns whether
    /// the goto may proceed.
    fn switch_to_guided(&self, sink: &mut impl AckSink) -> bool {
        let helper_id = Uuid::new_v4();
        tracing::info!("Vehicle in HOLD, switching to GUIDED ({})", helper_id);
        sink.emit(CommandAck::accepted(helper_id));

        let command = VehicleCommand::SetMode {
            mode: "GUIDED".to_string(),
        };
        let failure = match self.vehicle.send_command(helper_id, &command) {
            Ok(result)
                if matches!(result.status, AckStatus::Completed | AckStatus::Executing) =>
            {
                sink.emit(result);
                return true;
            }
            Ok(result) => result
                .reason
                .unwrap_or_else(|| format!("mode change returned {:?}", result.status)),
            Err(err) => err.to_string(),
        };
        tracing::warn!("Mode change failed: {}", failure);
        sink.emit(CommandAck::failed(helper_id, failure));
        false
    }

    /// Single-shot entry point: gate against a permissive snapshot built
    /// from the vehicle's accessors, dispatch, and return the vehicle's ack.
    pub fn process_command(&self, payload: &Value) -> CommandAck {
        let telemetry = TelemetrySnapshot::permissive(
            self.vehicle.armed().unwrap_or(true),
            self.vehicle.relative_altitude().unwrap_or(0.0),
        );
        let ticket = match self.gate.prepare(payload, Some(&telemetry)) {
            Ok(ticket) => ticket,
            Err(rejection) => return rejection.to_ack(),
        };
        self.vehicle
            .send_command(ticket.id, &ticket.command)
            .unwrap_or_else(|err| {
                tracing::error!("Error executing command: {}", err);
                CommandAck::failed(ticket.id, err.to_string())
            })
    }
}
