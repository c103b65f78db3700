//! End-to-end command flow against the simulator.
//!
//! Run with: cargo test -p gcs-core --test command_flow

use gcs_core::{
    AckStatus, CommandAck, CommandGate, Orchestrator, SafetyPolicy, SimConfig, Simulator,
    TelemetrySnapshot, VehicleContract, HOLD,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

fn command(kind: &str, params: Value) -> (Uuid, Value) {
    let id = Uuid::new_v4();
    (id, json!({"id": id.to_string(), "type": kind, "params": params}))
}

fn setup() -> Orchestrator<Arc<Simulator>> {
    let sim = Arc::new(Simulator::new(SimConfig::default()));
    Orchestrator::new(CommandGate::new(1000, SafetyPolicy::default()), sim, true)
}

/// One command through the orchestrator using the simulator's own telemetry.
fn submit(orchestrator: &Orchestrator<Arc<Simulator>>, raw: &Value) -> Vec<CommandAck> {
    let telemetry = orchestrator.vehicle().get_telemetry();
    let mut acks = Vec::new();
    orchestrator.handle_command(raw, Some(&telemetry), &mut acks);
    acks
}

/// Advance the simulator the way the telemetry loop does, collecting completions.
fn tick(orchestrator: &Orchestrator<Arc<Simulator>>, ticks: usize) -> Vec<CommandAck> {
    let sim = orchestrator.vehicle();
    (0..ticks)
        .filter_map(|_| {
            sim.update(0.2);
            sim.check_command_completion()
        })
        .collect()
}

#[test]
fn test_duplicate_submission_rejected() {
    let orchestrator = setup();
    let (_, raw) = command("arm", json!({}));
    assert_eq!(submit(&orchestrator, &raw)[1].status, AckStatus::Completed);
    let acks = submit(&orchestrator, &raw);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].reason.as_deref(), Some("Duplicate command ID"));
}

#[test]
fn test_takeoff_zero_never_reaches_vehicle() {
    let orchestrator = setup();
    submit(&orchestrator, &command("arm", json!({})).1);
    for alt in [0, -3] {
        let (id, raw) = command("takeoff", json!({"alt": alt}));
        let acks = submit(&orchestrator, &raw);
        assert_eq!(
            acks,
            vec![CommandAck::rejected(id, "Validation error: Altitude must be > 0 m")]
        );
    }
    assert!(orchestrator.vehicle().execution_state().target_alt.is_none());
}

#[test]
fn test_full_flight_cycle() {
    let orchestrator = setup();
    submit(&orchestrator, &command("arm", json!({})).1);

    let (takeoff, raw) = command("takeoff", json!({"alt": 10}));
    assert_eq!(
        submit(&orchestrator, &raw),
        vec![CommandAck::accepted(takeoff), CommandAck::executing(takeoff)]
    );
    assert_eq!(tick(&orchestrator, 40), vec![CommandAck::completed(takeoff)]);

    let (disarm, raw) = command("disarm", json!({}));
    let acks = submit(&orchestrator, &raw);
    assert_eq!(acks[0].id, disarm.to_string());
    assert!(acks[0].reason.as_deref().unwrap_or_default().contains("disarm"));

    let (goto, raw) = command("goto", json!({"lat": 26.5004, "lon": 80.3, "alt": 10}));
    assert_eq!(submit(&orchestrator, &raw)[1], CommandAck::executing(goto));
    assert_eq!(tick(&orchestrator, 100), vec![CommandAck::completed(goto)]);

    let (land, raw) = command("set_mode", json!({"mode": "LAND"}));
    assert_eq!(submit(&orchestrator, &raw)[1], CommandAck::completed(land));
    assert_eq!(tick(&orchestrator, 40), vec![CommandAck::completed(land)]);

    let (disarm, raw) = command("disarm", json!({}));
    assert_eq!(
        submit(&orchestrator, &raw),
        vec![CommandAck::accepted(disarm), CommandAck::completed(disarm)]
    );
}

#[test]
fn test_mission_flow_ends_in_hold() {
    let orchestrator = setup();
    let (upload, raw) = command(
        "upload_mission",
        json!({"mission": [
            {"lat": 26.5002, "lon": 80.3, "alt": 10},
            {"lat": 26.5002, "lon": 80.3002, "alt": 15},
            {"lat": 26.5, "lon": 80.3002, "alt": 10, "command": 16},
        ]}),
    );
    assert_eq!(submit(&orchestrator, &raw)[1], CommandAck::completed(upload));
    let state = orchestrator.vehicle().execution_state();
    assert_eq!(state.mission.map(|mission| mission.len()), Some(3));

    submit(&orchestrator, &command("arm", json!({})).1);
    let (start, raw) = command("start_mission", json!({}));
    assert_eq!(submit(&orchestrator, &raw)[1], CommandAck::executing(start));

    let completions = tick(&orchestrator, 200);
    assert_eq!(completions, vec![CommandAck::completed(start)]);
    let state = orchestrator.vehicle().execution_state();
    assert_eq!(state.mode, HOLD);
    assert!((state.lat - 26.5).abs() < 1e-9);
    assert!((state.lon - 80.3002).abs() < 1e-9);
}

#[test]
fn test_goto_from_hold_auto_switch() {
    let orchestrator = setup();
    submit(&orchestrator, &command("arm", json!({})).1);
    submit(&orchestrator, &command("hover", json!({})).1);
    assert_eq!(orchestrator.vehicle().get_telemetry().mode, HOLD);

    let (goto, raw) = command("goto", json!({"lat": 26.6, "lon": 80.4, "alt": 20}));
    let acks = submit(&orchestrator, &raw);
    let helper = &acks[0];
    assert_eq!(helper.status, AckStatus::Accepted);
    assert_ne!(helper.id, goto.to_string());
    let goto_accepted = acks
        .iter()
        .position(|ack| *ack == CommandAck::accepted(goto))
        .unwrap();
    assert!(goto_accepted > 0);
    assert_eq!(orchestrator.vehicle().get_telemetry().mode, "GUIDED");
}

#[test]
fn test_no_telemetry_allows_only_setup_commands() {
    let orchestrator = setup();
    let mut acks = Vec::new();
    orchestrator.handle_command(&command("arm", json!({})).1, None, &mut acks);
    assert_eq!(acks[1].status, AckStatus::Completed);

    acks.clear();
    let (id, raw) = command("rtl", json!({}));
    orchestrator.handle_command(&raw, None, &mut acks);
    assert_eq!(acks, vec![CommandAck::rejected(id, "No telemetry yet; try again")]);
}

#[test]
fn test_stop_allowed_while_disarmed() {
    let orchestrator = setup();
    let (stop, raw) = command("stop", json!({}));
    assert_eq!(
        submit(&orchestrator, &raw),
        vec![CommandAck::accepted(stop), CommandAck::completed(stop)]
    );
    let telemetry: TelemetrySnapshot = orchestrator.vehicle().get_telemetry();
    assert!(!telemetry.armed);
}
