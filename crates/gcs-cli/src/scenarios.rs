//! Acceptance scenarios driven through an SDK session.

use std::time::Duration;

use anyhow::{Context, Result};
use gcs_core::{AckStatus, CommandType, TelemetrySnapshot, Waypoint, HOLD};
use gcs_sdk::{Session, SessionState};
use serde_json::{json, Value};

/// Tunables for the scenarios.
#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    /// Lateral offset of goto and mission targets, degrees
    pub offset_deg: f64,
    /// Ground speed override sent with goto, m/s
    pub speed_mps: f64,
    pub takeoff_alt_m: f64,
    /// Multiplier applied to every wait
    pub timeout_scale: f64,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            offset_deg: 0.001,
            speed_mps: 20.0,
            takeoff_alt_m: 10.0,
            timeout_scale: 1.0,
        }
    }
}

impl ScenarioOptions {
    fn wait(&self, secs: u64) -> Duration {
        Duration::from_secs_f64(secs as f64 * self.timeout_scale.max(0.1))
    }
}

fn telemetry(state: &SessionState) -> Result<&TelemetrySnapshot> {
    state.telemetry().context("no telemetry received yet")
}

/// Two-waypoint survey leg: the current position, then a point offset
/// north-east.
pub fn survey_mission(lat: f64, lon: f64, alt: f64, offset_deg: f64) -> Value {
    let waypoints = [
        Waypoint::new(lat, lon, alt),
        Waypoint::new(lat + offset_deg, lon + offset_deg, alt),
    ];
    json!({ "mission": waypoints })
}

/// Both coordinates of `telemetry` within `tol` degrees of the target.
pub fn near(telemetry: &TelemetrySnapshot, lat: f64, lon: f64, tol: f64) -> bool {
    (telemetry.position.lat - lat).abs() < tol && (telemetry.position.lon - lon).abs() < tol
}

/// invalid takeoff, arm, takeoff, goto, hover, set_alt, mission upload/start,
/// pause, continue, abort.
pub async fn run_flight_cycle(session: &mut Session, options: &ScenarioOptions) -> Result<()> {
    session
        .wait_for(options.wait(10), "initial telemetry", |s| s.telemetry().is_some())
        .await?;

    let id = session.send(CommandType::Takeoff, json!({"alt": 0})).await?;
    let reason = session.expect_rejected(&id, options.wait(10)).await?;
    println!("Invalid takeoff rejected: {}", reason);

    let id = session.send(CommandType::Arm, Value::Null).await?;
    session.expect_completed(&id, options.wait(10)).await?;
    println!("Armed");

    let start_alt = telemetry(session.state())?.position.alt_rel;
    let id = session
        .send(CommandType::Takeoff, json!({"alt": options.takeoff_alt_m}))
        .await?;
    session
        .wait_for(options.wait(8), "altitude rising", |s| {
            s.telemetry()
                .is_some_and(|t| t.position.alt_rel > start_alt + 2.0)
        })
        .await?;
    session.expect_completed(&id, options.wait(15)).await?;
    println!("Takeoff complete at {:.1} m", telemetry(session.state())?.position.alt_rel);

    let start = telemetry(session.state())?.position;
    let id = session
        .send(
            CommandType::Goto,
            json!({
                "lat": start.lat + options.offset_deg,
                "lon": start.lon + options.offset_deg,
                "alt": options.takeoff_alt_m,
                "speed": options.speed_mps,
            }),
        )
        .await?;
    let moved = options.offset_deg / 2.0;
    session
        .wait_for(options.wait(15), "position moved", |s| {
            s.telemetry()
                .is_some_and(|t| (t.position.lat - start.lat).abs() > moved)
        })
        .await?;
    session.expect_completed(&id, options.wait(30)).await?;
    println!("Goto complete");

    let id = session.send(CommandType::Hover, json!({"duration": 1})).await?;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    session.expect_completed(&id, options.wait(10)).await?;
    let speed = telemetry(session.state())?.velocity.speed;
    anyhow::ensure!(speed.abs() <= 5.0, "still moving at {speed} m/s while hovering");
    println!("Hover complete");

    let target_alt = options.takeoff_alt_m + 2.0;
    let id = session.send(CommandType::SetAlt, json!({"alt": target_alt})).await?;
    session
        .wait_for(options.wait(10), "altitude change", |s| {
            s.telemetry()
                .is_some_and(|t| (t.position.alt_rel - target_alt).abs() <= 0.5)
        })
        .await?;
    session.expect_completed(&id, options.wait(10)).await?;
    println!("Altitude set to {:.1} m", target_alt);

    let here = telemetry(session.state())?.position;
    let mission = survey_mission(here.lat, here.lon, target_alt, options.offset_deg);
    let (last_lat, last_lon) = (here.lat + options.offset_deg, here.lon + options.offset_deg);
    let id = session.send(CommandType::UploadMission, mission).await?;
    session.expect_completed(&id, options.wait(10)).await?;

    session.send(CommandType::StartMission, Value::Null).await?;
    session
        .wait_for(options.wait(30), "mission reach last waypoint", |s| {
            s.telemetry().is_some_and(|t| near(t, last_lat, last_lon, 0.001))
        })
        .await?;
    println!("Mission reached last waypoint");

    for command in [
        CommandType::PauseMission,
        CommandType::ContinueMission,
        CommandType::AbortMission,
    ] {
        let id = session.send(command, Value::Null).await?;
        session.expect_completed(&id, options.wait(10)).await?;
        println!("{} complete", command);
    }

    Ok(())
}

/// goto while in HOLD must produce a helper set_mode ack before the goto's
/// own acks, and the goto must still complete.
pub async fn run_goto_mode_switch(session: &mut Session, options: &ScenarioOptions) -> Result<()> {
    session
        .wait_for(options.wait(5), "initial telemetry", |s| s.telemetry().is_some())
        .await?;

    if !telemetry(session.state())?.armed {
        let id = session.send(CommandType::Arm, Value::Null).await?;
        session.expect_completed(&id, options.wait(10)).await?;
        let id = session.send(CommandType::Takeoff, json!({"alt": 5})).await?;
        session.expect_completed(&id, options.wait(15)).await?;
        println!("Armed and airborne");
    }

    if telemetry(session.state())?.mode != HOLD {
        session.send(CommandType::Hover, json!({"duration": 0})).await?;
        session
            .wait_for(options.wait(5), "HOLD mode", |s| {
                s.telemetry().is_some_and(|t| t.mode == HOLD)
            })
            .await?;
    }

    let here = telemetry(session.state())?.position;
    let acks_before = session.state().acks().len();
    let goto_id = session
        .send(
            CommandType::Goto,
            json!({
                "lat": here.lat + options.offset_deg / 2.0,
                "lon": here.lon + options.offset_deg / 2.0,
                "alt": here.alt_rel.max(5.0),
                "speed": options.speed_mps,
            }),
        )
        .await?;

    session
        .wait_for(options.wait(3), "helper and goto acks", |s| {
            s.acks().len() >= acks_before + 2
        })
        .await?;
    let helper_accepted = session.state().acks()[acks_before..]
        .iter()
        .any(|ack| ack.status == AckStatus::Accepted && ack.id != goto_id);
    anyhow::ensure!(helper_accepted, "no helper set_mode accepted");

    session
        .wait_for(options.wait(10), "goto executing", |s| {
            s.has_ack(&goto_id, AckStatus::Executing) || s.has_ack(&goto_id, AckStatus::Completed)
        })
        .await?;
    session.expect_completed(&goto_id, options.wait(20)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survey_mission_shape() {
        let mission = survey_mission(26.5, 80.3, 12.0, 0.005);
        let waypoints = mission["mission"].as_array().unwrap();
        assert_eq!(waypoints.len(), 2);
        assert_eq!(waypoints[0]["command"], json!(16));
        assert!((waypoints[1]["lat"].as_f64().unwrap() - 26.505).abs() < 1e-9);
        assert_eq!(waypoints[1]["alt"], json!(12.0));
    }

    #[test]
    fn test_near_uses_both_axes() {
        let mut t = TelemetrySnapshot::permissive(true, 10.0);
        t.position.lat = 26.5;
        t.position.lon = 80.3;
        assert!(near(&t, 26.5005, 80.3005, 0.001));
        assert!(!near(&t, 26.5, 80.302, 0.001));
    }

    #[test]
    fn test_wait_scaled() {
        let options = ScenarioOptions {
            timeout_scale: 2.0,
            ..ScenarioOptions::default()
        };
        assert_eq!(options.wait(5), Duration::from_secs(10));
    }
}
