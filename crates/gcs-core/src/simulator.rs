//! Deterministic vehicle simulator.
//!
//! Integrates a minimal flight model (constant-rate climb, straight-line
//! translation, linear battery drain) and a mission state machine. Long-running
//! commands return `executing` immediately; their `completed` ack surfaces later
//! through [`Simulator::check_command_completion`], the same asynchronous
//! contract a live link provides.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::{
    Attitude, Battery, CommandAck, Mission, Position, TelemetrySnapshot, VehicleCommand, Velocity,
};
use crate::modes::HOLD;
use crate::vehicle::VehicleContract;

/// Rough meters per degree, applied to both latitude and longitude.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

const ALT_ARRIVAL_M: f64 = 0.05;
const ALT_COMPLETION_M: f64 = 0.1;
const LATERAL_ARRIVAL_M: f64 = 1.0;
const LATERAL_COMPLETION_DEG: f64 = 0.0001;

const FULL_VOLTAGE: f64 = 12.6;
const CURRENT_MOVING_A: f64 = 5.0;
const CURRENT_IDLE_A: f64 = 2.0;
const ATTITUDE_JITTER_DEG: f64 = 0.5;
const DISARM_MAX_ALT_M: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub seed: u64,
    pub climb_rate_mps: f64,
    pub ground_speed_mps: f64,
    /// Percent of charge lost per armed second
    pub battery_drain_pct_per_s: f64,
    pub home_lat: f64,
    pub home_lon: f64,
    pub home_alt_msl_m: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            climb_rate_mps: 2.0,
            ground_speed_mps: 5.0,
            battery_drain_pct_per_s: 0.1,
            home_lat: 26.5,
            home_lon: 80.3,
            home_alt_msl_m: 100.0,
        }
    }
}

/// Kind of long-running execution awaiting completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecTag {
    Takeoff,
    Goto,
    Hover,
    SetAlt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutstandingExecution {
    pub command_id: Uuid,
    pub tag: ExecTag,
    /// Set once the integrator reached the target; the completion ack is
    /// still owed.
    pub settled: bool,
}

/// Full simulator state, exposed as a copy for inspection.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub armed: bool,
    pub mode: String,
    pub lat: f64,
    pub lon: f64,
    pub alt_msl: f64,
    pub alt_rel: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub speed: f64,
    pub battery_voltage: f64,
    pub battery_current: f64,
    pub battery_level: f64,
    pub climb_rate_mps: f64,
    pub ground_speed_mps: f64,
    pub target_alt: Option<f64>,
    pub target_lat: Option<f64>,
    pub target_lon: Option<f64>,
    /// Sim-clock time at which the current hover ends.
    pub hover_end_time: Option<f64>,
    pub mission: Option<Mission>,
    pub current_waypoint: usize,
    pub outstanding: Option<OutstandingExecution>,
    /// Seconds of simulated time elapsed.
    pub clock_s: f64,
}

impl ExecutionState {
    fn initial(config: &SimConfig) -> Self {
        Self {
            armed: false,
            mode: "STABILIZE".to_string(),
            lat: config.home_lat,
            lon: config.home_lon,
            alt_msl: config.home_alt_msl_m,
            alt_rel: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            speed: 0.0,
            battery_voltage: FULL_VOLTAGE,
            battery_current: 0.0,
            battery_level: 100.0,
            climb_rate_mps: config.climb_rate_mps,
            ground_speed_mps: config.ground_speed_mps,
            target_alt: None,
            target_lat: None,
            target_lon: None,
            hover_end_time: None,
            mission: None,
            current_waypoint: 0,
            outstanding: None,
            clock_s: 0.0,
        }
    }

    /// Tag of the execution still in progress, if any.
    pub fn executing_tag(&self) -> Option<ExecTag> {
        self.outstanding
            .filter(|execution| !execution.settled)
            .map(|execution| execution.tag)
    }

    fn begin(&mut self, command_id: Uuid, tag: ExecTag) {
        self.outstanding = Some(OutstandingExecution {
            command_id,
            tag,
            settled: false,
        });
    }

    fn settle(&mut self, tags: &[ExecTag]) {
        if let Some(execution) = self.outstanding.as_mut() {
            if tags.contains(&execution.tag) {
                execution.settled = true;
            }
        }
    }

    fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            timestamp: Utc::now(),
            position: Position {
                lat: self.lat,
                lon: self.lon,
                alt_msl: self.alt_msl + self.alt_rel,
                alt_rel: self.alt_rel,
            },
            attitude: Attitude {
                roll: self.roll,
                pitch: self.pitch,
                yaw: self.yaw,
            },
            velocity: Velocity {
                vx: self.vx,
                vy: self.vy,
                vz: self.vz,
                speed: self.speed,
            },
            battery: Battery {
                voltage: round2(self.battery_voltage),
                current: (self.battery_current != 0.0).then(|| round2(self.battery_current)),
                level: self.battery_level.clamp(0.0, 100.0) as u8,
            },
            mode: self.mode.clone(),
            armed: self.armed,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

struct SimCore {
    state: ExecutionState,
    rng: StdRng,
    config: SimConfig,
    last_step: Instant,
}

impl SimCore {
    fn execute(&mut self, id: Uuid, command: &VehicleCommand) -> CommandAck {
        let home = (self.config.home_lat, self.config.home_lon);
        let s = &mut self.state;
        match command {
            VehicleCommand::Arm => {
                if s.armed {
                    return CommandAck::rejected(id, "Already armed");
                }
                s.armed = true;
                CommandAck::completed(id)
            }
            VehicleCommand::Disarm => {
                if !s.armed {
                    return CommandAck::rejected(id, "Already disarmed");
                }
                if s.alt_rel > DISARM_MAX_ALT_M {
                    return CommandAck::rejected(id, "Cannot disarm in air");
                }
                s.armed = false;
                s.mode = "STABILIZE".to_string();
                CommandAck::completed(id)
            }
            VehicleCommand::Takeoff { alt } => {
                if !s.armed {
                    return CommandAck::rejected(id, "Not armed");
                }
                s.target_alt = Some(*alt);
                s.mode = "GUIDED".to_string();
                s.begin(id, ExecTag::Takeoff);
                CommandAck::executing(id)
            }
            VehicleCommand::Goto {
                lat,
                lon,
                alt,
                speed,
            } => {
                if !s.armed {
                    return CommandAck::rejected(id, "Not armed");
                }
                s.target_lat = Some(*lat);
                s.target_lon = Some(*lon);
                s.target_alt = Some(*alt);
                if let Some(speed) = speed.filter(|speed| *speed > 0.0) {
                    s.ground_speed_mps = speed;
                }
                s.mode = "GUIDED".to_string();
                s.begin(id, ExecTag::Goto);
                CommandAck::executing(id)
            }
            VehicleCommand::Hover { duration } => {
                s.target_lat = Some(s.lat);
                s.target_lon = Some(s.lon);
                s.mode = HOLD.to_string();
                if *duration > 0.0 {
                    s.hover_end_time = Some(s.clock_s + duration);
                    s.begin(id, ExecTag::Hover);
                    CommandAck::executing(id)
                } else {
                    s.hover_end_time = None;
                    s.outstanding = None;
                    CommandAck::completed(id)
                }
            }
            VehicleCommand::SetAlt { alt, speed } => {
                if !s.armed {
                    return CommandAck::rejected(id, "Not armed");
                }
                s.target_alt = Some(*alt);
                if let Some(speed) = speed.filter(|speed| *speed > 0.0) {
                    s.climb_rate_mps = speed;
                }
                s.mode = "GUIDED".to_string();
                s.begin(id, ExecTag::SetAlt);
                CommandAck::executing(id)
            }
            VehicleCommand::SetMode { mode } => {
                s.mode = mode.clone();
                if mode.eq_ignore_ascii_case("LAND") {
                    s.target_alt = Some(0.0);
                    s.begin(id, ExecTag::SetAlt);
                }
                CommandAck::completed(id)
            }
            VehicleCommand::UploadMission(mission) => {
                s.mission = Some(mission.clone());
                s.current_waypoint = 0;
                CommandAck::completed(id)
            }
            VehicleCommand::StartMission => {
                let Some(first) = s.mission.as_ref().and_then(|mission| mission.get(0)).copied()
                else {
                    return CommandAck::rejected(id, "No mission uploaded");
                };
                s.mode = "AUTO".to_string();
                s.current_waypoint = 0;
                s.target_lat = Some(first.lat);
                s.target_lon = Some(first.lon);
                s.target_alt = Some(first.alt);
                s.begin(id, ExecTag::Goto);
                CommandAck::executing(id)
            }
            VehicleCommand::PauseMission => {
                s.mode = HOLD.to_string();
                CommandAck::completed(id)
            }
            VehicleCommand::ContinueMission => {
                if s.mission.is_none() {
                    return CommandAck::rejected(id, "No mission uploaded");
                }
                s.mode = "AUTO".to_string();
                CommandAck::completed(id)
            }
            VehicleCommand::AbortMission | VehicleCommand::Stop => {
                s.mode = HOLD.to_string();
                s.target_lat = None;
                s.target_lon = None;
                s.target_alt = None;
                s.hover_end_time = None;
                s.vx = 0.0;
                s.vy = 0.0;
                s.vz = 0.0;
                s.speed = 0.0;
                s.outstanding = None;
                CommandAck::completed(id)
            }
            VehicleCommand::Rtl => {
                if !s.armed {
                    return CommandAck::rejected(id, "Not armed");
                }
                s.target_lat = Some(home.0);
                s.target_lon = Some(home.1);
                s.mode = "RTL".to_string();
                s.begin(id, ExecTag::Goto);
                CommandAck::executing(id)
            }
        }
    }

    fn step(&mut self, dt: f64) {
        self.state.clock_s += dt;
        if self.state.armed {
            self.update_altitude(dt);
            self.update_lateral(dt);
            self.update_attitude();
            self.update_hover();
            self.drain_battery(dt);
        }
    }

    fn update_altitude(&mut self, dt: f64) {
        let s = &mut self.state;
        let Some(target) = s.target_alt else {
            return;
        };
        if (s.alt_rel - target).abs() <= ALT_ARRIVAL_M {
            return;
        }
        let direction = if target > s.alt_rel { 1.0 } else { -1.0 };
        s.alt_rel += direction * s.climb_rate_mps * dt;
        // NED: negative is up
        s.vz = -s.climb_rate_mps * direction;

        let overshot = (direction > 0.0 && s.alt_rel >= target) || (direction < 0.0 && s.alt_rel <= target);
        if overshot || (s.alt_rel - target).abs() <= ALT_ARRIVAL_M {
            s.alt_rel = target;
            s.vz = 0.0;
            s.settle(&[ExecTag::Takeoff, ExecTag::SetAlt]);
        }
    }

    fn update_lateral(&mut self, dt: f64) {
        let s = &mut self.state;
        let (Some(target_lat), Some(target_lon)) = (s.target_lat, s.target_lon) else {
            return;
        };
        let dlat = target_lat - s.lat;
        let dlon = target_lon - s.lon;
        let distance_m = dlat.hypot(dlon) * METERS_PER_DEGREE;

        if distance_m > LATERAL_ARRIVAL_M {
            let bearing = dlon.atan2(dlat);
            let step_deg = (s.ground_speed_mps * dt).min(distance_m) / METERS_PER_DEGREE;
            s.lat += bearing.cos() * step_deg;
            s.lon += bearing.sin() * step_deg;
            s.vx = bearing.cos() * s.ground_speed_mps;
            s.vy = bearing.sin() * s.ground_speed_mps;
            s.speed = s.ground_speed_mps;
            s.yaw = bearing.to_degrees().rem_euclid(360.0);
            return;
        }

        s.lat = target_lat;
        s.lon = target_lon;
        s.vx = 0.0;
        s.vy = 0.0;
        s.speed = 0.0;
        self.on_waypoint_reached();
    }

    fn on_waypoint_reached(&mut self) {
        let s = &mut self.state;
        let in_mission = s.mode == "AUTO" && s.mission.is_some();
        if !in_mission {
            if s.executing_tag() == Some(ExecTag::Goto) {
                s.target_lat = None;
                s.target_lon = None;
                s.settle(&[ExecTag::Goto]);
            }
            return;
        }

        s.settle(&[ExecTag::Goto]);
        s.current_waypoint += 1;
        let next = s
            .mission
            .as_ref()
            .and_then(|mission| mission.get(s.current_waypoint))
            .copied();
        match next {
            Some(wp) => {
                tracing::debug!("Advancing to waypoint {}", s.current_waypoint);
                s.target_lat = Some(wp.lat);
                s.target_lon = Some(wp.lon);
                s.target_alt = Some(wp.alt);
            }
            None => {
                tracing::info!("Mission complete");
                s.target_lat = None;
                s.target_lon = None;
                s.mode = HOLD.to_string();
            }
        }
    }

    fn update_attitude(&mut self) {
        if self.state.speed > 0.0 {
            self.state.roll = self.rng.random_range(-ATTITUDE_JITTER_DEG..=ATTITUDE_JITTER_DEG);
            self.state.pitch = self.rng.random_range(-ATTITUDE_JITTER_DEG..=ATTITUDE_JITTER_DEG);
        } else {
            self.state.roll = 0.0;
            self.state.pitch = 0.0;
        }
    }

    fn update_hover(&mut self) {
        let s = &mut self.state;
        if s.executing_tag() != Some(ExecTag::Hover) {
            return;
        }
        if s.hover_end_time.is_some_and(|end| s.clock_s >= end) {
            s.hover_end_time = None;
            s.settle(&[ExecTag::Hover]);
        }
    }

    fn drain_battery(&mut self, dt: f64) {
        let drain = self.config.battery_drain_pct_per_s * dt;
        let s = &mut self.state;
        s.battery_level = (s.battery_level - drain).max(0.0);
        s.battery_voltage = FULL_VOLTAGE * (s.battery_level / 100.0);
        s.battery_current = if s.speed > 0.0 {
            CURRENT_MOVING_A
        } else {
            CURRENT_IDLE_A
        };
    }

    fn check_completion(&mut self) -> Option<CommandAck> {
        let s = &mut self.state;
        let execution = s.outstanding?;
        let done = execution.settled
            || match execution.tag {
                ExecTag::Takeoff | ExecTag::SetAlt => s
                    .target_alt
                    .is_some_and(|target| (s.alt_rel - target).abs() <= ALT_COMPLETION_M),
                ExecTag::Goto => match (s.target_lat, s.target_lon) {
                    (Some(lat), Some(lon)) => {
                        (lat - s.lat).abs() < LATERAL_COMPLETION_DEG
                            && (lon - s.lon).abs() < LATERAL_COMPLETION_DEG
                    }
                    _ => false,
                },
                ExecTag::Hover => s.hover_end_time.is_none(),
            };
        if !done {
            return None;
        }
        s.outstanding = None;
        Some(CommandAck::completed(execution.command_id))
    }
}

/// Thread-safe simulator handle; all state sits behind one lock shared by
/// command dispatch and the telemetry ticker.
pub struct Simulator {
    core: Mutex<SimCore>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Simulator {
    pub fn new(config: SimConfig) -> Self {
        Self {
            core: Mutex::new(SimCore {
                state: ExecutionState::initial(&config),
                rng: StdRng::seed_from_u64(config.seed),
                config,
                last_step: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> SimConfig {
        self.lock().config.clone()
    }

    /// Step the simulation by `dt` seconds and return fresh telemetry.
    pub fn update(&self, dt: f64) -> TelemetrySnapshot {
        let mut core = self.lock();
        core.step(dt.max(0.0));
        core.last_step = Instant::now();
        core.state.snapshot()
    }

    /// Step by the wall-clock time elapsed since the previous step.
    pub fn advance(&self) -> TelemetrySnapshot {
        let mut core = self.lock();
        let now = Instant::now();
        let dt = now.duration_since(core.last_step).as_secs_f64();
        core.last_step = now;
        core.step(dt);
        core.state.snapshot()
    }

    /// Emit at most one `completed` ack for the outstanding execution.
    pub fn check_command_completion(&self) -> Option<CommandAck> {
        let ack = self.lock().check_completion();
        if let Some(ack) = &ack {
            tracing::debug!("Command {} completed", ack.id);
        }
        ack
    }

    pub fn execution_state(&self) -> ExecutionState {
        self.lock().state.clone()
    }
}

impl VehicleContract for Simulator {
    fn send_command(&self, id: Uuid, command: &VehicleCommand) -> Result<CommandAck, DispatchError> {
        let ack = self.lock().execute(id, command);
        tracing::debug!(
            "Simulator {} {} -> {:?}",
            command.command_type(),
            id,
            ack.status
        );
        Ok(ack)
    }

    fn get_telemetry(&self) -> TelemetrySnapshot {
        self.lock().state.snapshot()
    }

    fn armed(&self) -> Option<bool> {
        Some(self.lock().state.armed)
    }

    fn relative_altitude(&self) -> Option<f64> {
        Some(self.lock().state.alt_rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AckStatus, Waypoint};

    fn send(sim: &Simulator, command: VehicleCommand) -> CommandAck {
        sim.send_command(Uuid::new_v4(), &command).unwrap()
    }

    fn armed_sim() -> Simulator {
        let sim = Simulator::default();
        assert_eq!(send(&sim, VehicleCommand::Arm).status, AckStatus::Completed);
        sim
    }

    /// Tick until a completion fires, returning every ack seen.
    fn run(sim: &Simulator, ticks: usize, dt: f64) -> Vec<CommandAck> {
        let mut acks = Vec::new();
        for _ in 0..ticks {
            sim.update(dt);
            acks.extend(sim.check_command_completion());
        }
        acks
    }

    #[test]
    fn test_arm_twice_rejected() {
        let sim = armed_sim();
        let ack = send(&sim, VehicleCommand::Arm);
        assert_eq!(ack.status, AckStatus::Rejected);
        assert_eq!(ack.reason.as_deref(), Some("Already armed"));
    }

    #[test]
    fn test_takeoff_climbs_and_drains() {
        let sim = armed_sim();
        let ack = send(&sim, VehicleCommand::Takeoff { alt: 10.0 });
        assert_eq!(ack.status, AckStatus::Executing);
        for _ in 0..60 {
            sim.update(0.1);
        }
        let telemetry = sim.get_telemetry();
        assert!(telemetry.position.alt_rel >= 9.5);
        assert!(telemetry.battery.level < 100);
        assert_eq!(telemetry.mode, "GUIDED");
    }

    #[test]
    fn test_takeoff_completes_once() {
        let sim = armed_sim();
        let id = Uuid::new_v4();
        sim.send_command(id, &VehicleCommand::Takeoff { alt: 10.0 }).unwrap();
        let acks = run(&sim, 80, 0.1);
        assert_eq!(acks, vec![CommandAck::completed(id)]);
        let state = sim.execution_state();
        assert_eq!(state.alt_rel, 10.0);
        assert_eq!(state.vz, 0.0);
    }

    #[test]
    fn test_climb_reports_negative_vz() {
        let sim = armed_sim();
        send(&sim, VehicleCommand::Takeoff { alt: 10.0 });
        let telemetry = sim.update(0.1);
        assert!(telemetry.velocity.vz < 0.0);
    }

    #[test]
    fn test_goto_sets_target() {
        let sim = armed_sim();
        let ack = send(
            &sim,
            VehicleCommand::Goto {
                lat: 26.6,
                lon: 80.4,
                alt: 20.0,
                speed: None,
            },
        );
        assert_eq!(ack.status, AckStatus::Executing);
        let state = sim.execution_state();
        assert_eq!(state.target_lat, Some(26.6));
        assert_eq!(state.target_lon, Some(80.4));
        assert_eq!(state.target_alt, Some(20.0));
        assert_eq!(state.mode, "GUIDED");
    }

    #[test]
    fn test_goto_completes_once() {
        let sim = armed_sim();
        let id = Uuid::new_v4();
        sim.send_command(
            id,
            &VehicleCommand::Goto {
                lat: 26.5005,
                lon: 80.3,
                alt: 5.0,
                speed: Some(10.0),
            },
        )
        .unwrap();
        let acks = run(&sim, 200, 0.1);
        assert_eq!(acks, vec![CommandAck::completed(id)]);
        let state = sim.execution_state();
        assert!((state.lat - 26.5005).abs() < 1e-9);
        assert_eq!(state.speed, 0.0);
        assert_eq!(state.ground_speed_mps, 10.0);
    }

    #[test]
    fn test_hover_completes_after_duration() {
        let sim = armed_sim();
        let id = Uuid::new_v4();
        let ack = sim.send_command(id, &VehicleCommand::Hover { duration: 1.0 }).unwrap();
        assert_eq!(ack.status, AckStatus::Executing);
        assert_eq!(sim.execution_state().mode, HOLD);
        assert!(run(&sim, 5, 0.1).is_empty());
        assert_eq!(run(&sim, 10, 0.1), vec![CommandAck::completed(id)]);
    }

    #[test]
    fn test_zero_hover_completes_immediately() {
        let sim = armed_sim();
        let ack = send(&sim, VehicleCommand::Hover { duration: 0.0 });
        assert_eq!(ack.status, AckStatus::Completed);
        assert!(sim.execution_state().outstanding.is_none());
    }

    #[test]
    fn test_new_command_supersedes_outstanding() {
        let sim = armed_sim();
        let first = Uuid::new_v4();
        sim.send_command(first, &VehicleCommand::Takeoff { alt: 10.0 }).unwrap();
        let second = Uuid::new_v4();
        sim.send_command(second, &VehicleCommand::SetAlt { alt: 3.0, speed: None })
            .unwrap();
        let acks = run(&sim, 50, 0.1);
        assert_eq!(acks, vec![CommandAck::completed(second)]);
    }

    #[test]
    fn test_mission_runs_to_hold() {
        let sim = armed_sim();
        let mission = Mission::new(vec![
            Waypoint::new(26.5001, 80.3, 5.0),
            Waypoint::new(26.5002, 80.3, 5.0),
            Waypoint::new(26.5003, 80.3, 5.0),
        ])
        .unwrap();
        let ack = send(&sim, VehicleCommand::UploadMission(mission));
        assert_eq!(ack.status, AckStatus::Completed);
        assert_eq!(sim.execution_state().mission.map(|m| m.len()), Some(3));

        let start = Uuid::new_v4();
        let ack = sim.send_command(start, &VehicleCommand::StartMission).unwrap();
        assert_eq!(ack.status, AckStatus::Executing);

        let acks = run(&sim, 300, 0.1);
        assert_eq!(acks, vec![CommandAck::completed(start)]);
        let state = sim.execution_state();
        assert_eq!(state.mode, HOLD);
        assert_eq!(state.current_waypoint, 3);
        assert!((state.lat - 26.5003).abs() < 1e-9);
        assert!(state.target_lat.is_none());
    }

    #[test]
    fn test_mission_at_current_position_progresses() {
        let sim = armed_sim();
        let mission = Mission::new(vec![
            Waypoint::new(26.5, 80.3, 5.0),
            Waypoint::new(26.5001, 80.3, 5.0),
        ])
        .unwrap();
        send(&sim, VehicleCommand::UploadMission(mission));
        send(&sim, VehicleCommand::StartMission);
        run(&sim, 100, 0.1);
        let state = sim.execution_state();
        assert_eq!(state.current_waypoint, 2);
        assert_eq!(state.mode, HOLD);
    }

    #[test]
    fn test_start_without_mission_rejected() {
        let sim = armed_sim();
        let ack = send(&sim, VehicleCommand::StartMission);
        assert_eq!(ack.reason.as_deref(), Some("No mission uploaded"));
        let ack = send(&sim, VehicleCommand::ContinueMission);
        assert_eq!(ack.reason.as_deref(), Some("No mission uploaded"));
    }

    #[test]
    fn test_stop_clears_targets() {
        let sim = armed_sim();
        send(&sim, VehicleCommand::Takeoff { alt: 10.0 });
        sim.update(0.5);
        let ack = send(&sim, VehicleCommand::Stop);
        assert_eq!(ack.status, AckStatus::Completed);
        let state = sim.execution_state();
        assert_eq!(state.mode, HOLD);
        assert!(state.target_alt.is_none());
        assert!(state.outstanding.is_none());
        assert!(run(&sim, 10, 0.1).is_empty());
    }

    #[test]
    fn test_disarm_in_air_rejected() {
        let sim = armed_sim();
        send(&sim, VehicleCommand::Takeoff { alt: 10.0 });
        run(&sim, 20, 0.1);
        let ack = send(&sim, VehicleCommand::Disarm);
        assert_eq!(ack.reason.as_deref(), Some("Cannot disarm in air"));
    }

    #[test]
    fn test_land_descends_and_disarms() {
        let sim = armed_sim();
        send(&sim, VehicleCommand::Takeoff { alt: 2.0 });
        run(&sim, 20, 0.1);
        let land = Uuid::new_v4();
        let ack = sim
            .send_command(land, &VehicleCommand::SetMode { mode: "LAND".into() })
            .unwrap();
        assert_eq!(ack.status, AckStatus::Completed);
        assert_eq!(run(&sim, 20, 0.1), vec![CommandAck::completed(land)]);
        assert_eq!(sim.execution_state().alt_rel, 0.0);
        assert_eq!(send(&sim, VehicleCommand::Disarm).status, AckStatus::Completed);
        assert_eq!(sim.execution_state().mode, "STABILIZE");
    }

    #[test]
    fn test_rtl_heads_home() {
        let sim = armed_sim();
        send(
            &sim,
            VehicleCommand::Goto {
                lat: 26.5002,
                lon: 80.3,
                alt: 5.0,
                speed: None,
            },
        );
        run(&sim, 100, 0.1);
        let id = Uuid::new_v4();
        sim.send_command(id, &VehicleCommand::Rtl).unwrap();
        assert_eq!(sim.execution_state().mode, "RTL");
        assert_eq!(run(&sim, 100, 0.1), vec![CommandAck::completed(id)]);
        assert!((sim.execution_state().lat - 26.5).abs() < 1e-9);
    }

    #[test]
    fn test_identical_seeds_identical_trajectories() {
        let trace = || {
            let sim = Simulator::new(SimConfig::default());
            send(&sim, VehicleCommand::Arm);
            send(&sim, VehicleCommand::Takeoff { alt: 15.0 });
            send(
                &sim,
                VehicleCommand::Goto {
                    lat: 26.5004,
                    lon: 80.3003,
                    alt: 15.0,
                    speed: None,
                },
            );
            (0..100)
                .map(|_| {
                    let t = sim.update(0.1);
                    (
                        t.position.alt_rel,
                        t.battery.voltage,
                        t.battery.level,
                        t.attitude.roll,
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(trace(), trace());
    }

    #[test]
    fn test_telemetry_battery_format() {
        let sim = Simulator::default();
        let idle = sim.get_telemetry();
        assert!(idle.battery.current.is_none());
        assert_eq!(idle.battery.level, 100);
        assert_eq!(idle.position.alt_msl, 100.0);

        let sim = armed_sim();
        let t = sim.update(1.0);
        assert_eq!(t.battery.current, Some(2.0));
        assert_eq!(t.battery.level, 99);
        assert_eq!(t.battery.voltage, 12.59);
    }
}
