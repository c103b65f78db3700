//! Protocol adapter for a live vehicle link.
//!
//! Encoding and framing are left to a [`LinkTransport`] implementation; this
//! module maps abstract commands onto its primitives and folds inbound status
//! messages into a telemetry cache.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::{DispatchError, LinkError};
use crate::models::{
    Attitude, Battery, CommandAck, Mission, Position, TelemetrySnapshot, VehicleCommand, Velocity,
};
use crate::modes::FlightMode;
use crate::vehicle::VehicleContract;

/// MAV_FRAME_GLOBAL_RELATIVE_ALT_INT
pub const FRAME_GLOBAL_RELATIVE_ALT_INT: u8 = 6;
/// Position-only setpoint: velocity, acceleration and yaw fields ignored.
pub const POSITION_ONLY_TYPE_MASK: u16 = 0b0000_1111_1111_1000;
/// MAV_MODE_FLAG_SAFETY_ARMED
pub const MODE_FLAG_SAFETY_ARMED: u8 = 0b1000_0000;

const COORD_SCALE: f64 = 1e7;
const MAX_DRAIN_PER_POLL: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionTarget {
    pub frame: u8,
    pub type_mask: u16,
    /// Degrees scaled by 1e7
    pub lat_int: i32,
    /// Degrees scaled by 1e7
    pub lon_int: i32,
    /// Meters above home
    pub alt: f32,
}

impl PositionTarget {
    pub fn relative(lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            frame: FRAME_GLOBAL_RELATIVE_ALT_INT,
            type_mask: POSITION_ONLY_TYPE_MASK,
            lat_int: (lat * COORD_SCALE).round() as i32,
            lon_int: (lon * COORD_SCALE).round() as i32,
            alt: alt as f32,
        }
    }
}

/// Decoded inbound status messages, in the units the wire carries them.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Heartbeat {
        base_mode: u8,
        custom_mode: u32,
    },
    GlobalPositionInt {
        lat: i32,
        lon: i32,
        /// mm above MSL
        alt: i32,
        /// mm above home
        relative_alt: i32,
        /// cm/s
        vx: i16,
        vy: i16,
        vz: i16,
    },
    /// Radians
    Attitude { roll: f32, pitch: f32, yaw: f32 },
    VfrHud { groundspeed: f32 },
    SysStatus {
        /// mV
        voltage_battery: u16,
        /// cA, -1 when unknown
        current_battery: i16,
        /// percent, -1 when unknown
        battery_remaining: i8,
    },
    BatteryStatus {
        /// First cell voltage in mV, u16::MAX when unknown
        voltage: u16,
        current_battery: i16,
        battery_remaining: i8,
    },
}

/// Send/receive primitives of a live link.
pub trait LinkTransport: Send + Sync {
    fn arm_disarm(&self, arm: bool) -> Result<(), LinkError>;
    fn takeoff(&self, alt: f32) -> Result<(), LinkError>;
    fn set_position_target(&self, target: PositionTarget) -> Result<(), LinkError>;
    fn set_mode(&self, custom_mode: u32) -> Result<(), LinkError>;
    fn return_to_launch(&self) -> Result<(), LinkError>;
    /// Non-blocking receive; `Ok(None)` when nothing is queued.
    fn try_recv(&self) -> Result<Option<InboundMessage>, LinkError>;
    fn close(&self) {}
}

#[derive(Debug, Clone)]
struct TelemetryCache {
    lat: f64,
    lon: f64,
    alt_msl: f64,
    alt_rel: f64,
    roll: f64,
    pitch: f64,
    yaw: f64,
    vx: f64,
    vy: f64,
    vz: f64,
    speed: f64,
    battery_voltage: f64,
    battery_current: Option<f64>,
    battery_level: u8,
    mode: String,
    armed: bool,
}

impl Default for TelemetryCache {
    fn default() -> Self {
        Self {
            lat: 0.0,
            lon: 0.0,
            alt_msl: 0.0,
            alt_rel: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            speed: 0.0,
            battery_voltage: 0.0,
            battery_current: None,
            battery_level: 0,
            mode: "UNKNOWN".to_string(),
            armed: false,
        }
    }
}

impl TelemetryCache {
    fn apply(&mut self, message: &InboundMessage) {
        match *message {
            InboundMessage::Heartbeat {
                base_mode,
                custom_mode,
            } => {
                self.armed = base_mode & MODE_FLAG_SAFETY_ARMED != 0;
                self.mode = FlightMode::from_custom_mode(custom_mode).to_string();
            }
            InboundMessage::GlobalPositionInt {
                lat,
                lon,
                alt,
                relative_alt,
                vx,
                vy,
                vz,
            } => {
                self.lat = f64::from(lat) / COORD_SCALE;
                self.lon = f64::from(lon) / COORD_SCALE;
                self.alt_msl = f64::from(alt) / 1000.0;
                self.alt_rel = f64::from(relative_alt) / 1000.0;
                self.vx = f64::from(vx) / 100.0;
                self.vy = f64::from(vy) / 100.0;
                self.vz = f64::from(vz) / 100.0;
            }
            InboundMessage::Attitude { roll, pitch, yaw } => {
                self.roll = f64::from(roll).to_degrees();
                self.pitch = f64::from(pitch).to_degrees();
                self.yaw = f64::from(yaw).to_degrees().rem_euclid(360.0);
            }
            InboundMessage::VfrHud { groundspeed } => {
                self.speed = f64::from(groundspeed);
            }
            InboundMessage::SysStatus {
                voltage_battery,
                current_battery,
                battery_remaining,
            } => {
                self.battery_voltage = f64::from(voltage_battery) / 1000.0;
                self.battery_current =
                    (current_battery != -1).then(|| f64::from(current_battery) / 100.0);
                self.battery_level = u8::try_from(battery_remaining).unwrap_or(0);
            }
            InboundMessage::BatteryStatus {
                voltage,
                current_battery,
                battery_remaining,
            } => {
                if voltage != u16::MAX {
                    self.battery_voltage = f64::from(voltage) / 1000.0;
                }
                if current_battery != -1 {
                    self.battery_current = Some(f64::from(current_battery) / 100.0);
                }
                if let Ok(level) = u8::try_from(battery_remaining) {
                    self.battery_level = level;
                }
            }
        }
    }

    fn snapshot(&self) -> TelemetrySnapshot {
        let round2 = |value: f64| (value * 100.0).round() / 100.0;
        TelemetrySnapshot {
            timestamp: Utc::now(),
            position: Position {
                lat: self.lat,
                lon: self.lon,
                alt_msl: self.alt_msl,
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
                current: self
                    .battery_current
                    .filter(|current| *current != 0.0)
                    .map(round2),
                level: self.battery_level.min(100),
            },
            mode: self.mode.clone(),
            armed: self.armed,
        }
    }
}

/// Vehicle contract over a live link.
pub struct LinkAdapter {
    transport: Mutex<Option<Box<dyn LinkTransport>>>,
    connected: AtomicBool,
    cache: Mutex<TelemetryCache>,
    mission: Mutex<Option<Mission>>,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LinkAdapter {
    pub fn new(transport: Box<dyn LinkTransport>) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
            connected: AtomicBool::new(false),
            cache: Mutex::new(TelemetryCache::default()),
            mission: Mutex::new(None),
        }
    }

    /// Block until the first heartbeat arrives or `timeout` passes.
    pub fn connect(&self, timeout: Duration) -> Result<(), LinkError> {
        tracing::info!("Waiting for heartbeat...");
        let deadline = Instant::now() + timeout;
        loop {
            self.poll_inbound()?;
            if self.is_connected() {
                tracing::info!("Link connected");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(LinkError::HeartbeatTimeout(timeout));
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Drain queued inbound messages into the telemetry cache. A receive
    /// error marks the link disconnected; a heartbeat marks it connected.
    pub fn poll_inbound(&self) -> Result<usize, LinkError> {
        let transport = relock(&self.transport);
        let Some(transport) = transport.as_ref() else {
            return Err(LinkError::Closed);
        };

        let mut handled = 0;
        while handled < MAX_DRAIN_PER_POLL {
            let message = match transport.try_recv() {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(err) => {
                    if self.connected.swap(false, Ordering::SeqCst) {
                        tracing::error!("Error receiving link message: {}", err);
                    }
                    return Err(err);
                }
            };
            if matches!(message, InboundMessage::Heartbeat { .. })
                && !self.connected.swap(true, Ordering::SeqCst)
            {
                tracing::info!("Heartbeat received, link up");
            }
            relock(&self.cache).apply(&message);
            handled += 1;
        }
        Ok(handled)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Mission cached by the last upload.
    pub fn mission(&self) -> Option<Mission> {
        relock(&self.mission).clone()
    }

    fn dispatch(
        &self,
        transport: &dyn LinkTransport,
        id: Uuid,
        command: &VehicleCommand,
    ) -> Result<CommandAck, LinkError> {
        let ack = match command {
            VehicleCommand::Arm => {
                transport.arm_disarm(true)?;
                CommandAck::executing(id)
            }
            VehicleCommand::Disarm => {
                transport.arm_disarm(false)?;
                CommandAck::executing(id)
            }
            VehicleCommand::Takeoff { alt } => {
                transport.takeoff(*alt as f32)?;
                CommandAck::executing(id)
            }
            VehicleCommand::Goto { lat, lon, alt, .. } => {
                transport.set_position_target(PositionTarget::relative(*lat, *lon, *alt))?;
                CommandAck::executing(id)
            }
            VehicleCommand::SetAlt { alt, .. } => {
                let (lat, lon) = {
                    let cache = relock(&self.cache);
                    (cache.lat, cache.lon)
                };
                transport.set_position_target(PositionTarget::relative(lat, lon, *alt))?;
                CommandAck::executing(id)
            }
            VehicleCommand::Hover { .. } | VehicleCommand::PauseMission => {
                transport.set_mode(FlightMode::Loiter.custom_mode())?;
                CommandAck::completed(id)
            }
            VehicleCommand::SetMode { mode } => match FlightMode::from_name(mode) {
                Some(flight_mode) => {
                    transport.set_mode(flight_mode.custom_mode())?;
                    CommandAck::completed(id)
                }
                None => CommandAck::rejected(id, format!("Unknown mode: {mode}")),
            },
            VehicleCommand::Rtl => {
                transport.return_to_launch()?;
                CommandAck::executing(id)
            }
            VehicleCommand::UploadMission(mission) => {
                *relock(&self.mission) = Some(mission.clone());
                CommandAck::completed(id)
            }
            VehicleCommand::StartMission => {
                transport.set_mode(FlightMode::Auto.custom_mode())?;
                CommandAck::executing(id)
            }
            VehicleCommand::ContinueMission => {
                transport.set_mode(FlightMode::Auto.custom_mode())?;
                CommandAck::completed(id)
            }
            VehicleCommand::AbortMission | VehicleCommand::Stop => {
                transport.set_mode(FlightMode::Guided.custom_mode())?;
                transport.set_mode(FlightMode::Loiter.custom_mode())?;
                CommandAck::completed(id)
            }
        };
        Ok(ack)
    }
}

impl VehicleContract for LinkAdapter {
    fn send_command(&self, id: Uuid, command: &VehicleCommand) -> Result<CommandAck, DispatchError> {
        let transport = relock(&self.transport);
        let Some(transport) = transport.as_deref().filter(|_| self.is_connected()) else {
            return Ok(CommandAck::rejected(id, "Not connected"));
        };
        self.dispatch(transport, id, command).map_err(|err| {
            tracing::error!("Error sending {} {}: {}", command.command_type(), id, err);
            DispatchError::from(err)
        })
    }

    fn get_telemetry(&self) -> TelemetrySnapshot {
        relock(&self.cache).snapshot()
    }

    fn armed(&self) -> Option<bool> {
        Some(relock(&self.cache).armed)
    }

    fn connected(&self) -> Option<bool> {
        Some(self.is_connected())
    }

    fn relative_altitude(&self) -> Option<f64> {
        Some(relock(&self.cache).alt_rel)
    }

    fn stop(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(transport) = relock(&self.transport).take() {
            transport.close();
            tracing::info!("Link closed");
        }
    }
}
