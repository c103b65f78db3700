//! Server configuration from environment.

use gcs_core::BackendMode;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Shortest telemetry tick; `tokio::time::interval` rejects a zero period.
const MIN_TELEMETRY_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub backend_mode: BackendMode,
    pub mavlink_udp_addr: String,
    /// Telemetry publish rate in Hz
    pub telemetry_rate_hz: f64,
    pub auto_mode_switch: bool,
    pub command_ledger_size: usize,
    pub sim_seed: u64,
    pub ws_token: Option<String>,
    pub ack_history_size: usize,
    pub ack_history_ttl: Duration,
    /// How long to wait for the first heartbeat in SITL mode
    pub link_connect_timeout: Duration,
    /// How long shutdown waits for background loops before stopping the vehicle
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 5000,
            backend_mode: BackendMode::Sim,
            mavlink_udp_addr: "127.0.0.1:14550".to_string(),
            telemetry_rate_hz: 5.0,
            auto_mode_switch: true,
            command_ledger_size: 1000,
            sim_seed: 42,
            ws_token: None,
            ack_history_size: 1000,
            ack_history_ttl: Duration::from_secs(600),
            link_connect_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parsed("PORT").unwrap_or(defaults.server_port),
            backend_mode: parsed("SIM_MODE").unwrap_or(defaults.backend_mode),
            mavlink_udp_addr: env::var("MAVLINK_UDP_ADDR").unwrap_or(defaults.mavlink_udp_addr),
            telemetry_rate_hz: parsed::<f64>("TELEMETRY_RATE")
                .filter(|rate| rate.is_finite() && *rate > 0.0)
                .unwrap_or(defaults.telemetry_rate_hz),
            auto_mode_switch: env::var("AUTO_MODE_SWITCH")
                .ok()
                .map(|value| parse_flag(&value))
                .unwrap_or(defaults.auto_mode_switch),
            command_ledger_size: parsed("COMMAND_LEDGER_SIZE")
                .unwrap_or(defaults.command_ledger_size),
            sim_seed: parsed("SIM_SEED").unwrap_or(defaults.sim_seed),
            ws_token: env::var("GCS_WS_TOKEN")
                .ok()
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty()),
            ack_history_size: parsed("ACK_HISTORY_SIZE").unwrap_or(defaults.ack_history_size),
            ack_history_ttl: parsed("ACK_HISTORY_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ack_history_ttl),
            link_connect_timeout: defaults.link_connect_timeout,
            shutdown_grace: defaults.shutdown_grace,
        }
    }

    /// Telemetry tick period derived from the configured rate.
    pub fn telemetry_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.telemetry_rate_hz.max(0.01)).max(MIN_TELEMETRY_PERIOD)
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
