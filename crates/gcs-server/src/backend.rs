//! Startup backend selection.

use std::sync::Arc;

use gcs_core::{
    BackendMode, LinkAdapter, LinkTransport, SimConfig, Simulator, Vehicle, VehicleContract,
};

use crate::config::Config;

/// Pick the vehicle backend for `config.backend_mode`.
///
/// SITL needs a link transport that sees a heartbeat within
/// `link_connect_timeout`; without one the simulator is used instead.
/// Blocks while waiting for the heartbeat.
pub fn select_vehicle(config: &Config, transport: Option<Box<dyn LinkTransport>>) -> Vehicle {
    if config.backend_mode == BackendMode::Sitl {
        tracing::info!("Initializing SITL mode...");
        match transport {
            Some(transport) => {
                let link = LinkAdapter::new(transport);
                match link.connect(config.link_connect_timeout) {
                    Ok(()) => {
                        tracing::info!("SITL link connected via {}", config.mavlink_udp_addr);
                        return Vehicle::Link(Arc::new(link));
                    }
                    Err(err) => {
                        tracing::warn!("SITL connection failed ({}), falling back to SIM mode", err);
                        link.stop();
                    }
                }
            }
            None => tracing::warn!(
                "No link transport available for {}, falling back to SIM mode",
                config.mavlink_udp_addr
            ),
        }
    } else {
        tracing::info!("Initializing SIM mode...");
    }

    simulator(config)
}

fn simulator(config: &Config) -> Vehicle {
    let sim_config = SimConfig {
        seed: config.sim_seed,
        ..SimConfig::default()
    };
    Vehicle::Simulated(Arc::new(Simulator::new(sim_config)))
}
