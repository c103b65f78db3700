//! Ground-control CLI - acceptance scenarios and operator tools.
//!
//! Binaries:
//! - acceptance: full flight cycle over the event stream
//! - acceptance_goto: goto while in HOLD exercises the automatic mode switch
//! - send_command: submit one command over HTTP and print the acks

pub mod scenarios;

pub use scenarios::{run_flight_cycle, run_goto_mode_switch, ScenarioOptions};
