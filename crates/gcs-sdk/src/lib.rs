//! Ground-control SDK - operator client library
//!
//! Submits commands and follows telemetry and acks over the event stream.

pub mod client;
pub mod commands;
pub mod session;

pub use client::{EventStream, GcsClient, Health};
pub use commands::CommandRequest;
pub use gcs_core::{AckStatus, CommandAck, CommandType, StreamEvent, TelemetrySnapshot};
pub use session::{Session, SessionState};
