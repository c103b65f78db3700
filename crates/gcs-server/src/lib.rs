//! Shared library surface for the ground-control server and its tests.

pub mod api;
pub mod backend;
pub mod backoff;
pub mod cache;
pub mod config;
pub mod loops;
pub mod state;
