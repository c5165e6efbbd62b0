//! Runtime glue that wires configuration, clocks, telemetry, the per-daemon
//! scheduling loop and runner orchestration.

pub mod clock;
pub mod config;
pub mod runner;
pub mod scheduler;
pub mod telemetry;
