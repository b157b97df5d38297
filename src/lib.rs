//! Continuous HTTP load-test driver.
//!
//! Attacks a target host in fixed-duration rounds, aggregates per-round
//! latency/throughput/error metrics, serves the latest completed round's
//! summary over a plain-HTTP endpoint, and optionally persists each round's
//! raw per-request results to rotating JSON-lines files.

pub mod attack;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod output;
pub mod record;
pub mod report;
pub mod runner;
pub mod shutdown;
pub mod target;
pub mod utils;

/// Exit status when the target host cannot be resolved to a usable address.
pub const EXIT_RESOLVE_FAILURE: i32 = 2;

/// Exit status when a results file cannot be rotated.
pub const EXIT_OUTPUT_FAILURE: i32 = 3;
