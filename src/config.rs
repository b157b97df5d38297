use std::path::PathBuf;

use clap::Parser;
use tokio::time::Duration;
use tracing::info;

use crate::utils::parse_duration_string;

/// Main configuration for the load driver.
#[derive(Debug, Clone, Parser)]
#[command(name = "loadloop")]
#[command(about = "Continuously load-tests a host and reports per-round metrics over HTTP")]
pub struct Config {
    /// The host to load test
    #[arg(long)]
    pub host: String,

    /// The port to load test
    #[arg(long, default_value_t = 80)]
    pub port: u16,

    /// A comma separated list of URL paths to load test
    #[arg(long, default_value = "/")]
    pub paths: String,

    /// Requests per second to send (0 = unpaced)
    #[arg(long, default_value_t = 0)]
    pub rate: u64,

    /// If set, a directory in which to save results
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// The duration of each round (e.g. 10s, 5m, 1h)
    #[arg(long, default_value = "10s", value_parser = parse_duration_string)]
    pub duration: Duration,

    /// The address to serve metrics on
    #[arg(long, default_value = "localhost:8080")]
    pub address: String,

    /// The number of attack workers to use
    #[arg(long, default_value_t = 10)]
    pub workers: usize,
}

impl Config {
    /// Logs the effective configuration at startup.
    pub fn log_summary(&self) {
        info!(
            host = %self.host,
            port = self.port,
            paths = %self.paths,
            rate = self.rate,
            duration = ?self.duration,
            workers = self.workers,
            address = %self.address,
            results_dir = ?self.results,
            "Starting load driver"
        );
    }
}
