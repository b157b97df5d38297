use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use loadloop::attack::HttpAttacker;
use loadloop::config::Config;
use loadloop::output::ResultSink;
use loadloop::report::{self, MetricsPublisher};
use loadloop::runner::RoundRunner;
use loadloop::shutdown::{self, ShutdownFlag};
use loadloop::target::{build_targets, resolve_ipv4};
use loadloop::EXIT_RESOLVE_FAILURE;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.log_summary();

    // Resolve up front so a bad host fails before any load is generated.
    let service_ip = match resolve_ipv4(&config.host) {
        Ok(ip) => ip,
        Err(e) => {
            error!(host = %config.host, error = %e, "Failed to resolve target host");
            process::exit(EXIT_RESOLVE_FAILURE);
        }
    };
    let targets = build_targets(&config.host, service_ip, config.port, &config.paths);
    info!(ip = %service_ip, targets = targets.len(), "Resolved target set");

    let attacker = match HttpAttacker::new(config.workers) {
        Ok(attacker) => attacker,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client");
            process::exit(1);
        }
    };

    let publisher = Arc::new(MetricsPublisher::new());
    {
        let publisher = publisher.clone();
        let address = config.address.clone();
        tokio::spawn(async move {
            report::serve(address, publisher).await;
        });
    }

    let stop = ShutdownFlag::new();
    shutdown::listen(stop.clone());

    let runner = RoundRunner {
        attacker,
        targets,
        rate: config.rate,
        duration: config.duration,
        sink: ResultSink::new(config.results.clone()),
        publisher,
        stop,
    };
    runner.run().await;

    info!("Shutdown complete");
}
