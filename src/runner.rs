//! The round loop: attack, aggregate, persist, publish, repeat.

use std::process;
use std::sync::Arc;

use tokio::time::Duration;
use tracing::{error, info};

use crate::attack::Attack;
use crate::metrics::MetricsAccumulator;
use crate::output::ResultSink;
use crate::report::MetricsPublisher;
use crate::shutdown::ShutdownFlag;
use crate::target::Target;
use crate::EXIT_OUTPUT_FAILURE;

/// Drives rounds until the stop flag is observed.
///
/// The runner is the sole owner of the sink and of each round's accumulator;
/// only the publisher is shared. Per-round setup failures (a results file
/// that cannot be rotated) are fatal and terminate the process with
/// [`EXIT_OUTPUT_FAILURE`] rather than silently continuing without
/// persistence.
pub struct RoundRunner<A> {
    pub attacker: A,
    pub targets: Vec<Target>,
    pub rate: u64,
    pub duration: Duration,
    pub sink: ResultSink,
    pub publisher: Arc<MetricsPublisher>,
    pub stop: ShutdownFlag,
}

impl<A: Attack> RoundRunner<A> {
    /// Runs rounds until the stop flag is set, then finalizes any open
    /// results file and returns.
    ///
    /// The stop flag is checked at each round boundary and after every
    /// record, so a termination signal ends the in-flight round after the
    /// record being processed; records already processed stay counted and
    /// persisted. An interrupted or empty round still publishes its
    /// (possibly empty) summary, replacing the previous one.
    pub async fn run(mut self) {
        let mut round = 0u64;

        while !self.stop.is_set() {
            round += 1;

            if self.sink.enabled() {
                if let Err(e) = self.sink.rotate() {
                    error!(error = %e, "Error opening results file");
                    process::exit(EXIT_OUTPUT_FAILURE);
                }
            }

            let mut accumulator = MetricsAccumulator::new();
            let mut stream = self
                .attacker
                .attack(&self.targets, self.rate, self.duration);

            while let Some(record) = stream.recv().await {
                accumulator.add(&record);
                self.sink.write(&record);

                if self.stop.is_set() {
                    break;
                }
            }
            // Dropping the stream here abandons any records still in flight;
            // the attacker's workers wind down on their next send.
            drop(stream);

            let summary = accumulator.finalize();
            info!(
                round,
                requests = summary.requests,
                rate = summary.rate,
                success_ratio = summary.success_ratio,
                p99_us = summary.latencies.p99_us,
                "Round complete"
            );
            self.publisher.set(summary);
        }

        self.sink.close();
    }
}
