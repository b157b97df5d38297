//! Per-round metrics aggregation.
//!
//! A [`MetricsAccumulator`] is created fresh for each round, ingests one
//! [`ResultRecord`] at a time, and finalizes into an immutable
//! [`MetricsSummary`]. The accumulator is single-owner (only the round loop
//! touches it) so it needs no locking; the summary is what crosses thread
//! boundaries, via the publisher.
//!
//! Latency percentiles use HdrHistogram, tracking 1 microsecond to 60 seconds
//! with 3 significant digits.

use std::collections::{BTreeMap, BTreeSet};

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::record::ResultRecord;

/// Latency distribution for one round, in microseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub mean_us: f64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
    pub min_us: u64,
}

/// Response body volume for one round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BytesSummary {
    pub total: u64,
    pub mean: f64,
}

/// The aggregated statistics for one completed round.
///
/// Immutable once finalized; superseded, never merged, by the next round's
/// summary. The zero value is what the reporting endpoint serves before the
/// first round completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Number of result records ingested.
    pub requests: u64,

    /// Achieved request rate over the round, requests/sec.
    pub rate: f64,

    /// Successful responses per second.
    pub throughput: f64,

    /// Wall time from the first request start to the last response end.
    pub duration_secs: f64,

    /// Fraction of requests that succeeded (2xx/3xx, no transport error).
    pub success_ratio: f64,

    pub latencies: LatencySummary,

    pub bytes_in: BytesSummary,

    /// Request count per status code; transport failures count under "0".
    pub status_codes: BTreeMap<String, u64>,

    /// Distinct error strings observed, sorted.
    pub errors: Vec<String>,
}

/// Mutable per-round aggregator. Create one per round, feed it every record,
/// then [`finalize`](Self::finalize).
pub struct MetricsAccumulator {
    histogram: Histogram<u64>,
    requests: u64,
    successes: u64,
    bytes_in: u64,
    status_codes: BTreeMap<String, u64>,
    errors: BTreeSet<String>,
    earliest_start_ms: Option<u64>,
    latest_end_ms: u64,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        // 1us to 60s with 3 significant digits
        let histogram =
            Histogram::new_with_bounds(1, 60_000_000, 3).expect("Failed to create histogram");

        Self {
            histogram,
            requests: 0,
            successes: 0,
            bytes_in: 0,
            status_codes: BTreeMap::new(),
            errors: BTreeSet::new(),
            earliest_start_ms: None,
            latest_end_ms: 0,
        }
    }

    /// Ingests one result record.
    pub fn add(&mut self, record: &ResultRecord) {
        self.requests += 1;
        if record.success() {
            self.successes += 1;
        }
        self.bytes_in += record.bytes_in;

        *self
            .status_codes
            .entry(record.status.to_string())
            .or_insert(0) += 1;

        if let Some(error) = &record.error {
            self.errors.insert(error.clone());
        }

        let clamped = record.latency_us.clamp(1, 60_000_000);
        if let Err(e) = self.histogram.record(clamped) {
            warn!(
                latency_us = record.latency_us,
                error = %e,
                "Failed to record latency in histogram"
            );
        }

        self.earliest_start_ms = Some(match self.earliest_start_ms {
            Some(earliest) => earliest.min(record.timestamp_ms),
            None => record.timestamp_ms,
        });
        self.latest_end_ms = self.latest_end_ms.max(record.end_ms());
    }

    /// Finalizes the round into an immutable summary.
    ///
    /// A round with zero records finalizes to the all-zero summary.
    pub fn finalize(self) -> MetricsSummary {
        if self.requests == 0 {
            return MetricsSummary::default();
        }

        let duration_secs = self
            .earliest_start_ms
            .map(|earliest| (self.latest_end_ms.saturating_sub(earliest)) as f64 / 1_000.0)
            .unwrap_or(0.0);

        let (rate, throughput) = if duration_secs > 0.0 {
            (
                self.requests as f64 / duration_secs,
                self.successes as f64 / duration_secs,
            )
        } else {
            (0.0, 0.0)
        };

        MetricsSummary {
            requests: self.requests,
            rate,
            throughput,
            duration_secs,
            success_ratio: self.successes as f64 / self.requests as f64,
            latencies: LatencySummary {
                mean_us: self.histogram.mean(),
                p50_us: self.histogram.value_at_quantile(0.50),
                p90_us: self.histogram.value_at_quantile(0.90),
                p95_us: self.histogram.value_at_quantile(0.95),
                p99_us: self.histogram.value_at_quantile(0.99),
                max_us: self.histogram.max(),
                min_us: self.histogram.min(),
            },
            bytes_in: BytesSummary {
                total: self.bytes_in,
                mean: self.bytes_in as f64 / self.requests as f64,
            },
            status_codes: self.status_codes,
            errors: self.errors.into_iter().collect(),
        }
    }
}

impl Default for MetricsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
