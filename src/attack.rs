//! The attack engine: issues HTTP requests at a target rate for one round.
//!
//! [`Attack::attack`] returns a bounded channel of result records that ends
//! when the round's deadline passes. Dropping the receiver abandons the
//! round: every worker's next send fails and it winds down, so an early stop
//! never leaks background work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, error};

use crate::errors::{status_reason, ErrorCategory};
use crate::record::{unix_millis_now, ResultRecord};
use crate::target::Target;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Produces one round's stream of result records for a target set.
///
/// This is the seam between the round loop and the request machinery: tests
/// substitute deterministic implementations for [`HttpAttacker`].
pub trait Attack {
    /// Starts one round against `targets` at `rate` requests/sec (0 =
    /// unpaced) for `duration`. The returned stream yields records in
    /// completion order and ends when the round is over.
    fn attack(
        &self,
        targets: &[Target],
        rate: u64,
        duration: Duration,
    ) -> mpsc::Receiver<ResultRecord>;
}

/// Attack engine backed by a shared reqwest client and a pool of paced
/// worker tasks.
pub struct HttpAttacker {
    client: reqwest::Client,
    workers: usize,
}

impl HttpAttacker {
    pub fn new(workers: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            workers: workers.max(1),
        })
    }
}

impl Attack for HttpAttacker {
    fn attack(
        &self,
        targets: &[Target],
        rate: u64,
        duration: Duration,
    ) -> mpsc::Receiver<ResultRecord> {
        let (tx, rx) = mpsc::channel(self.workers);
        if targets.is_empty() {
            return rx;
        }

        let targets: Arc<Vec<Target>> = Arc::new(targets.to_vec());
        let seq = Arc::new(AtomicU64::new(0));
        let deadline = Instant::now() + duration;

        for task_id in 0..self.workers {
            let worker = AttackWorker {
                task_id,
                workers: self.workers,
                rate,
                deadline,
                client: self.client.clone(),
                targets: targets.clone(),
                seq: seq.clone(),
                tx: tx.clone(),
            };
            tokio::spawn(worker.run());
        }

        rx
    }
}

struct AttackWorker {
    task_id: usize,
    workers: usize,
    rate: u64,
    deadline: Instant,
    client: reqwest::Client,
    targets: Arc<Vec<Target>>,
    seq: Arc<AtomicU64>,
    tx: mpsc::Sender<ResultRecord>,
}

impl AttackWorker {
    async fn run(self) {
        debug!(
            task_id = self.task_id,
            rate = self.rate,
            "Attack worker starting"
        );

        // Each worker fires once per cycle of workers/rate seconds. Staggering
        // the start times spreads the pool evenly across one cycle so the
        // workers don't burst in phase at t=0.
        let cycle = if self.rate > 0 {
            let cycle_ms =
                (self.workers as f64 * 1000.0 / self.rate as f64).round().max(1.0) as u64;
            Some(Duration::from_millis(cycle_ms))
        } else {
            None
        };

        // next_fire is the absolute time of the worker's next request. Using
        // sleep_until instead of a relative sleep self-corrects for timer
        // overshoot and slow responses. Unpaced workers never advance it, so
        // sleep_until returns immediately every iteration.
        let mut next_fire = match cycle {
            Some(cycle) => {
                let stagger_ms =
                    self.task_id as u64 * cycle.as_millis() as u64 / self.workers as u64;
                Instant::now() + Duration::from_millis(stagger_ms)
            }
            None => Instant::now(),
        };

        let mut target_idx = self.task_id;

        loop {
            time::sleep_until(next_fire).await;

            if time::Instant::now() >= self.deadline {
                break;
            }

            if let Some(cycle) = cycle {
                next_fire += cycle;
            }

            let target = &self.targets[target_idx % self.targets.len()];
            target_idx += 1;

            let seq = self.seq.fetch_add(1, Ordering::Relaxed);
            let record = hit(&self.client, target, seq).await;

            // A closed channel means the round was abandoned early.
            if self.tx.send(record).await.is_err() {
                break;
            }
        }

        debug!(task_id = self.task_id, "Attack worker stopping");
    }
}

/// Issues one request and turns the outcome into a result record. Request
/// failures are data here, never errors.
async fn hit(client: &reqwest::Client, target: &Target, seq: u64) -> ResultRecord {
    let timestamp_ms = unix_millis_now();
    let started = Instant::now();

    let result = client
        .request(target.method.clone(), &target.url)
        .headers(target.headers.clone())
        .send()
        .await;

    let (status, bytes_in, error) = match result {
        Ok(mut response) => {
            let status = response.status().as_u16();

            // Stream and discard the body chunk-by-chunk instead of buffering
            // it whole; only the byte count is kept.
            let mut bytes_in = 0u64;
            while let Ok(Some(chunk)) = response.chunk().await {
                bytes_in += chunk.len() as u64;
            }

            debug!(
                url = %target.url,
                status_code = status,
                "Request completed"
            );

            let error = ErrorCategory::from_status_code(status)
                .map(|_| format!("HTTP {} {}", status, status_reason(status)));
            (status, bytes_in, error)
        }
        Err(e) => {
            let category = ErrorCategory::from_reqwest_error(&e);
            error!(
                url = %target.url,
                error = %e,
                error_category = %category.label(),
                "Request failed"
            );
            (0, 0, Some(format!("{}: {}", category.label(), e)))
        }
    };

    ResultRecord {
        seq,
        method: target.method.to_string(),
        url: target.url.clone(),
        status,
        timestamp_ms,
        latency_us: started.elapsed().as_micros() as u64,
        bytes_in,
        error,
    }
}
