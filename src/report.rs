//! The reporting endpoint: serves the latest completed round's metrics.
//!
//! [`MetricsPublisher`] is the only structure shared between the round loop
//! (writer) and the HTTP server (readers). A single lock guards the single
//! stored summary, so readers always observe a whole, fully-finalized
//! snapshot.

use std::sync::{Arc, Mutex};

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use tracing::{error, info};

use crate::metrics::MetricsSummary;

/// Thread-safe holder of the most recently published round summary.
#[derive(Default)]
pub struct MetricsPublisher {
    current: Mutex<MetricsSummary>,
}

impl MetricsPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recently published summary, or the zero-value
    /// summary if no round has completed yet.
    pub fn get(&self) -> MetricsSummary {
        self.current.lock().unwrap().clone()
    }

    /// Replaces the published summary.
    pub fn set(&self, summary: MetricsSummary) {
        *self.current.lock().unwrap() = summary;
    }
}

/// HTTP handler for the reporting endpoint.
///
/// Any method on any path receives 200 with the latest summary as JSON; the
/// endpoint never surfaces internal errors to callers.
pub async fn report_handler(
    _req: Request<Body>,
    publisher: Arc<MetricsPublisher>,
) -> Result<Response<Body>, hyper::Error> {
    let body = match serde_json::to_vec(&publisher.get()) {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Failed to encode metrics summary");
            b"{}".to_vec()
        }
    };

    let response = Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap();

    Ok(response)
}

/// Starts the reporting HTTP server on `addr` (host:port).
///
/// Runs until the process exits; there is no shutdown path of its own. Bind
/// and lookup failures are logged and the task returns, leaving the driver
/// running without a reporting endpoint.
pub async fn serve(addr: String, publisher: Arc<MetricsPublisher>) {
    let resolved = match tokio::net::lookup_host(&addr).await {
        Ok(mut addrs) => addrs.next(),
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to resolve reporting address");
            return;
        }
    };
    let Some(resolved) = resolved else {
        error!(addr = %addr, "Reporting address resolved to nothing");
        return;
    };

    let make_svc = make_service_fn(move |_conn| {
        let publisher = publisher.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                let publisher = publisher.clone();
                async move { report_handler(req, publisher).await }
            }))
        }
    });

    let server = match Server::try_bind(&resolved) {
        Ok(builder) => builder.serve(make_svc),
        Err(e) => {
            error!(addr = %resolved, error = %e, "Failed to bind reporting server");
            return;
        }
    };

    info!(addr = %resolved, "Reporting server listening");

    if let Err(e) = server.await {
        error!(error = %e, "Reporting server error");
    }
}
