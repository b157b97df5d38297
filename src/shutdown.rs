//! Graceful-shutdown signalling.
//!
//! A single listener task arms the process's interrupt and termination
//! signals exactly once; the first signal trips a one-shot stop flag that the
//! round loop polls at round boundaries and between records. The listener
//! does not re-arm.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

/// One-shot cooperative stop flag, set by the signal listener and polled by
/// the round loop. Cloning shares the underlying flag.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the flag. Safe to call more than once.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Non-blocking check of the flag.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Spawns the signal listener: the first SIGINT or SIGTERM trips `flag` and
/// the task exits.
pub fn listen(flag: ShutdownFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Termination signal received, stopping after the current round");
        flag.trigger();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = %e, "Failed to install SIGINT handler");
            return;
        }
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c");
    }
}
