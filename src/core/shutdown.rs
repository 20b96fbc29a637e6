//! Shutdown coordination.
//!
//! A single [`CancellationToken`] is shared by the fetcher and the player.
//! Cancelling it is idempotent and permanent.

use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the shutdown signal and the grace period applied after it fires
#[derive(Debug, Clone)]
pub struct Shutdown {
    token: CancellationToken,
    grace_period: Duration,
}

impl Shutdown {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace_period,
        }
    }

    /// Token observed by the long-running loops
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Set the signal. Returns `true` only on the first call.
    pub fn trigger(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for SIGINT (or SIGTERM on unix), then set the signal
    pub async fn wait_for_interrupt(&self) -> Result<()> {
        tokio::select! {
            result = wait_for_os_signal() => result?,
            // Already triggered elsewhere (e.g. a loop gave up)
            _ = self.token.cancelled() => {}
        }

        if self.trigger() {
            info!("Shutting down...");
        }
        Ok(())
    }

    /// Give the loops up to the grace period to finish in-flight work.
    ///
    /// Tasks still running afterwards are aborted. Returns `true` if every task
    /// finished on its own.
    pub async fn drain(&self, tasks: Vec<JoinHandle<()>>) -> bool {
        let aborts: Vec<_> = tasks.iter().map(|t| t.abort_handle()).collect();

        let joined = tokio::time::timeout(self.grace_period, async {
            for task in tasks {
                if let Err(e) = task.await {
                    if e.is_panic() {
                        warn!("Background task panicked: {}", e);
                    }
                }
            }
        })
        .await;

        match joined {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "Grace period of {:?} elapsed, abandoning in-flight work",
                    self.grace_period
                );
                for abort in aborts {
                    abort.abort();
                }
                false
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_os_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
