//! Processing deadline sweeper.
//!
//! [`DeadlineSweeper`] runs as a background task and periodically fails
//! rigging jobs that stayed in `processing` past their deadline, so an
//! asset whose worker died is not stuck forever.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::manager::RiggingLifecycle;

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Background service that expires overdue rigging jobs.
pub struct DeadlineSweeper {
    lifecycle: Arc<RiggingLifecycle>,
    interval: Duration,
}

impl DeadlineSweeper {
    pub fn new(lifecycle: Arc<RiggingLifecycle>, interval: Duration) -> Self {
        Self {
            lifecycle,
            interval,
        }
    }

    /// Run the sweep loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "Deadline sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Deadline sweeper cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// One pass over the processing jobs. Returns how many were expired.
    pub async fn sweep_once(&self) -> usize {
        match self.lifecycle.expire_overdue(Utc::now()).await {
            Ok(expired) => {
                if !expired.is_empty() {
                    tracing::warn!(
                        count = expired.len(),
                        assets = ?expired,
                        "Expired overdue rigging jobs"
                    );
                }
                expired.len()
            }
            Err(e) => {
                tracing::error!(error = %e, "Deadline sweep failed");
                0
            }
        }
    }
}
