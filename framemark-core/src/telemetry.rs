//! Periodic resource usage polling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::Telemetry;
use crate::types::AppStats;

/// Default poll period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Background task sampling a [`Telemetry`] source.
///
/// The latest sample is published on a watch channel. Dropping the poller
/// stops the task.
#[derive(Debug)]
pub struct StatsPoller {
    task: JoinHandle<()>,
    latest: watch::Receiver<Option<AppStats>>,
}

impl StatsPoller {
    /// Start polling. Must be called inside a tokio runtime.
    pub fn spawn(source: Arc<dyn Telemetry>, interval: Duration) -> Self {
        let (tx, latest) = watch::channel(None);
        let period = if interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match source.get_stats().await {
                    Ok(stats) => {
                        if tx.send(Some(stats)).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "Stats poll failed"),
                }
            }
        });

        Self { task, latest }
    }

    /// Most recent sample, if any arrived yet.
    pub fn latest(&self) -> Option<AppStats> {
        *self.latest.borrow()
    }

    /// Wait for the next sample.
    pub async fn next(&mut self) -> Option<AppStats> {
        self.latest.changed().await.ok()?;
        *self.latest.borrow_and_update()
    }
}

impl Drop for StatsPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
