//! Background task that drops expired buckets.
//!
//! Limiters already treat expired buckets as absent at read time, so the
//! sweeper only reclaims memory early for identifiers that never come back.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::limiter::RateLimiter;

/// Handle to a running sweeper task. Dropping it also stops the task.
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

/// Purge expired buckets from every limiter once. Returns the total removed.
pub fn sweep_once(limiters: &[Arc<RateLimiter>]) -> usize {
    limiters.iter().map(|limiter| limiter.purge_expired()).sum()
}

/// Spawn a sweeper on the current tokio runtime.
pub fn spawn_sweeper(limiters: Vec<Arc<RateLimiter>>, interval: Duration) -> SweeperHandle {
    let interval = interval.max(Duration::from_millis(1));
    let (tx, mut rx) = oneshot::channel::<()>();

    info!(interval_ms = interval.as_millis() as u64, "Starting bucket sweeper");

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut rx => {
                    debug!("Bucket sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let purged = sweep_once(&limiters);
                    if purged > 0 {
                        debug!(purged = purged, "Purged expired buckets");
                    }
                }
            }
        }
    });

    SweeperHandle {
        shutdown: Some(tx),
        task,
    }
}
