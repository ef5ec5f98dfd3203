use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::{info, warn};

use super::manager::QueueManager;
use super::types::now_ms;

/// What one expiry pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub redelivered: usize,
    pub dropped: usize,
}

impl QueueManager {
    pub async fn background_tasks(self: Arc<Self>) {
        let mut sweep_ticker = interval(Duration::from_millis(self.settings.sweep_interval_ms.max(1)));
        let mut stats_ticker = interval(Duration::from_secs(60));

        loop {
            tokio::select! {
                _ = sweep_ticker.tick() => {
                    if self.is_shutdown() {
                        break;
                    }
                    self.sweep_expired(now_ms());
                }
                _ = stats_ticker.tick() => {
                    let stats = self.stats();
                    info!(
                        queues = stats.queues,
                        pending = stats.pending,
                        in_flight = stats.in_flight,
                        waiters = stats.waiters,
                        pushed = stats.pushed,
                        acked = stats.acked,
                        "Queue stats"
                    );
                }
            }
        }
    }

    /// Return expired in-flight jobs to their queues, or drop them once they
    /// reached `max_deliveries`.
    ///
    /// Redelivered jobs go back at their id position, which is the front of
    /// the queue unless older jobs were redelivered too.
    pub fn sweep_expired(&self, now: u64) -> SweepOutcome {
        let max_deliveries = self.settings.max_deliveries;
        let mut outcome = SweepOutcome::default();

        for queue in self.registry.list() {
            let redelivered = {
                let mut state = queue.state.lock();
                if state.in_flight.is_empty() {
                    continue;
                }
                let expired = state.in_flight.sweep_expired(now);
                if expired.is_empty() {
                    continue;
                }

                let mut retry = Vec::with_capacity(expired.len());
                for entry in expired {
                    if max_deliveries > 0 && entry.job.deliveries >= max_deliveries {
                        warn!(
                            queue = %queue.key,
                            id = %entry.job.id,
                            deliveries = entry.job.deliveries,
                            consumer = entry.consumer,
                            "Dropping job after max deliveries"
                        );
                        outcome.dropped += 1;
                        self.metrics.record_dropped(1);
                    } else {
                        retry.push(entry.job);
                    }
                }
                let n = retry.len();
                state.store.requeue_front(retry);
                n
            };

            if redelivered > 0 {
                outcome.redelivered += redelivered;
                self.metrics.record_redelivered(redelivered as u64);
                info!(queue = %queue.key, jobs = redelivered, "Visibility timeout expired, jobs requeued");
                self.wake_waiters(&queue);
            }
        }

        outcome
    }
}
