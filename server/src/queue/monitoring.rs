//! Monitoring operations.
//!
//! Per-queue info and server-wide statistics.

use std::sync::atomic::Ordering;

use super::error::{QueueError, Result};
use super::manager::QueueManager;
use crate::protocol::{QueueInfo, StatsData};

impl QueueManager {
    /// Counters for one queue. Unknown queues are an error, not created.
    pub fn info(&self, queue: &str) -> Result<QueueInfo> {
        let queue = self
            .registry
            .get(queue)
            .ok_or_else(|| QueueError::EmptyKey(queue.to_string()))?;
        let state = queue.state.lock();
        Ok(QueueInfo {
            queue: queue.key.to_string(),
            last_id: state.store.last_id(),
            pending: state.store.peek_count(),
            in_flight: state.in_flight.len(),
            waiters: state.waiters.len(),
        })
    }

    /// Get summary statistics across all queues.
    pub fn stats(&self) -> StatsData {
        let mut stats = StatsData {
            pushed: self.metrics.total_pushed.load(Ordering::Relaxed),
            delivered: self.metrics.total_delivered.load(Ordering::Relaxed),
            acked: self.metrics.total_acked.load(Ordering::Relaxed),
            redelivered: self.metrics.total_redelivered.load(Ordering::Relaxed),
            dropped: self.metrics.total_dropped.load(Ordering::Relaxed),
            ..StatsData::default()
        };

        for queue in self.registry.list() {
            let state = queue.state.lock();
            stats.queues += 1;
            stats.pending += state.store.peek_count();
            stats.in_flight += state.in_flight.len();
            stats.waiters += state.waiters.len();
        }
        stats
    }

    /// Names of all known queues.
    pub fn list_queues(&self) -> Vec<String> {
        self.registry
            .list()
            .iter()
            .map(|queue| queue.key.to_string())
            .collect()
    }
}
