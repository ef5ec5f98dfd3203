//! Push operations for adding jobs to a queue.

use tracing::debug;

use super::error::Result;
use super::manager::QueueManager;
use super::types::now_ms;
use super::validation::{validate_batch, validate_queue_name};
use crate::protocol::{JobId, Payload};

impl QueueManager {
    /// Append `payloads` to `queue` as independent jobs, in order.
    ///
    /// Either every payload is enqueued or none is. Blocked POPs registered on
    /// the queue are served before this returns.
    ///
    /// The hand-off runs after the queue lock is released, so a POP arriving
    /// on another connection while this push is still in flight may take the
    /// new jobs first. Ordering is only guaranteed among registered waiters.
    pub fn push(&self, queue: &str, payloads: Vec<Payload>) -> Result<Vec<JobId>> {
        validate_queue_name(queue)?;
        validate_batch(
            &payloads,
            self.settings.max_batch_size,
            self.settings.max_payload_size,
        )?;

        let queue = self.registry.get_or_create(queue);
        let ids = {
            let mut state = queue.state.lock();
            state.store.append_all(
                &queue.key,
                payloads,
                now_ms(),
                self.settings.max_queue_len,
            )?
        };

        self.metrics.record_push(ids.len() as u64);
        debug!(queue = %queue.key, count = ids.len(), "Pushed jobs");

        self.wake_waiters(&queue);
        Ok(ids)
    }
}
