//! Acknowledgement of delivered jobs.

use tracing::debug;

use super::manager::QueueManager;
use crate::protocol::JobId;

impl QueueManager {
    /// Remove a delivered job for good.
    ///
    /// Returns false, never an error, when the queue or the job is unknown or
    /// the job was already acknowledged. Unknown queues are not created.
    pub fn ack(&self, queue: &str, id: JobId) -> bool {
        let Some(queue) = self.registry.get(queue) else {
            return false;
        };
        let acked = queue.state.lock().in_flight.ack(id);
        if acked {
            self.metrics.record_ack();
        } else {
            debug!(queue = %queue.key, id = %id, "ACK for unknown or already acknowledged job");
        }
        acked
    }
}
