//! Pending job storage for a single queue.

use std::collections::VecDeque;
use std::sync::Arc;

use super::error::{QueueError, Result};
use crate::protocol::{Job, JobId, Payload};

/// FIFO of jobs that are waiting to be delivered, plus the queue's id generator.
///
/// `pending` is always sorted by id: appends carry fresh (larger) ids and
/// [`JobStore::requeue_front`] inserts by id.
#[derive(Debug, Default)]
pub struct JobStore {
    pending: VecDeque<Job>,
    last_id: JobId,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn next_id(&mut self, now: u64) -> JobId {
        self.last_id = self.last_id.next(now);
        self.last_id
    }

    /// Append one job, returning its id.
    pub fn append(&mut self, queue: &Arc<str>, payload: Payload, now: u64) -> JobId {
        let id = self.next_id(now);
        self.pending
            .push_back(Job::new(id, Arc::clone(queue), payload, now));
        id
    }

    /// Append every payload in order, or none of them if the queue would
    /// grow past `max_len`.
    pub fn append_all(
        &mut self,
        queue: &Arc<str>,
        payloads: Vec<Payload>,
        now: u64,
        max_len: usize,
    ) -> Result<Vec<JobId>> {
        if self.pending.len().saturating_add(payloads.len()) > max_len {
            return Err(QueueError::Capacity(format!(
                "queue '{}' is full ({} pending, max {})",
                queue,
                self.pending.len(),
                max_len
            )));
        }

        self.pending.reserve(payloads.len());
        Ok(payloads
            .into_iter()
            .map(|payload| self.append(queue, payload, now))
            .collect())
    }

    /// Remove up to `n` jobs from the front, oldest first.
    pub fn take_up_to(&mut self, n: usize) -> Vec<Job> {
        let n = n.min(self.pending.len());
        self.pending.drain(..n).collect()
    }

    #[inline]
    pub fn peek_count(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[inline]
    pub fn last_id(&self) -> JobId {
        self.last_id
    }

    /// Put previously delivered jobs back, each at its id position.
    ///
    /// Returned jobs are older than anything appended after them, so in
    /// practice they land at the front.
    pub fn requeue_front(&mut self, jobs: Vec<Job>) {
        for job in jobs {
            let at = self.pending.partition_point(|j| j.id < job.id);
            self.pending.insert(at, job);
        }
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<JobId> {
        self.pending.iter().map(|j| j.id).collect()
    }
}
