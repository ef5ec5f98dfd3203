//! Tracking of delivered but unacknowledged jobs.

use rustc_hash::FxHashMap;

use crate::protocol::{ConsumerId, Delivery, Job, JobId};

#[derive(Debug)]
pub struct InFlightEntry {
    pub job: Job,
    pub consumer: ConsumerId,
    /// Absolute expiry (ms); past it the job may be redelivered
    pub deadline: u64,
}

#[derive(Debug, Default)]
pub struct InFlightTracker {
    entries: FxHashMap<JobId, InFlightEntry>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `job` as handed to `consumer` and return what the consumer sees.
    pub fn mark_delivered(
        &mut self,
        mut job: Job,
        consumer: ConsumerId,
        visibility_timeout_ms: u64,
        now: u64,
    ) -> Delivery {
        job.deliveries = job.deliveries.saturating_add(1);
        job.last_delivery = now;
        let delivery = Delivery::from(&job);
        self.entries.insert(
            job.id,
            InFlightEntry {
                job,
                consumer,
                deadline: now.saturating_add(visibility_timeout_ms),
            },
        );
        delivery
    }

    /// Acknowledge a job. False if it is unknown or was already acknowledged.
    #[inline]
    pub fn ack(&mut self, id: JobId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Take back a delivery that never reached its consumer.
    pub fn release(&mut self, id: JobId) -> Option<Job> {
        self.entries.remove(&id).map(|entry| {
            let mut job = entry.job;
            job.deliveries = job.deliveries.saturating_sub(1);
            job
        })
    }

    /// Remove and return every entry whose deadline is before `now`, by id.
    pub fn sweep_expired(&mut self, now: u64) -> Vec<InFlightEntry> {
        let expired: Vec<JobId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline < now)
            .map(|(id, _)| *id)
            .collect();

        let mut entries: Vec<InFlightEntry> = expired
            .into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .collect();
        entries.sort_unstable_by_key(|entry| entry.job.id);
        entries
    }

    #[inline]
    pub fn get(&self, id: JobId) -> Option<&InFlightEntry> {
        self.entries.get(&id)
    }

    #[cfg(test)]
    pub fn contains(&self, id: JobId) -> bool {
        self.entries.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
