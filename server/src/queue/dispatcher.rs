//! Multi-key POP, immediate and blocking.
//!
//! A POP first drains ready jobs from its keys in the order given, so earlier
//! keys act as higher priority. If nothing is ready and the caller allows
//! blocking, a [`Waiter`] is registered on every key and the request parks on
//! a oneshot channel. Producers hand jobs to waiters directly (see
//! [`QueueManager::wake_waiters`]), oldest registration first, so a woken
//! request never races other consumers for the jobs that woke it.
//!
//! Lock order: a waiter's state lock before any queue lock; when several
//! queue locks are held they are taken in lexical key order.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashSet;
use tokio::sync::oneshot;
use tracing::debug;

use super::error::{QueueError, Result};
use super::manager::QueueManager;
use super::registry::{Queue, QueueState};
use super::types::now_ms;
use super::validation::{validate_count, validate_queue_name};
use crate::protocol::{BlockTimeout, ConsumerId, Delivery, Job, JobId};

/// A blocked POP, registered with every queue it reads from.
pub(crate) struct Waiter {
    seq: u64,
    consumer: ConsumerId,
    count: usize,
    /// Queues in caller (priority) order
    queues: Vec<Arc<Queue>>,
    /// Indexes into `queues`, sorted by key
    lock_order: Vec<usize>,
    state: Mutex<WaiterState>,
}

enum WaiterState {
    Waiting(oneshot::Sender<Vec<Delivery>>),
    Done,
}

/// Result of offering ready jobs to a waiter.
enum Offer {
    Fulfilled(usize),
    /// Nothing left for it on any of its queues
    Starved,
    /// Already fulfilled or cancelled
    Gone,
}

impl Waiter {
    fn new(
        seq: u64,
        consumer: ConsumerId,
        count: usize,
        queues: Vec<Arc<Queue>>,
    ) -> (Arc<Self>, oneshot::Receiver<Vec<Delivery>>) {
        let (tx, rx) = oneshot::channel();
        let lock_order = lock_order(&queues);
        let waiter = Arc::new(Self {
            seq,
            consumer,
            count,
            queues,
            lock_order,
            state: Mutex::new(WaiterState::Waiting(tx)),
        });
        (waiter, rx)
    }

    #[inline]
    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }
}

fn lock_order(queues: &[Arc<Queue>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..queues.len()).collect();
    order.sort_by(|&a, &b| queues[a].key.cmp(&queues[b].key));
    order
}

/// Lock every queue in lexical key order; guards come back in caller order.
fn lock_all<'q>(queues: &'q [Arc<Queue>], order: &[usize]) -> Vec<MutexGuard<'q, QueueState>> {
    let mut slots: Vec<Option<MutexGuard<'q, QueueState>>> = queues.iter().map(|_| None).collect();
    for &i in order {
        slots[i] = Some(queues[i].state.lock());
    }
    slots.into_iter().flatten().collect()
}

/// A registered waiter owned by the POP that created it.
///
/// Dropped before completion (the client went away), it deregisters the
/// waiter and puts back any jobs that were handed over in the meantime.
struct PendingPop<'a> {
    manager: &'a QueueManager,
    waiter: Arc<Waiter>,
    rx: oneshot::Receiver<Vec<Delivery>>,
    finished: bool,
}

impl PendingPop<'_> {
    async fn wait(&mut self) -> Vec<Delivery> {
        let deliveries = (&mut self.rx).await.unwrap_or_default();
        self.finished = true;
        deliveries
    }

    /// Stop waiting. Jobs that were handed over concurrently are still returned.
    fn time_out(&mut self) -> Vec<Delivery> {
        self.finished = true;
        self.manager.cancel_waiter(&self.waiter);
        self.rx.try_recv().unwrap_or_default()
    }
}

impl Drop for PendingPop<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.manager.cancel_waiter(&self.waiter);
        if let Ok(deliveries) = self.rx.try_recv() {
            self.manager.restore(deliveries);
        }
        debug!(
            consumer = self.waiter.consumer,
            waiter = self.waiter.seq,
            "Blocked POP cancelled"
        );
    }
}

impl QueueManager {
    /// Pop up to `count` jobs from `keys`, earlier keys first.
    ///
    /// Returns as soon as at least one job is available. With
    /// `BlockTimeout::NoWait` an empty result comes back immediately;
    /// otherwise the call waits for a push, for the timeout (empty result),
    /// or until the returned future is dropped.
    pub async fn pop(
        &self,
        keys: &[String],
        count: usize,
        block: BlockTimeout,
        consumer: ConsumerId,
    ) -> Result<Vec<Delivery>> {
        validate_count(count)?;
        if keys.is_empty() {
            return Err(QueueError::Validation(
                "POP requires at least one key".to_string(),
            ));
        }
        for key in keys {
            validate_queue_name(key)?;
        }
        let queues = self.resolve_keys(keys);

        let ready = self.take_ready(&queues, count, consumer);
        if !ready.is_empty() || block == BlockTimeout::NoWait {
            return Ok(ready);
        }

        let (waiter, rx) = Waiter::new(self.next_waiter_seq(), consumer, count, queues);
        if let Some(ready) = self.register_waiter(&waiter) {
            return Ok(ready);
        }
        debug!(consumer, waiter = waiter.seq, keys = ?keys, count, "POP blocked");

        let mut pending = PendingPop {
            manager: self,
            waiter,
            rx,
            finished: false,
        };

        let deliveries = match block {
            BlockTimeout::For(timeout) => {
                let waited = tokio::time::timeout(timeout, pending.wait()).await;
                match waited {
                    Ok(deliveries) => deliveries,
                    Err(_) => pending.time_out(),
                }
            }
            _ => pending.wait().await,
        };
        Ok(deliveries)
    }

    /// Queues for `keys` in caller order, duplicates collapsed.
    fn resolve_keys(&self, keys: &[String]) -> Vec<Arc<Queue>> {
        let mut seen = FxHashSet::default();
        keys.iter()
            .filter(|key| seen.insert(key.as_str()))
            .map(|key| self.registry.get_or_create(key))
            .collect()
    }

    /// Non-blocking pass over `queues`, one queue lock at a time.
    pub(crate) fn take_ready(
        &self,
        queues: &[Arc<Queue>],
        count: usize,
        consumer: ConsumerId,
    ) -> Vec<Delivery> {
        let now = now_ms();
        let mut out = Vec::with_capacity(count.min(1024));
        for queue in queues {
            if out.len() >= count {
                break;
            }
            let mut state = queue.state.lock();
            self.deliver_from(&mut state, count - out.len(), consumer, now, &mut out);
        }
        self.metrics.record_delivered(out.len() as u64);
        out
    }

    #[inline]
    fn deliver_from(
        &self,
        state: &mut QueueState,
        n: usize,
        consumer: ConsumerId,
        now: u64,
        out: &mut Vec<Delivery>,
    ) {
        for job in state.store.take_up_to(n) {
            out.push(state.in_flight.mark_delivered(
                job,
                consumer,
                self.settings.visibility_timeout_ms,
                now,
            ));
        }
    }

    fn drain_locked(
        &self,
        guards: &mut [MutexGuard<'_, QueueState>],
        count: usize,
        consumer: ConsumerId,
    ) -> Vec<Delivery> {
        let now = now_ms();
        let mut out = Vec::new();
        for guard in guards.iter_mut() {
            if out.len() >= count {
                break;
            }
            self.deliver_from(guard, count - out.len(), consumer, now, &mut out);
        }
        self.metrics.record_delivered(out.len() as u64);
        out
    }

    /// Register `waiter` on all its queues, unless jobs showed up since the
    /// first pass; those are returned instead.
    ///
    /// Holding every queue lock while checking and registering means a push
    /// either lands before the check or sees the waiter.
    fn register_waiter(&self, waiter: &Arc<Waiter>) -> Option<Vec<Delivery>> {
        let mut guards = lock_all(&waiter.queues, &waiter.lock_order);
        let ready = self.drain_locked(&mut guards, waiter.count, waiter.consumer);
        if !ready.is_empty() {
            return Some(ready);
        }
        for guard in guards.iter_mut() {
            guard.waiters.push_back(Arc::clone(waiter));
        }
        None
    }

    /// Try to complete `waiter` from its queues, in its own key order.
    fn offer(&self, waiter: &Arc<Waiter>) -> Offer {
        let mut state = waiter.state.lock();
        if matches!(*state, WaiterState::Done) {
            return Offer::Gone;
        }

        let mut guards = lock_all(&waiter.queues, &waiter.lock_order);
        let deliveries = self.drain_locked(&mut guards, waiter.count, waiter.consumer);
        if deliveries.is_empty() {
            return Offer::Starved;
        }
        for guard in guards.iter_mut() {
            guard.remove_waiter(waiter.seq);
        }
        drop(guards);

        // Send before releasing the waiter: a concurrent time_out or drop
        // either finds the jobs in the channel or never sees them at all.
        let delivered = deliveries.len();
        let unsent = match std::mem::replace(&mut *state, WaiterState::Done) {
            WaiterState::Waiting(tx) => tx.send(deliveries).err(),
            WaiterState::Done => Some(deliveries),
        };
        drop(state);

        match unsent {
            Some(deliveries) => {
                self.restore(deliveries);
                Offer::Gone
            }
            None => Offer::Fulfilled(delivered),
        }
    }

    /// Offer jobs now pending on `queue` to its waiters, oldest first.
    ///
    /// Callers have already released the queue lock, so a non-blocking POP
    /// can still slip in ahead of the waiters here.
    pub(crate) fn wake_waiters(&self, queue: &Arc<Queue>) {
        let waiters: Vec<Arc<Waiter>> = {
            let state = queue.state.lock();
            if state.store.is_empty() || state.waiters.is_empty() {
                return;
            }
            state.waiters.iter().cloned().collect()
        };

        for waiter in waiters {
            if queue.state.lock().store.is_empty() {
                break;
            }
            if let Offer::Fulfilled(n) = self.offer(&waiter) {
                debug!(
                    queue = %queue.key,
                    consumer = waiter.consumer,
                    waiter = waiter.seq,
                    jobs = n,
                    "Woke blocked POP"
                );
            }
        }
    }

    /// Deregister a waiter from all its queues. No-op once it completed.
    pub(crate) fn cancel_waiter(&self, waiter: &Waiter) {
        let previous = std::mem::replace(&mut *waiter.state.lock(), WaiterState::Done);
        if let WaiterState::Waiting(_) = previous {
            for queue in &waiter.queues {
                queue.state.lock().remove_waiter(waiter.seq);
            }
        }
    }

    /// Put deliveries that never reached a consumer back into their queues.
    pub(crate) fn restore(&self, deliveries: Vec<Delivery>) {
        if deliveries.is_empty() {
            return;
        }
        self.metrics.record_undelivered(deliveries.len() as u64);

        let mut by_queue: Vec<(Arc<str>, Vec<JobId>)> = Vec::new();
        for delivery in deliveries {
            match by_queue.iter_mut().find(|(key, _)| *key == delivery.queue) {
                Some((_, ids)) => ids.push(delivery.id),
                None => by_queue.push((delivery.queue, vec![delivery.id])),
            }
        }

        for (key, ids) in by_queue {
            let Some(queue) = self.registry.get(&key) else {
                continue;
            };
            {
                let mut state = queue.state.lock();
                let jobs: Vec<Job> = ids
                    .into_iter()
                    .filter_map(|id| state.in_flight.release(id))
                    .collect();
                debug!(queue = %key, jobs = jobs.len(), "Restored undelivered jobs");
                state.store.requeue_front(jobs);
            }
            self.wake_waiters(&queue);
        }
    }
}
