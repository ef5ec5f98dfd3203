//! Named queues, created lazily on first reference.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;

use super::dispatcher::Waiter;
use super::inflight::InFlightTracker;
use super::store::JobStore;

/// Everything about one queue that must change together.
#[derive(Default)]
pub struct QueueState {
    pub store: JobStore,
    pub in_flight: InFlightTracker,
    /// Blocked POPs, in registration order
    pub(crate) waiters: VecDeque<Arc<Waiter>>,
}

impl QueueState {
    pub(crate) fn remove_waiter(&mut self, seq: u64) {
        self.waiters.retain(|w| w.seq() != seq);
    }
}

pub struct Queue {
    pub key: Arc<str>,
    pub(crate) state: Mutex<QueueState>,
}

impl Queue {
    fn new(key: &str) -> Self {
        Self {
            key: Arc::from(key),
            state: Mutex::new(QueueState::default()),
        }
    }
}

/// Concurrent map from queue name to its single `Queue` instance.
pub struct QueueRegistry {
    queues: DashMap<Arc<str>, Arc<Queue>, FxBuildHasher>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self {
            queues: DashMap::with_capacity_and_hasher(64, FxBuildHasher),
        }
    }

    /// Return the queue for `key`, creating it on first use.
    pub fn get_or_create(&self, key: &str) -> Arc<Queue> {
        if let Some(queue) = self.queues.get(key) {
            return Arc::clone(queue.value());
        }
        let queue = Arc::new(Queue::new(key));
        Arc::clone(
            self.queues
                .entry(Arc::clone(&queue.key))
                .or_insert(queue)
                .value(),
        )
    }

    /// Look up a queue without creating it.
    pub fn get(&self, key: &str) -> Option<Arc<Queue>> {
        self.queues.get(key).map(|q| Arc::clone(q.value()))
    }

    /// Snapshot of all queues, sorted by name.
    pub fn list(&self) -> Vec<Arc<Queue>> {
        let mut queues: Vec<Arc<Queue>> = self.queues.iter().map(|q| Arc::clone(q.value())).collect();
        queues.sort_by(|a, b| a.key.cmp(&b.key));
        queues
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let registry = QueueRegistry::new();
        let a = registry.get_or_create("jobs");
        let b = registry.get_or_create("jobs");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_does_not_create() {
        let registry = QueueRegistry::new();
        assert!(registry.get("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_sorted() {
        let registry = QueueRegistry::new();
        registry.get_or_create("b");
        registry.get_or_create("a");
        registry.get_or_create("c");
        let names: Vec<String> = registry.list().iter().map(|q| q.key.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_concurrent_creation_single_instance() {
        let registry = Arc::new(QueueRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get_or_create("shared"))
            })
            .collect();

        let queues: Vec<Arc<Queue>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for q in &queues[1..] {
            assert!(Arc::ptr_eq(&queues[0], q));
        }
        assert_eq!(registry.len(), 1);
    }
}
