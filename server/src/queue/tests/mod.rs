//! Test suite for QueueManager - organized by functionality.
//!
//! Run all tests: `cargo test`
//! Run specific module: `cargo test queue::tests::blocking`

use super::background::SweepOutcome;
use super::*;
use crate::protocol::{BlockTimeout, Delivery, JobId, Payload};
use std::sync::Arc;
use std::time::Duration;

/// Consumer ids used across the suite
pub const ALICE: u64 = 1;
pub const BOB: u64 = 2;

/// Create a new QueueManager for testing (in-memory, default settings).
pub fn setup() -> Arc<QueueManager> {
    QueueManager::new()
}

pub fn setup_with(settings: QueueSettings) -> Arc<QueueManager> {
    QueueManager::with_settings(settings)
}

pub fn payloads(items: &[&str]) -> Vec<Payload> {
    items.iter().map(|s| Payload::from(*s)).collect()
}

pub fn keys(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// `(queue, payload)` pairs of a POP result, for readable assertions
pub fn contents(deliveries: &[Delivery]) -> Vec<(String, String)> {
    deliveries
        .iter()
        .map(|d| {
            (
                d.queue.to_string(),
                String::from_utf8_lossy(d.payload.as_bytes()).into_owned(),
            )
        })
        .collect()
}

pub async fn pop_now(qm: &QueueManager, names: &[&str], count: usize) -> Vec<Delivery> {
    qm.pop(&keys(names), count, BlockTimeout::NoWait, ALICE)
        .await
        .unwrap()
}

/// Wait until `n` POPs are blocked on `queue`.
pub async fn wait_for_waiters(qm: &QueueManager, queue: &str, n: usize) {
    for _ in 0..500 {
        if qm.info(queue).map(|i| i.waiters).unwrap_or(0) == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("expected {} waiters on {}", n, queue);
}



// Visibility timeout and redelivery
mod redelivery;


// Concurrent producers and consumers
mod concurrent;
