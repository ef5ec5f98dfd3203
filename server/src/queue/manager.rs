//! Core QueueManager struct and constructors.
//!
//! The actual operations are implemented in separate modules:
//! - push.rs - PUSH (bulk append + waiter hand-off)
//! - dispatcher.rs - POP (immediate and blocking multi-key pop)
//! - ack.rs - ACK
//! - background.rs - visibility-timeout sweeper
//! - monitoring.rs - INFO / STATS

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::registry::QueueRegistry;
use super::types::GlobalMetrics;
use super::validation::{MAX_BATCH_SIZE, MAX_PAYLOAD_SIZE, MAX_QUEUE_LEN};

#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// How long a delivered job stays hidden before it may be redelivered
    pub visibility_timeout_ms: u64,
    /// Interval of the expiry sweep
    pub sweep_interval_ms: u64,
    /// Drop a job instead of redelivering it once it was delivered this
    /// many times (0 = unlimited)
    pub max_deliveries: u32,
    pub max_queue_len: usize,
    pub max_batch_size: usize,
    pub max_payload_size: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            visibility_timeout_ms: 30_000,
            sweep_interval_ms: 500,
            max_deliveries: 0,
            max_queue_len: MAX_QUEUE_LEN,
            max_batch_size: MAX_BATCH_SIZE,
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }
}

pub struct QueueManager {
    pub(crate) registry: QueueRegistry,
    pub(crate) settings: QueueSettings,
    pub(crate) metrics: GlobalMetrics,
    /// Registration order of blocked POPs
    pub(crate) waiter_seq: AtomicU64,
    // Shutdown flag for graceful shutdown of background tasks
    pub(crate) shutdown_flag: AtomicBool,
}

impl QueueManager {
    /// Create a new in-memory QueueManager with default settings.
    pub fn new() -> Arc<Self> {
        Self::with_settings(QueueSettings::default())
    }

    pub fn with_settings(settings: QueueSettings) -> Arc<Self> {
        Arc::new(Self {
            registry: QueueRegistry::new(),
            settings,
            metrics: GlobalMetrics::new(),
            waiter_seq: AtomicU64::new(1),
            shutdown_flag: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn next_waiter_seq(&self) -> u64 {
        self.waiter_seq.fetch_add(1, Ordering::Relaxed)
    }
}
