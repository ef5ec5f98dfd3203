use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// ============== Coarse Timestamp ==============
// Cached timestamp updated every 1ms - avoids syscall per operation

static COARSE_TIME_MS: AtomicU64 = AtomicU64::new(0);

/// Initialize coarse timestamp background updater
pub fn init_coarse_time() {
    COARSE_TIME_MS.store(actual_now_ms(), Ordering::Relaxed);

    tokio::spawn(async {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(1));
        loop {
            interval.tick().await;
            COARSE_TIME_MS.store(actual_now_ms(), Ordering::Relaxed);
        }
    });
}

#[inline(always)]
fn actual_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Get current timestamp (coarse, ±1ms precision, zero syscall)
#[inline(always)]
pub fn now_ms() -> u64 {
    let cached = COARSE_TIME_MS.load(Ordering::Relaxed);
    if cached == 0 {
        // Fallback if not initialized
        actual_now_ms()
    } else {
        cached
    }
}

// ============== Global Metrics ==============

pub struct GlobalMetrics {
    pub total_pushed: AtomicU64,
    pub total_delivered: AtomicU64,
    pub total_acked: AtomicU64,
    pub total_redelivered: AtomicU64,
    pub total_dropped: AtomicU64,
}

impl GlobalMetrics {
    pub fn new() -> Self {
        Self {
            total_pushed: AtomicU64::new(0),
            total_delivered: AtomicU64::new(0),
            total_acked: AtomicU64::new(0),
            total_redelivered: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub fn record_push(&self, count: u64) {
        self.total_pushed.fetch_add(count, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_delivered(&self, count: u64) {
        self.total_delivered.fetch_add(count, Ordering::Relaxed);
    }

    /// Deliveries handed to a request that went away before reading them.
    #[inline(always)]
    pub fn record_undelivered(&self, count: u64) {
        self.total_delivered.fetch_sub(count, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_ack(&self) {
        self.total_acked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_redelivered(&self, count: u64) {
        self.total_redelivered.fetch_add(count, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_dropped(&self, count: u64) {
        self.total_dropped.fetch_add(count, Ordering::Relaxed);
    }
}

impl Default for GlobalMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_falls_back_to_wall_clock() {
        let before = actual_now_ms();
        let now = now_ms();
        assert!(now >= before);
    }

    #[test]
    fn test_metrics_counters() {
        let metrics = GlobalMetrics::new();
        metrics.record_push(3);
        metrics.record_delivered(2);
        metrics.record_undelivered(1);
        metrics.record_ack();
        metrics.record_redelivered(4);
        metrics.record_dropped(1);

        assert_eq!(metrics.total_pushed.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.total_delivered.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_acked.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_redelivered.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.total_dropped.load(Ordering::Relaxed), 1);
    }
}
