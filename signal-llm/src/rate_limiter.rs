//! Request spacing for backend calls
//!
//! Concurrent extraction workers share one limiter so that calls to a
//! hosted provider are spread out instead of arriving in bursts.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum delay between consecutive requests
///
/// Each caller reserves its slot while holding the lock and sleeps after
/// releasing it, so concurrent callers never share a slot.
#[derive(Debug)]
pub struct RateLimiter {
    /// Next free slot, in milliseconds since `epoch`
    next_slot_ms: Mutex<u64>,
    epoch: Instant,
    min_interval: Duration,
    name: String,
    total_requests: AtomicU64,
    delayed_requests: AtomicU64,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, name: &str) -> Self {
        Self {
            next_slot_ms: Mutex::new(0),
            epoch: Instant::now(),
            min_interval,
            name: name.to_string(),
            total_requests: AtomicU64::new(0),
            delayed_requests: AtomicU64::new(0),
        }
    }

    /// Build a limiter from a request interval, or none when the interval is zero
    pub fn optional(min_interval: Duration, name: &str) -> Option<Self> {
        (!min_interval.is_zero()).then(|| Self::new(min_interval, name))
    }

    fn elapsed_ms(&self, instant: Instant) -> u64 {
        instant.duration_since(self.epoch).as_millis() as u64
    }

    /// Wait until this caller's reserved slot comes up
    pub async fn acquire(&self) {
        let request_num = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;
        let interval_ms = self.min_interval.as_millis() as u64;
        let now_ms = self.elapsed_ms(Instant::now());

        let slot_ms = {
            let mut next_slot = self.next_slot_ms.lock().await;
            let slot = (*next_slot).max(now_ms);
            *next_slot = slot + interval_ms;
            slot
        };

        if slot_ms > now_ms {
            self.delayed_requests.fetch_add(1, Ordering::Relaxed);
            let target = self.epoch + Duration::from_millis(slot_ms);
            let wait = target.saturating_duration_since(Instant::now());
            debug!(
                limiter = %self.name,
                request = request_num,
                wait_ms = wait.as_millis() as u64,
                "Delaying request"
            );
            tokio::time::sleep_until(target).await;
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            delayed_requests: self.delayed_requests.load(Ordering::Relaxed),
            min_interval_ms: self.min_interval.as_millis() as u64,
            name: self.name.clone(),
        }
    }
}

/// Usage counters for one limiter
#[derive(Debug, Clone)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub delayed_requests: u64,
    pub min_interval_ms: u64,
    pub name: String,
}
