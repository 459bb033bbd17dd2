//! Pacing of outbound provider calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Enforces a minimum interval between successive outbound provider calls.
///
/// One instance is shared by every caller in the process. The interval
/// clock restarts when an `acquire` releases its caller, not when the call
/// starts. The mutex is held across the spacing sleep, so a concurrent
/// acquire can never compute its wait from a stale timestamp.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Default spacing between provider calls.
    pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(2_000);

    /// Create a limiter with the given minimum interval.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_release: Mutex::new(None),
        }
    }

    /// Suspend the caller until at least the minimum interval has elapsed
    /// since the previous `acquire` released its caller.
    pub async fn acquire(&self) {
        let mut last = self.last_release.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            let now = Instant::now();
            if now < ready_at {
                tracing::debug!(
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "Rate limiting provider call"
                );
                sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }

    /// Configured minimum interval.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_INTERVAL)
    }
}
