//! Retry with bounded exponential backoff.
//!
//! Retries only failures the error taxonomy classifies as retryable;
//! everything else propagates on first occurrence. Substituting a default
//! result on exhaustion is the gateway's responsibility, not this module's.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use civiscan_core::{Error, Result};

use crate::rate_limiter::RateLimiter;

/// Progress callback invoked before each backoff sleep with the 1-based
/// next attempt number and the total attempt budget.
pub type RetryCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Retry policy for provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and base delay.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
            ..Default::default()
        }
    }

    /// Cap the exponential backoff delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the deadline applied to each individual attempt.
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Total attempts, including the first.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff delay after the given zero-indexed attempt.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }

    /// Execute `operation` with rate limiting, classification-aware retry,
    /// and a per-attempt timeout.
    ///
    /// The rate limiter is acquired before every attempt, including the
    /// first. On exhaustion or a non-retryable failure the last error is
    /// propagated to the caller.
    pub async fn execute<F, Fut, T>(
        &self,
        limiter: &RateLimiter,
        mut operation: F,
        on_retry: Option<RetryCallback>,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            limiter.acquire().await;

            let result = match timeout(self.attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(self.attempt_timeout)),
            };

            match result {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(attempts = attempt + 1, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !error.is_retryable() {
                        tracing::debug!(%error, "Non-retryable error");
                        return Err(error);
                    }

                    if attempt + 1 >= self.max_retries {
                        tracing::warn!(
                            max_retries = self.max_retries,
                            %error,
                            "Retry budget exhausted"
                        );
                        return Err(error);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "Attempt failed, retrying"
                    );
                    metrics::counter!("civiscan_provider_retries_total").increment(1);

                    if let Some(callback) = &on_retry {
                        callback(attempt + 2, self.max_retries);
                    }

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn unpaced() -> RateLimiter {
        RateLimiter::new(Duration::ZERO)
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::default();

        let counter = calls.clone();
        let result = policy
            .execute(
                &unpaced(),
                || {
                    let counter = counter.clone();
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(Error::overloaded("503"))
                        } else {
                            Ok(42)
                        }
                    }
                },
                None,
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_last_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let counter = calls.clone();
        let result: Result<()> = policy
            .execute(
                &unpaced(),
                || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(Error::rate_limited("quota exceeded"))
                    }
                },
                None,
            )
            .await;

        assert!(matches!(result, Err(Error::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_propagates_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::default();

        let counter = calls.clone();
        let result: Result<()> = policy
            .execute(
                &unpaced(),
                || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(Error::network("connection refused"))
                    }
                },
                None,
            )
            .await;

        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_per_attempt() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let policy = RetryPolicy::new(3, Duration::from_millis(1_000));

        let log = attempts.clone();
        let result: Result<()> = policy
            .execute(
                &unpaced(),
                || {
                    let log = log.clone();
                    async move {
                        log.lock().unwrap().push(Instant::now());
                        Err(Error::overloaded("503"))
                    }
                },
                None,
            )
            .await;
        assert!(result.is_err());

        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[1] - attempts[0], Duration::from_millis(1_000));
        assert_eq!(attempts[2] - attempts[1], Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn on_retry_reports_next_attempt_number() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let sink = reported.clone();
        let callback: RetryCallback = Arc::new(move |next, max| {
            sink.lock().unwrap().push((next, max));
        });

        let result: Result<()> = policy
            .execute(
                &unpaced(),
                || async { Err(Error::overloaded("503")) },
                Some(callback),
            )
            .await;
        assert!(result.is_err());

        assert_eq!(*reported.lock().unwrap(), vec![(2, 3), (3, 3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempts_hit_the_deadline_and_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy =
            RetryPolicy::new(2, Duration::from_millis(10)).with_attempt_timeout(Duration::from_secs(1));

        let counter = calls.clone();
        let result: Result<()> = policy
            .execute(
                &unpaced(),
                || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        sleep(Duration::from_secs(3600)).await;
                        Ok(())
                    }
                },
                None,
            )
            .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_paces_every_attempt() {
        let limiter = RateLimiter::new(Duration::from_millis(2_000));
        let policy = RetryPolicy::new(2, Duration::from_millis(100));

        let start = Instant::now();
        let result: Result<()> = policy
            .execute(
                &limiter,
                || async { Err(Error::overloaded("503")) },
                None,
            )
            .await;
        assert!(result.is_err());

        // Attempt 1 at t=0, backoff 100ms, then the limiter holds attempt 2
        // until 2s past the first release.
        assert!(start.elapsed() >= Duration::from_millis(2_000));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_secs(10)).with_max_delay(Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(20));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(30));
    }
}
