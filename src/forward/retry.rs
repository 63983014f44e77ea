//! Retry configuration and the shared retry loop.
//!
//! Every attempt asks the circuit breaker for permission, runs under the
//! per-attempt timeout and reports its outcome through the permit. An attempt
//! dropped mid-flight reports nothing and only returns its probe slot.
//! Transient failures are retried with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::breaker::CircuitBreaker;
use crate::error::ForwardError;

/// Configuration for retry behaviour on transient errors.
///
/// ```rust
/// # use cache_proxy::forward::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(4)
///     .initial_delay(Duration::from_millis(100))
///     .attempt_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 200ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries. Default: 5s.
    pub max_delay: Duration,
    /// Timeout applied to each attempt. Default: 10s.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no retry.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay after the given failed attempt (0-indexed):
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// Runs `f` until it succeeds, fails permanently, the breaker rejects the
/// call, or the attempt budget is spent.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    breaker: &CircuitBreaker,
    target: &str,
    f: F,
) -> Result<T, ForwardError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ForwardError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 0..max_attempts {
        let permit = breaker.try_acquire()?;

        let outcome = tokio::time::timeout(config.attempt_timeout, f())
            .await
            .unwrap_or(Err(ForwardError::Timeout));

        match outcome {
            Ok(value) => {
                permit.succeed();
                return Ok(value);
            }
            Err(e) if e.is_transient() => {
                permit.fail();
                if attempt + 1 < max_attempts {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        url = target,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => {
                // the origin is not at fault for a request we could not build
                permit.succeed();
                return Err(e);
            }
        }
    }

    Err(ForwardError::RetriesExhausted {
        attempts: max_attempts,
        last: Box::new(last_err.unwrap_or(ForwardError::Timeout)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::breaker::{BreakerConfig, CircuitState};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(attempts: u32) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(attempts)
            .initial_delay(Duration::from_millis(10))
            .attempt_timeout(Duration::from_secs(1))
    }

    fn lenient_breaker() -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: 100,
            ..BreakerConfig::default()
        })
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(350));
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(350));
        assert_eq!(config.delay_for_attempt(30), Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let calls = &AtomicU32::new(0);
        let breaker = lenient_breaker();

        let result = with_retry(&fast_retry(3), &breaker, "http://e.com", move || async move {
            if calls.fetch_add(1, Ordering::Relaxed) < 2 {
                Err(ForwardError::Connect("reset".into()))
            } else {
                Ok("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let calls = &AtomicU32::new(0);
        let breaker = lenient_breaker();

        let result: Result<(), _> = with_retry(&fast_retry(3), &breaker, "http://e.com", move || async move {
            calls.fetch_add(1, Ordering::Relaxed);
            Err(ForwardError::Upstream { status: 503 })
        })
        .await;

        assert!(matches!(
            result,
            Err(ForwardError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let breaker = lenient_breaker();

        let result: Result<(), _> = with_retry(&fast_retry(3), &breaker, "http://e.com", move || async move {
            calls.fetch_add(1, Ordering::Relaxed);
            Err(ForwardError::Request("bad header".into()))
        })
        .await;

        assert!(matches!(result, Err(ForwardError::Request(_))));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out() {
        let breaker = lenient_breaker();

        let result: Result<(), _> =
            with_retry(&fast_retry(1), &breaker, "http://e.com", move || async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        match result {
            Err(ForwardError::RetriesExhausted { last, .. }) => {
                assert!(matches!(*last, ForwardError::Timeout))
            }
            other => panic!("expected exhausted timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn open_circuit_fails_fast_without_calling() {
        let calls = &AtomicU32::new(0);
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 2,
            ..BreakerConfig::default()
        });

        let result: Result<(), _> = with_retry(&fast_retry(5), &breaker, "http://e.com", move || async move {
            calls.fetch_add(1, Ordering::Relaxed);
            Err(ForwardError::Timeout)
        })
        .await;

        assert!(matches!(result, Err(ForwardError::CircuitOpen)));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_probe_does_not_wedge_breaker() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            window: Duration::from_secs(10),
            cooldown: Duration::from_secs(5),
        });
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // caller goes away while the probe is still waiting on the origin
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            with_retry(&fast_retry(1), &breaker, "http://e.com", || {
                std::future::pending::<Result<(), ForwardError>>()
            }),
        )
        .await;
        assert!(abandoned.is_err());

        let result = with_retry(&fast_retry(1), &breaker, "http://e.com", || async {
            Ok::<_, ForwardError>("up")
        })
        .await;
        assert_eq!(result.unwrap(), "up");
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
