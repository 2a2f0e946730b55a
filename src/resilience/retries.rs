//! Retry executor.
//!
//! Runs one guarded call: consults the rate limiter and circuit breaker
//! before every attempt, classifies failures, and sleeps the backoff delay
//! between attempts. Attempts of one call are strictly sequential.
//!
//! Each call ends in exactly one `record_success` or `record_failure` on the
//! breaker, except a call rejected by an open breaker, which records neither.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::observability::metrics;
use crate::resilience::backoff::RetryPolicy;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::classify::{Classify, ErrorKind, Failure};
use crate::resilience::rate_limit::RateLimiter;

/// Composes the breaker, the limiter and the retry policy.
#[derive(Debug)]
pub struct RetryExecutor {
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
    policy: ArcSwap<RetryPolicy>,
}

impl RetryExecutor {
    pub fn new(breaker: Arc<CircuitBreaker>, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            breaker,
            limiter,
            policy: ArcSwap::from_pointee(policy),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn policy(&self) -> Arc<RetryPolicy> {
        self.policy.load_full()
    }

    /// Replace the policy; calls already running keep the one they started with.
    pub fn update_policy(&self, policy: RetryPolicy) {
        self.policy.store(Arc::new(policy));
    }

    /// Run `call` under the retry policy.
    ///
    /// `call` is invoked once per attempt and must produce a fresh future
    /// each time.
    pub async fn execute<T, E, F, Fut>(&self, call: F) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let span = tracing::info_span!(
            "guarded_call",
            dependency = %self.breaker.name(),
            call_id = %Uuid::new_v4(),
        );
        self.run(call).instrument(span).await
    }

    async fn run<T, E, F, Fut>(&self, mut call: F) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let policy = self.policy.load_full();
        let dependency = self.breaker.name();
        let started = Instant::now();
        let mut attempt: u32 = 0;

        let failure = loop {
            if let Some(wait) = self.limiter.wait_needed() {
                tracing::warn!(wait = ?wait, "Rate limit reached, waiting for window reset");
                metrics::record_rate_limit_wait(dependency, wait);
                tokio::time::sleep(wait).await;
                self.limiter.reset_window();
            }

            if !self.breaker.allow_request() {
                tracing::warn!(attempt, "Circuit breaker open, rejecting call");
                metrics::record_call_outcome(dependency, ErrorKind::CircuitOpen.as_str(), started);
                return Err(Failure::circuit_open());
            }

            metrics::record_attempt(dependency);
            match call().await {
                Ok(value) => {
                    self.breaker.record_success();
                    self.limiter.record_request();
                    if attempt > 0 {
                        tracing::info!(attempt, "Call succeeded after retry");
                    }
                    metrics::record_call_outcome(dependency, "success", started);
                    return Ok(value);
                }
                Err(err) => {
                    let failure = Failure::from_error(&err);
                    if failure.kind.is_retryable() && attempt < policy.max_retries {
                        let delay = policy.delay(attempt);
                        tracing::warn!(
                            attempt = attempt + 1,
                            kind = %failure.kind,
                            delay = ?delay,
                            "Retryable failure, backing off"
                        );
                        metrics::record_retry(dependency, failure.kind);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    break failure;
                }
            }
        };

        self.breaker.record_failure();
        tracing::error!(
            attempts = attempt.saturating_add(1),
            kind = %failure.kind,
            detail = %failure.detail,
            "Guarded call failed"
        );
        metrics::record_call_outcome(dependency, failure.kind.as_str(), started);
        Err(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, RateLimitConfig};
    use crate::resilience::circuit_breaker::CircuitState;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct TestError(ErrorKind);

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "injected {}", self.0)
        }
    }

    impl Classify for TestError {
        fn kind(&self) -> ErrorKind {
            self.0
        }
    }

    fn assert_elapsed(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(10),
            "elapsed {elapsed:?}, expected {expected:?}"
        );
    }

    fn executor() -> RetryExecutor {
        RetryExecutor::new(
            Arc::new(CircuitBreaker::new("test", CircuitBreakerConfig::default())),
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            RetryPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_exhausts_retries() {
        let exec = executor();
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let result: Result<(), _> = exec
            .execute(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TestError(ErrorKind::ServerError))
            })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::ServerError);
        assert_eq!(failure.detail, "injected server_error");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 1 + 2 + 4 seconds of backoff, no sleep after the last attempt.
        assert_elapsed(start, Duration::from_secs(7));
        assert_eq!(exec.breaker().snapshot().failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_timeouts() {
        let exec = executor();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result = exec
            .execute(move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError(ErrorKind::Timeout))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let snapshot = exec.breaker().snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(exec.limiter().snapshot().requests_this_window, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_kinds_are_not_retried() {
        for kind in [ErrorKind::AuthError, ErrorKind::BadRequest, ErrorKind::Unknown] {
            let exec = executor();
            let calls = AtomicU32::new(0);
            let counter = &calls;
            let start = Instant::now();

            let result: Result<(), _> = exec
                .execute(move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TestError(kind))
                })
                .await;

            assert_eq!(result.unwrap_err().kind, kind);
            assert_eq!(calls.load(Ordering::SeqCst), 1, "{kind} was retried");
            assert_eq!(start.elapsed(), Duration::ZERO);
            assert_eq!(exec.breaker().snapshot().failure_count, 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_short_circuits() {
        let exec = executor();
        for _ in 0..5 {
            exec.breaker().record_failure();
        }
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = exec
            .execute(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(())
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::CircuitOpen);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(exec.breaker().snapshot().failure_count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opening_mid_retry_stops_the_loop() {
        let exec = RetryExecutor::new(
            Arc::new(CircuitBreaker::new("test", CircuitBreakerConfig::default())),
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            RetryPolicy::default(),
        );
        for _ in 0..4 {
            exec.breaker().record_failure();
        }
        let calls = AtomicU32::new(0);
        let breaker = exec.breaker().clone();

        let result: Result<(), _> = exec
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let breaker = breaker.clone();
                async move {
                    if n == 0 {
                        // Another caller trips the breaker while this one backs off.
                        breaker.record_failure();
                    }
                    Err(TestError(ErrorKind::ConnectionError))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::CircuitOpen);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_window_when_quota_used() {
        let exec = executor();
        for _ in 0..50 {
            exec.limiter().record_request();
        }
        tokio::time::advance(Duration::from_secs(10)).await;
        let start = Instant::now();

        let result = exec.execute(|| async { Ok::<_, TestError>(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert_elapsed(start, Duration::from_secs(50));
        assert_eq!(exec.limiter().snapshot().requests_this_window, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_update_applies_to_next_call() {
        let exec = executor();
        exec.update_policy(RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        });
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = exec
            .execute(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TestError(ErrorKind::RateLimited))
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::RateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
