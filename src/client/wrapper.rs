//! Client wrapper: the single entry point the application calls.
//!
//! # Responsibilities
//! - Own the circuit breaker, rate limiter and retry executor of one dependency
//! - Prepare chat requests (defaults, tool fields) and bound each attempt in time
//! - Normalize outcomes into [`CallResult`]
//! - Report a status snapshot for health consumers
//! - Apply reloaded configuration without losing breaker/limiter state

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::client::result::CallResult;
use crate::client::transport::{ChatRequest, Transport};
use crate::config::{ClientConfig, GuardConfig};
use crate::resilience::{
    CircuitBreaker, CircuitState, Classify, ErrorKind, RateLimiter, RetryExecutor, RetryPolicy,
};

/// Health snapshot of one guarded dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardStatus {
    pub dependency: String,
    pub circuit_state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub requests_this_window: u32,
    /// Unix seconds.
    pub window_start: u64,
    /// Unix seconds, `None` until the first recorded failure.
    pub last_failure_time: Option<u64>,
}

/// Error of a single attempt made by [`InferenceClient::chat_completion`].
#[derive(Debug)]
pub enum AttemptError<E> {
    Transport(E),
    /// The per-attempt deadline passed before the transport answered.
    Deadline(Duration),
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => e.fmt(f),
            Self::Deadline(after) => write!(f, "no response within {after:?}"),
        }
    }
}

impl<E: Classify> Classify for AttemptError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(e) => e.kind(),
            Self::Deadline(_) => ErrorKind::Timeout,
        }
    }
}

/// Reliable client for one downstream dependency.
pub struct InferenceClient<T> {
    transport: T,
    executor: RetryExecutor,
    settings: ArcSwap<ClientConfig>,
}

impl<T: Transport> InferenceClient<T> {
    /// Build a client with its own breaker and limiter.
    pub fn new(transport: T, config: &GuardConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            config.client.dependency.clone(),
            config.circuit_breaker.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self::with_guards(transport, breaker, limiter, config)
    }

    /// Build a client around an existing breaker and limiter, so several
    /// clients of the same dependency share one health gate and one quota.
    pub fn with_guards(
        transport: T,
        breaker: Arc<CircuitBreaker>,
        limiter: Arc<RateLimiter>,
        config: &GuardConfig,
    ) -> Self {
        tracing::info!(
            dependency = %breaker.name(),
            failure_threshold = config.circuit_breaker.failure_threshold,
            max_requests_per_window = config.rate_limit.max_requests_per_window,
            max_retries = config.retries.max_retries,
            "Inference client initialized"
        );
        Self {
            transport,
            executor: RetryExecutor::new(breaker, limiter, RetryPolicy::from(&config.retries)),
            settings: ArcSwap::from_pointee(config.client.clone()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        self.executor.breaker()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        self.executor.limiter()
    }

    /// Send a chat completion through the retry executor.
    pub async fn chat_completion(&self, request: ChatRequest) -> CallResult<T::Response> {
        let settings = self.settings.load_full();
        let request = request.prepared(&settings.default_model, settings.default_temperature);
        let deadline = settings.timeout();

        let request = &request;
        let outcome = self
            .executor
            .execute(move || self.attempt(request, deadline))
            .await;
        CallResult::from_outcome(outcome)
    }

    async fn attempt(
        &self,
        request: &ChatRequest,
        deadline: Duration,
    ) -> Result<T::Response, AttemptError<T::Error>> {
        match tokio::time::timeout(deadline, self.transport.send(request)).await {
            Ok(result) => result.map_err(AttemptError::Transport),
            Err(_) => Err(AttemptError::Deadline(deadline)),
        }
    }

    /// Run an arbitrary downstream call under the same guards.
    pub async fn execute<V, E, F, Fut>(&self, call: F) -> CallResult<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Classify + fmt::Display,
    {
        CallResult::from_outcome(self.executor.execute(call).await)
    }

    pub fn status(&self) -> GuardStatus {
        let breaker = self.breaker().snapshot();
        let window = self.limiter().snapshot();
        GuardStatus {
            dependency: self.breaker().name().to_string(),
            circuit_state: breaker.state,
            failure_count: breaker.failure_count,
            success_count: breaker.success_count,
            requests_this_window: window.requests_this_window,
            window_start: unix_secs(window.window_start),
            last_failure_time: breaker.last_failure_time.map(unix_secs),
        }
    }

    /// Swap in reloaded thresholds, quota, retry policy and client settings.
    ///
    /// Breaker and limiter counters are kept. The dependency name is fixed
    /// at construction and ignored here.
    pub fn apply_config(&self, config: &GuardConfig) {
        self.breaker().update_config(config.circuit_breaker.clone());
        self.limiter().update_config(config.rate_limit.clone());
        self.executor.update_policy(RetryPolicy::from(&config.retries));

        let mut settings = config.client.clone();
        if settings.dependency != self.breaker().name() {
            tracing::warn!(
                dependency = %self.breaker().name(),
                requested = %settings.dependency,
                "Dependency name cannot change on reload, keeping current"
            );
            settings.dependency = self.breaker().name().to_string();
        }
        self.settings.store(Arc::new(settings));
        tracing::info!(dependency = %self.breaker().name(), "Reloaded guard configuration");
    }
}

fn unix_secs(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
