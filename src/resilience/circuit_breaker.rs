//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: dependency assumed down, requests fail fast
//! - Half-Open: probing whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures reach failure_threshold
//! Open → Half-Open: allow_request() after recovery_timeout since the last failure
//! Half-Open → Closed: consecutive successes reach success_threshold
//! Half-Open → Open: any failure
//! ```
//!
//! Half-Open admits every caller; concurrent probes race on the success
//! counter, which is serialized by the state mutex.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::resilience::clock::ClockAnchor;
use crate::observability::metrics;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding for the state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::Open => 1.0,
            Self::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure: Option<Instant>,
}

/// Point-in-time view of the breaker, for status reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<SystemTime>,
}

/// Health gate for one downstream dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: ArcSwap<CircuitBreakerConfig>,
    clock: ClockAnchor,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        metrics::record_breaker_state(&name, CircuitState::Closed);
        Self {
            name,
            config: ArcSwap::from_pointee(config),
            clock: ClockAnchor::now(),
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure: None,
            }),
        }
    }

    /// Dependency this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the thresholds. Counters and state are kept.
    pub fn update_config(&self, config: CircuitBreakerConfig) {
        self.config.store(Arc::new(config));
    }

    pub fn config(&self) -> Arc<CircuitBreakerConfig> {
        self.config.load_full()
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Whether a call may be attempted now.
    ///
    /// In Open this is the call that starts the probe window: once the
    /// recovery timeout has passed it moves the breaker to Half-Open.
    pub fn allow_request(&self) -> bool {
        self.allow_request_at(Instant::now())
    }

    pub fn allow_request_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovery_timeout = self.config.load().recovery_timeout();
                let elapsed = inner
                    .last_failure
                    .map(|at| now.saturating_duration_since(at) > recovery_timeout)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    drop(inner);
                    tracing::info!(dependency = %self.name, "Circuit breaker moving to half-open");
                    metrics::record_breaker_state(&self.name, CircuitState::HalfOpen);
                }
                elapsed
            }
        }
    }

    pub fn record_success(&self) {
        let success_threshold = self.config.load().success_threshold;
        let mut inner = self.lock();
        inner.consecutive_failures = 0;

        if inner.state == CircuitState::HalfOpen {
            inner.consecutive_successes += 1;
            if inner.consecutive_successes >= success_threshold {
                inner.state = CircuitState::Closed;
                drop(inner);
                tracing::info!(dependency = %self.name, "Circuit breaker closed, dependency recovered");
                metrics::record_breaker_state(&self.name, CircuitState::Closed);
            }
        }
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now())
    }

    pub fn record_failure_at(&self, now: Instant) {
        let failure_threshold = self.config.load().failure_threshold;
        let mut inner = self.lock();
        inner.last_failure = Some(now);

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= failure_threshold {
                    inner.state = CircuitState::Open;
                    let failures = inner.consecutive_failures;
                    drop(inner);
                    tracing::warn!(dependency = %self.name, failures, "Circuit breaker opened");
                    metrics::record_breaker_state(&self.name, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                drop(inner);
                tracing::warn!(dependency = %self.name, "Probe failed, circuit breaker reopened");
                metrics::record_breaker_state(&self.name, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.consecutive_failures,
            success_count: inner.consecutive_successes,
            last_failure_time: inner.last_failure.map(|at| self.clock.wall_at(at)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }
}
