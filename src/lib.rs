//! Reliability layer for calls to a rate-limited inference service.
//!
//! A circuit breaker, a fixed-window rate limiter and a bounded retry
//! executor, composed behind [`InferenceClient`].

pub mod client;
pub mod config;
pub mod observability;
pub mod resilience;

pub use client::{CallResult, GuardStatus, InferenceClient, Transport};
pub use config::GuardConfig;
pub use resilience::{CircuitBreaker, CircuitState, ErrorKind, RateLimiter, RetryExecutor};
