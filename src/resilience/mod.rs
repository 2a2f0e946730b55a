//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Guarded call:
//!     → retries.rs (RetryExecutor loop, one iteration per attempt)
//!         → rate_limit.rs (wait out the window if the quota is used)
//!         → circuit_breaker.rs (fail fast with CircuitOpen if open)
//!         → downstream call
//!         → classify.rs (error → ErrorKind, retryable?)
//!         → backoff.rs (delay before the next attempt)
//!     → circuit_breaker.rs (one record_success / record_failure per call)
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod clock;
pub mod rate_limit;
pub mod retries;

pub use backoff::RetryPolicy;
pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use classify::{classify, classify_status, Classify, ErrorKind, Failure, RETRYABLE};
pub use rate_limit::{RateLimiter, WindowSnapshot};
pub use retries::RetryExecutor;
