//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated)
//!     → InferenceClient::new / apply_config
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new GuardConfig sent to the owner of the client
//!     → thresholds swapped, breaker/limiter counters kept
//! ```

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CircuitBreakerConfig, ClientConfig, GuardConfig, ObservabilityConfig, RateLimitConfig,
    RetryConfig,
};
pub use validation::ValidationError;
pub use watcher::ConfigWatcher;
