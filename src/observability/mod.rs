//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resilience/ and client/ produce:
//!     → logging.rs (structured log events, one span per guarded call)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout log stream
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
