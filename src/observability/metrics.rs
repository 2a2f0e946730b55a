//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_attempts_total` (counter): downstream attempts by dependency
//! - `guard_retries_total` (counter): retries by dependency and error kind
//! - `guard_calls_total` (counter): finished calls by dependency and outcome
//! - `guard_call_duration_seconds` (histogram): call latency including retries
//! - `guard_rate_limit_wait_seconds` (histogram): time spent waiting for a window
//! - `guard_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::Instant;

use crate::resilience::{CircuitState, ErrorKind};

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_attempt(dependency: &str) {
    metrics::counter!("guard_attempts_total", "dependency" => dependency.to_string()).increment(1);
}

pub fn record_retry(dependency: &str, kind: ErrorKind) {
    metrics::counter!(
        "guard_retries_total",
        "dependency" => dependency.to_string(),
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// `outcome` is `success` or an error kind identifier.
pub fn record_call_outcome(dependency: &str, outcome: &'static str, started: Instant) {
    metrics::counter!(
        "guard_calls_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("guard_call_duration_seconds", "dependency" => dependency.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_rate_limit_wait(dependency: &str, wait: Duration) {
    metrics::histogram!("guard_rate_limit_wait_seconds", "dependency" => dependency.to_string())
        .record(wait.as_secs_f64());
}

pub fn record_breaker_state(dependency: &str, state: CircuitState) {
    metrics::gauge!("guard_circuit_state", "dependency" => dependency.to_string()).set(state.as_gauge());
}
