//! Configuration validation.
//!
//! Serde handles the syntax; this module checks value ranges and the
//! relationships between fields. Every problem is reported, not only the
//! first one found.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GuardConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Upper bound on `retries.max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 20;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be greater than 0"));
    }
    if breaker.success_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.success_threshold", "must be greater than 0"));
    }
    if breaker.recovery_timeout_secs == 0 {
        errors.push(ValidationError::new("circuit_breaker.recovery_timeout_secs", "must be greater than 0"));
    }

    if config.rate_limit.max_requests_per_window == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests_per_window", "must be greater than 0"));
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }

    let retries = &config.retries;
    if retries.max_retries > MAX_RETRIES_LIMIT {
        errors.push(ValidationError::new(
            "retries.max_retries",
            format!("must be at most {MAX_RETRIES_LIMIT}"),
        ));
    }
    if retries.base_delay_ms == 0 {
        errors.push(ValidationError::new("retries.base_delay_ms", "must be greater than 0"));
    }
    if retries.max_delay_ms < retries.base_delay_ms {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            format!("must be at least base_delay_ms ({})", retries.base_delay_ms),
        ));
    }
    if !retries.backoff_multiplier.is_finite() || retries.backoff_multiplier < 1.0 {
        errors.push(ValidationError::new("retries.backoff_multiplier", "must be a finite number >= 1.0"));
    }

    let client = &config.client;
    if client.dependency.trim().is_empty() {
        errors.push(ValidationError::new("client.dependency", "must not be empty"));
    }
    if client.timeout_secs == 0 {
        errors.push(ValidationError::new("client.timeout_secs", "must be greater than 0"));
    }
    if !(0.0..=2.0).contains(&client.default_temperature) {
        errors.push(ValidationError::new("client.default_temperature", "must be between 0.0 and 2.0"));
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", observability.log_level),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GuardConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GuardConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        config.rate_limit.window_secs = 0;
        config.retries.max_delay_ms = 10;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "circuit_breaker.failure_threshold",
                "rate_limit.window_secs",
                "retries.max_delay_ms",
                "observability.log_level",
            ]
        );
    }

    #[test]
    fn test_max_retries_is_bounded() {
        let mut config = GuardConfig::default();
        config.retries.max_retries = MAX_RETRIES_LIMIT;
        assert!(validate_config(&config).is_ok());

        config.retries.max_retries = u32::MAX;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "retries.max_retries");
    }

    #[test]
    fn test_shrinking_multiplier_rejected() {
        let mut config = GuardConfig::default();
        config.retries.backoff_multiplier = 0.5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "retries.backoff_multiplier");

        config.retries.backoff_multiplier = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = GuardConfig::default();
        config.observability.metrics_address = "not-an-address".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("not-an-address"));
    }
}
