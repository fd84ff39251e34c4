//! Configuration validation.
//!
//! Returns every problem found, not just the first. Runs before a config is
//! accepted into the system.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::NetawareConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Validate value ranges and cross-field constraints.
pub fn validate_config(config: &NetawareConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.health.poll_interval_secs == 0 {
        errors.push(ValidationError::new("health.poll_interval_secs", "must be > 0"));
    }
    if config.health.failure_threshold == 0 {
        errors.push(ValidationError::new("health.failure_threshold", "must be > 0"));
    }
    if config.query.timeout_ms == 0 {
        errors.push(ValidationError::new("query.timeout_ms", "must be > 0"));
    }
    if config.query.retry_base_delay_ms > config.query.retry_max_delay_ms {
        errors.push(ValidationError::new(
            "query.retry_base_delay_ms",
            "must not exceed query.retry_max_delay_ms",
        ));
    }
    if config.query.stale_time_secs > config.query.gc_time_secs {
        errors.push(ValidationError::new(
            "query.stale_time_secs",
            "must not exceed query.gc_time_secs",
        ));
    }
    if config.mutation.timeout_ms == 0 {
        errors.push(ValidationError::new("mutation.timeout_ms", "must be > 0"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
