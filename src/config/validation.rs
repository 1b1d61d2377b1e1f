//! Configuration validation.
//!
//! Semantic checks that serde cannot express. All problems are reported
//! together rather than stopping at the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ApiConfig;

/// One year.
const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// A single semantic problem in the configuration.
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
pub fn validate_config(config: &ApiConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.limiter.enabled {
        let rps = config.limiter.requests_per_second;
        if !(rps.is_finite() && rps > 0.0) {
            errors.push(ValidationError::new(
                "limiter.requests_per_second",
                "must be a positive number",
            ));
        }
        if config.limiter.burst == 0 {
            errors.push(ValidationError::new("limiter.burst", "must be at least 1"));
        }
    }

    for origin in &config.cors.trusted_origins {
        if origin.trim().is_empty() || origin == "*" {
            errors.push(ValidationError::new(
                "cors.trusted_origins",
                format!("'{origin}' is not an exact origin"),
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.shutdown.grace_secs == 0 {
        errors.push(ValidationError::new("shutdown.grace_secs", "must be greater than 0"));
    }

    for (field, secs) in [
        ("tokens.authentication_ttl_secs", config.tokens.authentication_ttl_secs),
        ("tokens.activation_ttl_secs", config.tokens.activation_ttl_secs),
    ] {
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&secs) {
            errors.push(ValidationError::new(
                field,
                format!("must be between 1 and {MAX_TOKEN_TTL_SECS}"),
            ));
        }
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
