//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//! - Refuse placeholder secrets for enabled surfaces
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::{GateConfig, PLACEHOLDER_API_KEY};

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

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be at least 1"));
    }
    if rate_limit.window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.window_ms", "must be greater than 0"));
    }
    if let Some(header) = &rate_limit.client_header {
        if HeaderName::try_from(header.as_str()).is_err() {
            errors.push(ValidationError::new(
                "rate_limit.client_header",
                format!("'{header}' is not a valid header name"),
            ));
        }
    }

    if config.scheduler.handler_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            "scheduler.handler_timeout_ms",
            "must be greater than 0 when set",
        ));
    }

    if config.security.enable_headers
        && HeaderValue::from_str(&config.security.content_security_policy).is_err()
    {
        errors.push(ValidationError::new(
            "security.content_security_policy",
            "contains characters not allowed in a header value",
        ));
    }

    if !config.site.url_prefix.starts_with('/') || !config.site.url_prefix.ends_with('/') {
        errors.push(ValidationError::new(
            "site.url_prefix",
            "must start and end with '/'",
        ));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    let admin = &config.admin;
    if admin.enabled {
        if admin.api_key.is_empty() || admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set to a real secret when the admin API is enabled",
            ));
        }
        if admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a socket address", admin.bind_address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
