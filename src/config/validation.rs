//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Keep the control prefix and the default mount apart
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DangerRoomConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::DangerRoomConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
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
pub fn validate_config(config: &DangerRoomConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "not a socket address"));
    }

    let prefix = &config.control.prefix;
    if !prefix.starts_with('/') || !prefix.ends_with('/') || prefix.len() < 2 {
        errors.push(ValidationError::new(
            "control.prefix",
            "must start and end with '/' and name a path segment",
        ));
    } else if prefix.contains(['{', '}', '*']) {
        errors.push(ValidationError::new("control.prefix", "must not contain '{', '}' or '*'"));
    }

    let mount = &config.control.default_mount;
    if !mount.starts_with('/') || mount.ends_with('/') {
        errors.push(ValidationError::new(
            "control.default_mount",
            "must start with '/' and must not end with '/'",
        ));
    } else if format!("{}/", mount).starts_with(prefix.as_str()) {
        errors.push(ValidationError::new("control.default_mount", "lies under the control prefix"));
    }

    if config.control.max_body_bytes == 0 {
        errors.push(ValidationError::new("control.max_body_bytes", "must be positive"));
    }

    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.connect_timeout_secs", "must be positive"));
    }

    if config.observability.metrics_enabled && config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
