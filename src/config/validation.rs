//! Configuration validation.
//!
//! Pure function over [`AppConfig`] returning every problem found.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

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

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must not be empty"));
    }

    for (field, path) in [
        ("haproxy.config_path", &config.haproxy.config_path),
        ("haproxy.binary", &config.haproxy.binary),
        ("haproxy.scratch_dir", &config.haproxy.scratch_dir),
        ("panel.root", &config.panel.root),
    ] {
        if path.as_os_str().is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        }
    }
    if config.haproxy.service_name.trim().is_empty() {
        errors.push(ValidationError::new("haproxy.service_name", "must not be empty"));
    }

    for (field, secs) in [
        ("haproxy.validate_timeout_secs", config.haproxy.validate_timeout_secs),
        ("panel.command_timeout_secs", config.panel.command_timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }
    if config.timeouts.request_secs < config.panel.command_timeout_secs {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must be at least panel.command_timeout_secs",
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than zero"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
