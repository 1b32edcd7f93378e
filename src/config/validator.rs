//! Configuration validation rules.
//!
//! This module validates configuration for correctness:
//! - `site_name`, `admin_password` and `app_name` must be present
//! - Endpoints must parse as `[scheme://]host:port`
//! - Timing values must be usable (non-zero, at most a week, poll <= max wait)
//! - The compose invocation and service must be non-empty

use crate::config::schema::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::readiness::{Protocol, ServiceEndpoint};
use std::time::Duration;

/// Upper bound for any configured duration.
pub const MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Offending option
    pub field: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    fn new(rule: &str, field: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a configuration and return all errors.
///
/// This function collects all validation errors rather than stopping
/// at the first one, allowing users to fix multiple issues at once.
pub fn validate_config(config: &ProvisionConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_required(config));
    errors.extend(validate_endpoints(config));
    errors.extend(validate_timing(config));
    errors.extend(validate_compose(config));

    errors
}

/// Validate configuration, failing with a single [`ProvisionError::Configuration`].
pub fn validate(config: &ProvisionConfig) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        return Ok(());
    }

    let message = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    Err(ProvisionError::Configuration { message })
}

fn validate_required(config: &ProvisionConfig) -> Vec<ValidationError> {
    let required = [
        ("site_name", &config.site_name),
        ("admin_password", &config.admin_password),
        ("app_name", &config.app_name),
    ];

    let mut errors: Vec<_> = required
        .iter()
        .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
        .map(|(field, _)| {
            ValidationError::new("missing-option", field, format!("'{}' is required", field))
        })
        .collect();

    if let Some(site) = config.site_name.as_deref() {
        if site.contains('/') || site.chars().any(char::is_whitespace) {
            errors.push(ValidationError::new(
                "invalid-site-name",
                "site_name",
                format!("site_name '{}' must not contain '/' or whitespace", site),
            ));
        }
    }

    errors
}

fn validate_endpoints(config: &ProvisionConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let endpoints = [
        ("db_endpoint", &config.db_endpoint, Protocol::Mysql),
        ("app_endpoint", &config.app_endpoint, Protocol::Http),
    ];
    for (field, value, default) in endpoints {
        if let Some(raw) = value {
            if let Err(e) = ServiceEndpoint::parse_with_default(raw, default) {
                let reason = match e {
                    ProvisionError::Configuration { message } => message,
                    other => other.to_string(),
                };
                errors.push(ValidationError::new(
                    "invalid-endpoint",
                    field,
                    format!("{}: {}", field, reason),
                ));
            }
        }
    }

    let ports = [
        ("ports.http", config.ports.http),
        ("ports.socketio", config.ports.socketio),
        ("ports.cache", config.ports.cache),
        ("ports.database", config.ports.database),
    ];
    for (field, port) in ports {
        if port == 0 {
            errors.push(ValidationError::new(
                "invalid-port",
                field,
                format!("{} must be between 1 and 65535", field),
            ));
        }
    }

    errors
}

fn validate_timing(config: &ProvisionConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.poll_interval == Duration::ZERO {
        errors.push(ValidationError::new(
            "invalid-duration",
            "poll_interval",
            "poll_interval must be greater than zero",
        ));
    }

    if config.max_wait == Duration::ZERO {
        errors.push(ValidationError::new(
            "invalid-duration",
            "max_wait",
            "max_wait must be greater than zero",
        ));
    } else if config.poll_interval > config.max_wait {
        errors.push(ValidationError::new(
            "poll-exceeds-wait",
            "poll_interval",
            "poll_interval must not exceed max_wait",
        ));
    }

    if config.step_timeout == Duration::ZERO {
        errors.push(ValidationError::new(
            "invalid-duration",
            "step_timeout",
            "step_timeout must be greater than zero",
        ));
    }

    let durations = [
        ("max_wait", config.max_wait),
        ("poll_interval", config.poll_interval),
        ("step_timeout", config.step_timeout),
        ("backoff.base", config.backoff.base),
        ("backoff.max", config.backoff.max),
    ];
    for (field, value) in durations {
        if value > MAX_DURATION {
            errors.push(ValidationError::new(
                "duration-too-long",
                field,
                format!("{} must not exceed 168h ({}s)", field, MAX_DURATION.as_secs()),
            ));
        }
    }

    if config.backoff.base > config.backoff.max {
        errors.push(ValidationError::new(
            "invalid-backoff",
            "backoff",
            "backoff.base must not exceed backoff.max",
        ));
    }

    errors
}

fn validate_compose(config: &ProvisionConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.compose.command.iter().all(|t| t.trim().is_empty()) {
        errors.push(ValidationError::new(
            "missing-option",
            "compose.command",
            "compose.command must name the orchestrator binary",
        ));
    }
    if config.compose.service.trim().is_empty() {
        errors.push(ValidationError::new(
            "missing-option",
            "compose.service",
            "compose.service must not be empty",
        ));
    }
    if config.bench.trim().is_empty() {
        errors.push(ValidationError::new(
            "missing-option",
            "bench",
            "bench must not be empty",
        ));
    }

    errors
}
