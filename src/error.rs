//! Error types for provisioning operations.
//!
//! This module defines [`ProvisionError`], the primary error type used
//! throughout the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Transient process failures ([`ProvisionError::ProcessExit`] and
//!   [`ProvisionError::ProcessTimeout`]) are retried by the sequencer
//! - Everything else is fatal for the step that raised it
//! - Every kind maps to a distinct process exit code via
//!   [`ProvisionError::exit_code`]

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Core error type for provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Missing or invalid configuration option.
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// The command could not be started at all.
    #[error("Failed to launch '{command}': {message}")]
    ProcessLaunch { command: String, message: String },

    /// The command ran past its timeout and was killed.
    #[error("Command timed out after {}s: {command}", timeout.as_secs_f64())]
    ProcessTimeout {
        command: String,
        timeout: Duration,
        output: String,
    },

    /// The command exited unsuccessfully.
    #[error("Command failed with exit code {code:?}: {command}")]
    ProcessExit {
        command: String,
        code: Option<i32>,
        output: String,
    },

    /// A service never became ready within the allowed wait.
    #[error("{endpoint} not ready after {}s ({attempts} attempts)", waited.as_secs_f64())]
    ReadinessTimeout {
        endpoint: String,
        waited: Duration,
        attempts: u32,
        last_error: Option<String>,
    },

    /// The run was interrupted by the operator.
    #[error("Provisioning cancelled")]
    Cancelled,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProvisionError {
    /// Whether the sequencer may retry the step that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProvisionError::ProcessExit { .. } | ProvisionError::ProcessTimeout { .. }
        )
    }

    /// Process exit code reported when this error aborts a run.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::ConfigNotFound { .. }
            | ProvisionError::ConfigParseError { .. }
            | ProvisionError::Configuration { .. } => 2,
            ProvisionError::ProcessLaunch { .. } => 3,
            ProvisionError::ProcessExit { .. } => 4,
            ProvisionError::ProcessTimeout { .. } => 5,
            ProvisionError::ReadinessTimeout { .. } => 6,
            ProvisionError::Cancelled => 130,
            ProvisionError::Io(_) | ProvisionError::Other(_) => 1,
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::ConfigNotFound { .. }
            | ProvisionError::ConfigParseError { .. }
            | ProvisionError::Configuration { .. } => "configuration",
            ProvisionError::ProcessLaunch { .. } => "process_launch",
            ProvisionError::ProcessTimeout { .. } => "process_timeout",
            ProvisionError::ProcessExit { .. } => "process_exit",
            ProvisionError::ReadinessTimeout { .. } => "readiness_timeout",
            ProvisionError::Cancelled => "cancelled",
            ProvisionError::Io(_) => "io",
            ProvisionError::Other(_) => "other",
        }
    }

    /// Output captured from the failing process, if any.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            ProvisionError::ProcessExit { output, .. }
            | ProvisionError::ProcessTimeout { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn exit_error() -> ProvisionError {
        ProvisionError::ProcessExit {
            command: "docker compose build".into(),
            code: Some(1),
            output: "no such service".into(),
        }
    }

    fn timeout_error() -> ProvisionError {
        ProvisionError::ProcessTimeout {
            command: "docker compose up -d".into(),
            timeout: Duration::from_secs(30),
            output: String::new(),
        }
    }

    #[test]
    fn config_not_found_displays_path() {
        let err = ProvisionError::ConfigNotFound {
            path: PathBuf::from("/srv/provision.yml"),
        };
        assert!(err.to_string().contains("/srv/provision.yml"));
    }

    #[test]
    fn process_exit_displays_command_and_code() {
        let msg = exit_error().to_string();
        assert!(msg.contains("docker compose build"));
        assert!(msg.contains("1"));
    }

    #[test]
    fn readiness_timeout_displays_endpoint() {
        let err = ProvisionError::ReadinessTimeout {
            endpoint: "mysql://db:3306".into(),
            waited: Duration::from_secs(60),
            attempts: 12,
            last_error: Some("connection refused".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("mysql://db:3306"));
        assert!(msg.contains("12 attempts"));
    }

    #[test]
    fn only_exit_and_timeout_are_retryable() {
        assert!(exit_error().is_retryable());
        assert!(timeout_error().is_retryable());
        assert!(!ProvisionError::ProcessLaunch {
            command: "dockr".into(),
            message: "not found".into(),
        }
        .is_retryable());
        assert!(!ProvisionError::Configuration {
            message: "site_name is required".into(),
        }
        .is_retryable());
        assert!(!ProvisionError::Cancelled.is_retryable());
    }

    #[test]
    fn exit_codes_are_distinct_per_kind() {
        let codes = [
            ProvisionError::Configuration {
                message: String::new(),
            }
            .exit_code(),
            ProvisionError::ProcessLaunch {
                command: String::new(),
                message: String::new(),
            }
            .exit_code(),
            exit_error().exit_code(),
            timeout_error().exit_code(),
            ProvisionError::ReadinessTimeout {
                endpoint: String::new(),
                waited: Duration::ZERO,
                attempts: 0,
                last_error: None,
            }
            .exit_code(),
            ProvisionError::Cancelled.exit_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn captured_output_is_exposed_for_process_failures() {
        assert_eq!(exit_error().captured_output(), Some("no such service"));
        assert_eq!(ProvisionError::Cancelled.captured_output(), None);
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: ProvisionError = io_err.into();
        assert!(matches!(err, ProvisionError::Io(_)));
        assert_eq!(err.kind(), "io");
    }
}
