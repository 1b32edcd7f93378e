//! Provision - readiness-driven site provisioning.
//!
//! Builds and starts a containerized stack, waits until the database
//! actually accepts connections, then creates the site and installs the
//! app. Steps that are already done are skipped, transient failures are
//! retried with backoff, and the first fatal failure stops the run with a
//! report of every step.
//!
//! # Modules
//!
//! - [`cancel`] - Cooperative cancellation on SIGINT/SIGTERM
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`readiness`] - Protocol-level readiness probing
//! - [`runner`] - Step sequencing, retries and the final report
//! - [`secrets`] - Output masking for credentials
//! - [`shell`] - External command execution
//! - [`steps`] - Step definitions, idempotency checks and the standard plan
//! - [`ui`] - Spinners and terminal output
//!
//! # Example
//!
//! ```
//! use provision::config::ProvisionConfig;
//! use provision::steps::build_plan;
//!
//! let config = ProvisionConfig {
//!     site_name: Some("erp.localhost".to_string()),
//!     admin_password: Some("admin".to_string()),
//!     app_name: Some("inventory_tools".to_string()),
//!     ..Default::default()
//! };
//! let steps = build_plan(&config).unwrap();
//! assert_eq!(steps[2].name, "wait-for-db");
//! ```

pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod readiness;
pub mod runner;
pub mod secrets;
pub mod shell;
pub mod steps;
pub mod ui;

pub use error::{ProvisionError, Result};
