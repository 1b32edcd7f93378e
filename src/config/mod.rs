//! Configuration loading, parsing, and validation.
//!
//! This module handles all aspects of configuration:
//! - Schema definitions in [`schema`]
//! - File discovery, loading and CLI overrides in [`loader`]
//! - Validation in [`validator`]
//! - Duration syntax in [`duration`]
//!
//! # Example
//!
//! ```
//! use provision::config::{load_config, validate, ConfigOverrides};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! fs::write(
//!     temp.path().join("provision.yml"),
//!     "site_name: erp.localhost\nadmin_password: admin\napp_name: inventory_tools\n",
//! )
//! .unwrap();
//!
//! let loaded = load_config(None, temp.path(), &ConfigOverrides::default()).unwrap();
//! validate(&loaded.config).unwrap();
//! assert_eq!(loaded.config.site_name.as_deref(), Some("erp.localhost"));
//! ```

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validator;

pub use duration::{format_duration, parse_duration};
pub use loader::{
    find_config, load_config, load_config_file, parse_config, ConfigOverrides, LoadedConfig,
    DEFAULT_CONFIG_NAMES,
};
pub use schema::{BackoffConfig, ComposeConfig, PortsConfig, ProvisionConfig};
pub use validator::{validate, validate_config, ValidationError};
