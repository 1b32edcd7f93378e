//! Configuration file discovery and loading.
//!
//! The configuration is read from an explicit `--config` path or, failing
//! that, from `provision.yml` / `provision.yaml` in the working directory.
//! Command-line overrides are applied on top of the file.

use crate::config::schema::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File names searched for when no explicit path is given.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["provision.yml", "provision.yaml"];

/// Values supplied on the command line or via the environment.
///
/// `None` leaves the file's value untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_wait: Option<Duration>,
    pub poll_interval: Option<Duration>,
    pub retries_per_step: Option<u32>,
    pub admin_password: Option<String>,
}

impl ConfigOverrides {
    /// Apply overrides onto `config`.
    pub fn apply(&self, config: &mut ProvisionConfig) {
        if let Some(wait) = self.max_wait {
            config.max_wait = wait;
        }
        if let Some(poll) = self.poll_interval {
            config.poll_interval = poll;
        }
        if let Some(retries) = self.retries_per_step {
            config.retries_per_step = retries;
        }
        if let Some(password) = &self.admin_password {
            config.admin_password = Some(password.clone());
        }
    }
}

/// A loaded configuration and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ProvisionConfig,
    pub path: PathBuf,
}

impl LoadedConfig {
    /// Directory the configuration file lives in.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Directory external commands should run in.
    ///
    /// `compose.project_dir` when set (relative to the config file),
    /// otherwise the config file's directory.
    pub fn project_dir(&self) -> PathBuf {
        match &self.config.compose.project_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.base_dir().join(dir),
            None => self.base_dir().to_path_buf(),
        }
    }
}

/// Find the configuration file to use.
///
/// # Errors
///
/// Returns `ConfigNotFound` if `explicit` does not exist, or if no default
/// file exists in `cwd`.
pub fn find_config(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        return if path.is_file() {
            Ok(path)
        } else {
            Err(ProvisionError::ConfigNotFound { path })
        };
    }

    DEFAULT_CONFIG_NAMES
        .iter()
        .map(|name| cwd.join(name))
        .find(|p| p.is_file())
        .ok_or_else(|| ProvisionError::ConfigNotFound {
            path: cwd.join(DEFAULT_CONFIG_NAMES[0]),
        })
}

/// Load a single config file and parse it into [`ProvisionConfig`].
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<ProvisionConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProvisionError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ProvisionError::Io(e)
        }
    })?;

    parse_config(&content, path)
}

/// Parse YAML content into [`ProvisionConfig`].
///
/// An empty document yields the defaults.
pub fn parse_config(content: &str, source_path: &Path) -> Result<ProvisionConfig> {
    if content.trim().is_empty() {
        return Ok(ProvisionConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| ProvisionError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Discover, load and override the configuration.
///
/// Validation is left to the caller.
pub fn load_config(
    explicit: Option<&Path>,
    cwd: &Path,
    overrides: &ConfigOverrides,
) -> Result<LoadedConfig> {
    let path = find_config(explicit, cwd)?;
    tracing::debug!("Loading configuration from {}", path.display());

    let mut config = load_config_file(&path)?;
    overrides.apply(&mut config);

    Ok(LoadedConfig { config, path })
}
