//! Configuration schema definitions.
//!
//! These structs map directly onto `provision.yml`. Everything that the old
//! provisioning script hard-coded (ports, credentials, service names) is an
//! explicit field here.

use crate::config::duration::serde_format;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for `provision.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    /// Site to create, e.g. `erp.localhost`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,

    /// Administrator password for the new site.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,

    /// Database root password passed to site creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_root_password: Option<String>,

    /// App to install into the site.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// Database endpoint, `[scheme://]host:port` (defaults to mysql on the published port).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_endpoint: Option<String>,

    /// Application endpoint to wait on after installation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_endpoint: Option<String>,

    /// Upper bound on any single readiness wait.
    #[serde(with = "serde_format")]
    pub max_wait: Duration,

    /// Delay between readiness checks.
    #[serde(with = "serde_format")]
    pub poll_interval: Duration,

    /// Extra attempts allowed for a failing command step.
    pub retries_per_step: u32,

    /// Kill a command step after this long.
    #[serde(with = "serde_format")]
    pub step_timeout: Duration,

    /// Delay between retries.
    pub backoff: BackoffConfig,

    /// How containers are built, started and reached.
    pub compose: ComposeConfig,

    /// Published ports.
    pub ports: PortsConfig,

    /// Framework CLI inside the container.
    pub bench: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            site_name: None,
            admin_password: None,
            db_root_password: None,
            app_name: None,
            db_endpoint: None,
            app_endpoint: None,
            max_wait: default_max_wait(),
            poll_interval: default_poll_interval(),
            retries_per_step: default_retries(),
            step_timeout: default_step_timeout(),
            backoff: BackoffConfig::default(),
            compose: ComposeConfig::default(),
            ports: PortsConfig::default(),
            bench: default_bench(),
        }
    }
}

fn default_max_wait() -> Duration {
    Duration::from_secs(120)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_retries() -> u32 {
    2
}

fn default_step_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_bench() -> String {
    "bench".to_string()
}

/// Exponential backoff between retries of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffConfig {
    /// Delay before the first retry; doubles for each later retry.
    #[serde(with = "serde_format")]
    pub base: Duration,

    /// Cap on any single delay.
    #[serde(with = "serde_format")]
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

/// Container orchestration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposeConfig {
    /// Orchestrator invocation, e.g. `[docker, compose]` or `[docker-compose]`.
    pub command: Vec<String>,

    /// Compose file passed with `-f`.
    pub file: PathBuf,

    /// Directory commands run in (relative paths resolve against the config file).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,

    /// Service that runs the framework CLI.
    pub service: String,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            command: vec!["docker".to_string(), "compose".to_string()],
            file: PathBuf::from("docker-compose.yml"),
            project_dir: None,
            service: "backend".to_string(),
        }
    }
}

/// Ports published by the containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortsConfig {
    /// Application HTTP port.
    pub http: u16,
    /// Realtime (socketio) port.
    pub socketio: u16,
    /// Cache port.
    pub cache: u16,
    /// Database port.
    pub database: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            http: 8000,
            socketio: 9000,
            cache: 6379,
            database: 3306,
        }
    }
}

impl PortsConfig {
    /// Environment variables the compose file interpolates.
    pub fn as_env(&self) -> Vec<(String, String)> {
        vec![
            ("HTTP_PORT".to_string(), self.http.to_string()),
            ("SOCKETIO_PORT".to_string(), self.socketio.to_string()),
            ("CACHE_PORT".to_string(), self.cache.to_string()),
            ("DB_PORT".to_string(), self.database.to_string()),
        ]
    }
}
