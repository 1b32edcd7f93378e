//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::duration::parse_duration_arg;
use crate::config::ConfigOverrides;

/// Provision a containerized site: build, start, wait for the database,
/// create the site and install the app.
#[derive(Debug, Parser)]
#[command(name = "provision")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (default: provision.yml in the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum time to wait for a service to become ready (e.g. 90s, 2m)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub max_wait: Option<Duration>,

    /// Time between readiness checks
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub poll_interval: Option<Duration>,

    /// Retries for a failing step before giving up
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Administrator password for the new site
    #[arg(long, env = "PROVISION_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// Run every step even if it is already complete
    #[arg(short, long)]
    pub force: bool,

    /// Show the plan without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Show verbose output, including command output
    #[arg(short, long)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Configuration values given on the command line.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            max_wait: self.max_wait,
            poll_interval: self.poll_interval,
            retries_per_step: self.retries,
            admin_password: self.admin_password.clone(),
        }
    }
}
