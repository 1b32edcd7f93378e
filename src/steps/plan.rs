//! The standard provisioning plan.
//!
//! Turns a [`ProvisionConfig`] into the ordered step list:
//!
//! 1. `build` - build the container images
//! 2. `start` - start the containers detached
//! 3. `wait-for-db` - wait until the database answers
//! 4. `create-site` - create the site (skipped if it exists)
//! 5. `install-app` - install the app (skipped if installed)
//! 6. `wait-for-app` - wait until the app serves requests (only with `app_endpoint`)

use crate::config::{validate, ProvisionConfig};
use crate::error::{ProvisionError, Result};
use crate::readiness::{Protocol, ServiceEndpoint};
use crate::steps::completed_check::IdempotencyCheck;
use crate::steps::step::ProvisioningStep;

/// Build the ordered provisioning steps for `config`.
///
/// # Errors
///
/// Returns `Configuration` if the configuration does not validate.
pub fn build_plan(config: &ProvisionConfig) -> Result<Vec<ProvisioningStep>> {
    validate(config)?;

    let site = required(&config.site_name, "site_name")?;
    let app = required(&config.app_name, "app_name")?;
    let password = required(&config.admin_password, "admin_password")?;

    let retries = config.retries_per_step;
    let timeout = config.step_timeout;

    let mut new_site = vec![
        "new-site".to_string(),
        site.to_string(),
        "--admin-password".to_string(),
        password.to_string(),
    ];
    if let Some(root) = config.db_root_password.as_deref().filter(|p| !p.is_empty()) {
        new_site.push("--db-root-password".to_string());
        new_site.push(root.to_string());
    }

    let mut steps = vec![
        ProvisioningStep::command("build", compose(config, ["build"]))
            .with_retries(retries)
            .with_timeout(timeout),
        ProvisioningStep::command("start", compose(config, ["up", "-d"]))
            .with_retries(retries)
            .with_timeout(timeout),
        ProvisioningStep::wait_ready(
            "wait-for-db",
            db_endpoint(config)?,
            config.max_wait,
            config.poll_interval,
        ),
        ProvisioningStep::command("create-site", bench(config, new_site))
            .with_check(IdempotencyCheck::command_succeeds(exec(
                config,
                [
                    "test".to_string(),
                    "-f".to_string(),
                    format!("sites/{}/site_config.json", site),
                ],
            )))
            .with_retries(retries)
            .with_timeout(timeout),
        ProvisioningStep::command(
            "install-app",
            bench(config, ["--site", site, "install-app", app]),
        )
        .with_check(IdempotencyCheck::output_matches(
            bench(config, ["--site", site, "list-apps"]),
            installed_app_pattern(app),
        ))
        .with_retries(retries)
        .with_timeout(timeout),
    ];

    if let Some(raw) = &config.app_endpoint {
        let endpoint = ServiceEndpoint::parse_with_default(raw, Protocol::Http)?;
        steps.push(ProvisioningStep::wait_ready(
            "wait-for-app",
            endpoint,
            config.max_wait,
            config.poll_interval,
        ));
    }

    Ok(steps)
}

/// The database endpoint, defaulting to mysql on the published port.
pub fn db_endpoint(config: &ProvisionConfig) -> Result<ServiceEndpoint> {
    match &config.db_endpoint {
        Some(raw) => ServiceEndpoint::parse_with_default(raw, Protocol::Mysql),
        None => Ok(ServiceEndpoint::new(
            "127.0.0.1",
            config.ports.database,
            Protocol::Mysql,
        )),
    }
}

/// Matches the app on its own line of `bench list-apps` output.
///
/// Newer framework versions print `app_name  version  branch`, older ones
/// print just the name.
fn installed_app_pattern(app: &str) -> String {
    format!(r"(?m)^\s*{}(\s|$)", regex::escape(app))
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| ProvisionError::Configuration {
            message: format!("'{}' is required", field),
        })
}

/// `<compose> -f <file> <args...>`
fn compose<I, S>(config: &ProvisionConfig, args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut argv = config.compose.command.clone();
    argv.push("-f".to_string());
    argv.push(config.compose.file.to_string_lossy().into_owned());
    argv.extend(args.into_iter().map(Into::into));
    argv
}

/// `<compose> -f <file> exec -T <service> <args...>`
fn exec<I, S>(config: &ProvisionConfig, args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut argv = compose(config, ["exec", "-T"]);
    argv.push(config.compose.service.clone());
    argv.extend(args.into_iter().map(Into::into));
    argv
}

/// `<compose> -f <file> exec -T <service> bench <args...>`
fn bench<I, S>(config: &ProvisionConfig, args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut argv = exec(config, [config.bench.clone()]);
    argv.extend(args.into_iter().map(Into::into));
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::step::StepAction;
    use regex::Regex;
    use std::time::Duration;

    fn config() -> ProvisionConfig {
        ProvisionConfig {
            site_name: Some("erp.localhost".to_string()),
            admin_password: Some("s3cret".to_string()),
            app_name: Some("inventory_tools".to_string()),
            ..Default::default()
        }
    }

    fn argv(step: &ProvisioningStep) -> &[String] {
        match &step.action {
            StepAction::Command { argv } => argv,
            other => panic!("expected command, got {other:?}"),
        }
    }

    fn names(steps: &[ProvisioningStep]) -> Vec<&str> {
        steps.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn standard_plan_order() {
        let steps = build_plan(&config()).unwrap();
        assert_eq!(
            names(&steps),
            ["build", "start", "wait-for-db", "create-site", "install-app"]
        );
    }

    #[test]
    fn app_endpoint_adds_final_wait() {
        let config = ProvisionConfig {
            app_endpoint: Some("localhost:8000".to_string()),
            ..config()
        };
        let steps = build_plan(&config).unwrap();

        let last = steps.last().unwrap();
        assert_eq!(last.name, "wait-for-app");
        match &last.action {
            StepAction::WaitReady { endpoint, .. } => assert_eq!(endpoint.protocol, Protocol::Http),
            other => panic!("expected wait, got {other:?}"),
        }
    }

    #[test]
    fn compose_commands_use_configured_file() {
        let steps = build_plan(&config()).unwrap();
        assert_eq!(
            argv(&steps[0]),
            ["docker", "compose", "-f", "docker-compose.yml", "build"]
        );
        assert_eq!(
            argv(&steps[1]),
            ["docker", "compose", "-f", "docker-compose.yml", "up", "-d"]
        );
    }

    #[test]
    fn create_site_runs_bench_in_service() {
        let steps = build_plan(&config()).unwrap();
        assert_eq!(
            argv(&steps[3]),
            [
                "docker",
                "compose",
                "-f",
                "docker-compose.yml",
                "exec",
                "-T",
                "backend",
                "bench",
                "new-site",
                "erp.localhost",
                "--admin-password",
                "s3cret"
            ]
        );
        assert!(steps[3].check.is_some());
    }

    #[test]
    fn db_root_password_is_forwarded() {
        let config = ProvisionConfig {
            db_root_password: Some("root".to_string()),
            ..config()
        };
        let steps = build_plan(&config).unwrap();
        let args = argv(&steps[3]);
        assert_eq!(&args[args.len() - 2..], ["--db-root-password", "root"]);
    }

    #[test]
    fn install_app_targets_site() {
        let steps = build_plan(&config()).unwrap();
        let args = argv(&steps[4]);
        assert_eq!(
            &args[args.len() - 4..],
            ["--site", "erp.localhost", "install-app", "inventory_tools"]
        );
    }

    #[test]
    fn retries_and_timeouts_come_from_config() {
        let config = ProvisionConfig {
            retries_per_step: 5,
            step_timeout: Duration::from_secs(600),
            max_wait: Duration::from_secs(45),
            ..config()
        };
        let steps = build_plan(&config).unwrap();

        assert_eq!(steps[0].max_retries, 5);
        assert_eq!(steps[0].timeout, Duration::from_secs(600));
        assert_eq!(steps[2].max_retries, 0);
        assert_eq!(steps[2].timeout, Duration::from_secs(45));
    }

    #[test]
    fn db_endpoint_defaults_to_published_port() {
        let mut config = config();
        config.ports.database = 3307;

        let endpoint = db_endpoint(&config).unwrap();
        assert_eq!(endpoint, ServiceEndpoint::new("127.0.0.1", 3307, Protocol::Mysql));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = build_plan(&ProvisionConfig::default()).unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration { .. }));
    }

    #[test]
    fn installed_app_pattern_matches_list_apps_output() {
        let re = Regex::new(&installed_app_pattern("inventory_tools")).unwrap();

        assert!(re.is_match("frappe\ninventory_tools\n"));
        assert!(re.is_match("frappe 15.0.0 version-15\ninventory_tools 0.0.1 main\n"));
        assert!(!re.is_match("frappe\ninventory_tools_v2\n"));
        assert!(!re.is_match("frappe\n"));
    }
}
