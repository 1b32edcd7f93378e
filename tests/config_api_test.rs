//! Integration tests for config module public API.

use provision::config::{
    load_config, validate, validate_config, ConfigOverrides, ProvisionConfig,
};
use provision::ProvisionError;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn full_config_round_trip_through_loader() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("provision.yml"),
        r#"
site_name: erp.localhost
admin_password: admin
db_root_password: root
app_name: inventory_tools
db_endpoint: mariadb://db:3306
app_endpoint: http://localhost:8000
max_wait: 3m
poll_interval: 1s
retries_per_step: 4
step_timeout: 45m
backoff:
  base: 2s
  max: 1m
compose:
  command: [docker-compose]
  file: deploy/compose.yml
  project_dir: deploy
  service: backend
ports:
  http: 8080
  database: 3307
bench: /home/frappe/.local/bin/bench
"#,
    )
    .unwrap();

    let loaded = load_config(None, temp.path(), &ConfigOverrides::default()).unwrap();
    validate(&loaded.config).unwrap();

    let config = &loaded.config;
    assert_eq!(config.max_wait, Duration::from_secs(180));
    assert_eq!(config.retries_per_step, 4);
    assert_eq!(config.backoff.max, Duration::from_secs(60));
    assert_eq!(config.compose.command, ["docker-compose"]);
    assert_eq!(config.ports.http, 8080);
    assert_eq!(config.ports.socketio, 9000);
    assert_eq!(loaded.project_dir(), temp.path().join("deploy"));
}

#[test]
fn cli_overrides_win_over_file() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("provision.yml"),
        "site_name: a.localhost\napp_name: x\nmax_wait: 10s\n",
    )
    .unwrap();
    let overrides = ConfigOverrides {
        max_wait: Some(Duration::from_secs(300)),
        admin_password: Some("env-password".to_string()),
        ..Default::default()
    };

    let loaded = load_config(None, temp.path(), &overrides).unwrap();

    assert_eq!(loaded.config.max_wait, Duration::from_secs(300));
    assert_eq!(loaded.config.admin_password.as_deref(), Some("env-password"));
}

#[test]
fn validation_reports_every_problem() {
    let config = ProvisionConfig {
        db_endpoint: Some("no-port".to_string()),
        ..Default::default()
    };

    let errors = validate_config(&config);
    let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();

    assert!(fields.contains(&"site_name"));
    assert!(fields.contains(&"admin_password"));
    assert!(fields.contains(&"app_name"));
    assert!(fields.contains(&"db_endpoint"));
}

#[test]
fn validate_returns_configuration_error() {
    let err = validate(&ProvisionConfig::default()).unwrap_err();
    assert!(matches!(err, ProvisionError::Configuration { .. }));
    assert_eq!(err.exit_code(), 2);
}
