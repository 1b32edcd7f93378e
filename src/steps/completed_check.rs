//! Idempotency check implementations.
//!
//! An idempotency check determines whether a step's desired end state
//! already holds (the site exists, the app is installed) so the step can
//! be skipped instead of failing on a repeated invocation.

use crate::readiness::{NetworkProbe, Probe, ServiceEndpoint};
use crate::shell::{display_command, execute, CommandOptions};
use regex::Regex;
use serde::Serialize;
use std::time::Duration;

/// Limit applied to check commands when the caller sets none.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(120);

/// Connect/read limit for endpoint checks.
const ENDPOINT_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// A predicate over the current state of the deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdempotencyCheck {
    /// Satisfied when the command exits 0.
    CommandSucceeds { command: Vec<String> },

    /// Satisfied when the command exits 0 and its stdout matches `pattern`.
    OutputMatches {
        command: Vec<String>,
        pattern: String,
    },

    /// Satisfied when the endpoint passes a single readiness check.
    EndpointReady { endpoint: ServiceEndpoint },

    /// Satisfied when every nested check is.
    All { checks: Vec<IdempotencyCheck> },

    /// Satisfied when any nested check is.
    Any { checks: Vec<IdempotencyCheck> },
}

impl IdempotencyCheck {
    /// Shorthand for [`IdempotencyCheck::CommandSucceeds`].
    pub fn command_succeeds<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::CommandSucceeds {
            command: command.into_iter().map(Into::into).collect(),
        }
    }

    /// Shorthand for [`IdempotencyCheck::OutputMatches`].
    pub fn output_matches<I, S>(command: I, pattern: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OutputMatches {
            command: command.into_iter().map(Into::into).collect(),
            pattern: pattern.into(),
        }
    }

    /// One-line description for plans.
    pub fn describe(&self) -> String {
        match self {
            Self::CommandSucceeds { command } => format!("`{}` succeeds", display_command(command)),
            Self::OutputMatches { command, pattern } => {
                format!("`{}` matches /{}/", display_command(command), pattern)
            }
            Self::EndpointReady { endpoint } => format!("{} is ready", endpoint),
            Self::All { checks } => join_descriptions(checks, " and "),
            Self::Any { checks } => join_descriptions(checks, " or "),
        }
    }
}

fn join_descriptions(checks: &[IdempotencyCheck], separator: &str) -> String {
    let parts: Vec<_> = checks.iter().map(IdempotencyCheck::describe).collect();
    format!("({})", parts.join(separator))
}

/// Result of running an idempotency check.
///
/// The `description` field is user-visible: it appears in skip messages
/// and in the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    /// Whether the check passed (target state already holds).
    pub complete: bool,

    /// Description of what was checked.
    pub description: String,

    /// Details about the check result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    /// Create a complete result.
    pub fn complete(description: impl Into<String>) -> Self {
        Self {
            complete: true,
            description: description.into(),
            details: None,
        }
    }

    /// Create an incomplete result.
    pub fn incomplete(description: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            complete: false,
            description: description.into(),
            details: Some(details.into()),
        }
    }
}

/// Evaluates idempotency checks for the sequencer.
pub trait CompletionChecker {
    /// Evaluate `check` against the live deployment.
    fn evaluate(&self, check: &IdempotencyCheck) -> CheckResult;
}

/// Evaluates checks by running real commands and probes.
#[derive(Debug, Clone)]
pub struct SystemChecker {
    options: CommandOptions,
}

impl SystemChecker {
    /// Create a checker running commands with `options`.
    ///
    /// [`DEFAULT_CHECK_TIMEOUT`] applies if `options` carries no timeout.
    pub fn new(options: CommandOptions) -> Self {
        let timeout = options.timeout.or(Some(DEFAULT_CHECK_TIMEOUT));
        Self {
            options: options.with_timeout(timeout),
        }
    }
}

impl CompletionChecker for SystemChecker {
    fn evaluate(&self, check: &IdempotencyCheck) -> CheckResult {
        run_check(check, &self.options)
    }
}

/// Run an idempotency check.
pub fn run_check(check: &IdempotencyCheck, options: &CommandOptions) -> CheckResult {
    match check {
        IdempotencyCheck::CommandSucceeds { command } => check_command_succeeds(command, options),
        IdempotencyCheck::OutputMatches { command, pattern } => {
            check_output_matches(command, pattern, options)
        }
        IdempotencyCheck::EndpointReady { endpoint } => check_endpoint_ready(endpoint),
        IdempotencyCheck::All { checks } => check_all(checks, options),
        IdempotencyCheck::Any { checks } => check_any(checks, options),
    }
}

/// Check if a command succeeds (exit code 0).
fn check_command_succeeds(command: &[String], options: &CommandOptions) -> CheckResult {
    let shown = truncate(&display_command(command), 60);
    match execute(command, options) {
        Ok(result) if result.success => CheckResult::complete(format!("Command succeeded: {}", shown)),
        Ok(result) => CheckResult::incomplete(
            format!("Command failed: {}", shown),
            format!("Exit code was {:?}", result.exit_code),
        ),
        Err(e) => CheckResult::incomplete(format!("Command failed: {}", shown), e.to_string()),
    }
}

/// Check that a command's stdout matches a pattern.
fn check_output_matches(command: &[String], pattern: &str, options: &CommandOptions) -> CheckResult {
    let shown = truncate(&display_command(command), 60);
    let regex = match Regex::new(pattern) {
        Ok(r) => r,
        Err(e) => {
            return CheckResult::incomplete(
                format!("Invalid pattern: {}", pattern),
                e.to_string(),
            )
        }
    };

    match execute(command, options) {
        Ok(result) if result.success && regex.is_match(&result.stdout) => {
            CheckResult::complete(format!("Output matched: {}", shown))
        }
        Ok(result) if result.success => CheckResult::incomplete(
            format!("Output did not match: {}", shown),
            format!("Pattern {} not found", pattern),
        ),
        Ok(result) => CheckResult::incomplete(
            format!("Command failed: {}", shown),
            format!("Exit code was {:?}", result.exit_code),
        ),
        Err(e) => CheckResult::incomplete(format!("Command failed: {}", shown), e.to_string()),
    }
}

fn check_endpoint_ready(endpoint: &ServiceEndpoint) -> CheckResult {
    match NetworkProbe.check(endpoint, ENDPOINT_CHECK_TIMEOUT) {
        Ok(()) => CheckResult::complete(format!("Endpoint ready: {}", endpoint)),
        Err(reason) => CheckResult::incomplete(format!("Endpoint not ready: {}", endpoint), reason),
    }
}

/// All checks must pass.
fn check_all(checks: &[IdempotencyCheck], options: &CommandOptions) -> CheckResult {
    let results: Vec<_> = checks.iter().map(|c| run_check(c, options)).collect();

    if results.iter().all(|r| r.complete) {
        CheckResult::complete(format!("All {} checks passed", checks.len()))
    } else {
        let failed: Vec<_> = results
            .iter()
            .filter(|r| !r.complete)
            .map(|r| r.description.clone())
            .collect();

        CheckResult::incomplete(
            format!("{}/{} checks failed", failed.len(), checks.len()),
            failed.join("; "),
        )
    }
}

/// Any check passing is sufficient. Stops at the first passing check.
fn check_any(checks: &[IdempotencyCheck], options: &CommandOptions) -> CheckResult {
    let mut descriptions = Vec::new();
    for check in checks {
        let result = run_check(check, options);
        if result.complete {
            return CheckResult::complete(format!("Check passed: {}", result.description));
        }
        descriptions.push(result.description);
    }

    CheckResult::incomplete(
        format!("None of {} checks passed", checks.len()),
        descriptions.join("; "),
    )
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
