//! Step states and results.

use crate::steps::completed_check::CheckResult;
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Status of a step in the workflow.
///
/// `Pending -> (Skipped | Running -> (Succeeded | Failed))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step has not been attempted.
    Pending,

    /// Step is currently executing.
    Running,

    /// Target state already held; the step was not run.
    Skipped,

    /// Step ran and succeeded.
    Succeeded,

    /// Step ran and failed.
    Failed,
}

impl StepStatus {
    /// Check if this is a terminal state (no more changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Skipped | StepStatus::Succeeded | StepStatus::Failed
        )
    }

    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            StepStatus::Pending => '○',
            StepStatus::Running => '◉',
            StepStatus::Skipped => '⊘',
            StepStatus::Succeeded => '✓',
            StepStatus::Failed => '✗',
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Skipped => "skipped",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Record of one step in a run.
///
/// Produced once per step and never modified afterwards. Output and error
/// text are already masked when the result is created.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Step name.
    pub name: String,

    /// Terminal status (or `Pending` if never attempted).
    pub status: StepStatus,

    /// Number of times the action was invoked.
    pub attempts: u32,

    /// Total time including retries and backoff.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,

    /// Exit code of the last invocation, if a command ran to completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Captured output of the last invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Idempotency check result (if run).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckResult>,

    /// Error message (if failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Machine-readable error kind (if failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl StepResult {
    fn empty(name: &str, status: StepStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            attempts: 0,
            duration: Duration::ZERO,
            exit_code: None,
            output: None,
            check: None,
            error: None,
            error_kind: None,
        }
    }

    /// A step that was never attempted.
    pub fn pending(name: &str) -> Self {
        Self::empty(name, StepStatus::Pending)
    }

    /// Create a skipped result.
    pub fn skipped(name: &str, check: CheckResult) -> Self {
        Self {
            check: Some(check),
            ..Self::empty(name, StepStatus::Skipped)
        }
    }

    /// Create a success result.
    pub fn succeeded(
        name: &str,
        attempts: u32,
        duration: Duration,
        exit_code: Option<i32>,
        output: Option<String>,
    ) -> Self {
        Self {
            attempts,
            duration,
            exit_code,
            output,
            ..Self::empty(name, StepStatus::Succeeded)
        }
    }

    /// Create a failure result.
    pub fn failed(
        name: &str,
        attempts: u32,
        duration: Duration,
        error: String,
        error_kind: &'static str,
        output: Option<String>,
    ) -> Self {
        Self {
            attempts,
            duration,
            output,
            error: Some(error),
            error_kind: Some(error_kind),
            ..Self::empty(name, StepStatus::Failed)
        }
    }

    /// Attach the check that was evaluated before running.
    pub fn with_check(mut self, check: Option<CheckResult>) -> Self {
        self.check = check;
        self
    }

    /// Generate a summary line for display.
    pub fn summary_line(&self) -> String {
        let c = self.status.display_char();
        match self.status {
            StepStatus::Succeeded if self.attempts > 1 => format!(
                "{} {} ({}, attempt {})",
                c,
                self.name,
                format_duration(self.duration),
                self.attempts
            ),
            StepStatus::Succeeded => {
                format!("{} {} ({})", c, self.name, format_duration(self.duration))
            }
            StepStatus::Skipped => {
                let reason = self
                    .check
                    .as_ref()
                    .map(|r| r.description.as_str())
                    .unwrap_or("already complete");
                format!("{} {} (skipped: {})", c, self.name, reason)
            }
            StepStatus::Failed => {
                let error = self.error.as_deref().unwrap_or("unknown error");
                format!("{} {} - {}", c, self.name, error)
            }
            StepStatus::Pending => format!("{} {} (not run)", c, self.name),
            StepStatus::Running => format!("{} {}", c, self.name),
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Format a duration for display.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{}s", secs, millis / 100)
    } else {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    }
}
