//! The final provisioning report.

use crate::error::ProvisionError;
use crate::secrets::OutputMasker;
use crate::steps::{format_duration, StepResult, StepStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Terminal state of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every step succeeded or was skipped.
    Completed,
    /// A step failed or the run was cancelled.
    Aborted,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Completed => write!(f, "completed"),
            Outcome::Aborted => write!(f, "aborted"),
        }
    }
}

/// The error that aborted a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FatalError {
    /// Step that failed.
    pub step: String,
    /// Machine-readable error kind.
    pub kind: &'static str,
    /// Masked error message.
    pub message: String,
    /// Process exit code for this kind.
    pub exit_code: i32,
}

impl FatalError {
    pub(crate) fn new(step: &str, error: &ProvisionError, masker: &OutputMasker) -> Self {
        Self {
            step: step.to_string(),
            kind: error.kind(),
            message: masker.mask(&error.to_string()),
            exit_code: error.exit_code(),
        }
    }
}

/// Every step's terminal state plus the first fatal error.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningReport {
    /// Run outcome.
    pub outcome: Outcome,

    /// One entry per planned step, in plan order. Steps after a failure
    /// are `Pending`.
    pub steps: Vec<StepResult>,

    /// What aborted the run, if anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<FatalError>,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run finished.
    pub finished_at: DateTime<Utc>,

    /// Wall-clock duration of the run.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl ProvisioningReport {
    /// Whether the run completed.
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Completed
    }

    /// Process exit code for this report.
    pub fn exit_code(&self) -> i32 {
        match (&self.outcome, &self.first_error) {
            (Outcome::Completed, _) => 0,
            (Outcome::Aborted, Some(error)) => error.exit_code,
            (Outcome::Aborted, None) => 1,
        }
    }

    /// Result for the named step.
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Number of steps with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    /// Human-readable summary, one line per step then a totals line.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.steps.iter().map(StepResult::summary_line).collect();

        let mut totals = vec![
            format!("{} succeeded", self.count(StepStatus::Succeeded)),
            format!("{} skipped", self.count(StepStatus::Skipped)),
        ];
        let failed = self.count(StepStatus::Failed);
        if failed > 0 {
            totals.push(format!("{} failed", failed));
        }
        let pending = self.count(StepStatus::Pending);
        if pending > 0 {
            totals.push(format!("{} not run", pending));
        }

        lines.push(format!(
            "Provisioning {} in {}: {}",
            self.outcome,
            format_duration(self.duration),
            totals.join(", ")
        ));
        lines
    }
}

fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
