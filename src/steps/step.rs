//! The provisioning step definition.

use crate::readiness::ServiceEndpoint;
use crate::shell::display_command;
use crate::steps::completed_check::IdempotencyCheck;
use std::time::Duration;

/// Default per-attempt limit for command steps.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// What a step does when it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Run an external command given as argv.
    Command { argv: Vec<String> },

    /// Poll an endpoint until it is ready. The step timeout is the maximum wait.
    WaitReady {
        endpoint: ServiceEndpoint,
        poll_interval: Duration,
    },
}

impl StepAction {
    /// One-line description for plans and logs.
    pub fn describe(&self) -> String {
        match self {
            StepAction::Command { argv } => display_command(argv),
            StepAction::WaitReady { endpoint, .. } => format!("wait for {}", endpoint),
        }
    }
}

/// One ordered action in the provisioning workflow.
///
/// Built once from configuration and never modified during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningStep {
    /// Step name (e.g., "create-site").
    pub name: String,

    /// What to run.
    pub action: StepAction,

    /// Skip the step when this reports the target state already holds.
    pub check: Option<IdempotencyCheck>,

    /// Extra attempts after a transient failure.
    pub max_retries: u32,

    /// Limit on a single attempt.
    pub timeout: Duration,
}

impl ProvisioningStep {
    /// A command step with no check, no retries and the default timeout.
    pub fn command<I, S>(name: &str, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            action: StepAction::Command {
                argv: argv.into_iter().map(Into::into).collect(),
            },
            check: None,
            max_retries: 0,
            timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    /// A readiness step waiting up to `max_wait`.
    pub fn wait_ready(
        name: &str,
        endpoint: ServiceEndpoint,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            action: StepAction::WaitReady {
                endpoint,
                poll_interval,
            },
            check: None,
            max_retries: 0,
            timeout: max_wait,
        }
    }

    /// Attach an idempotency check.
    pub fn with_check(mut self, check: IdempotencyCheck) -> Self {
        self.check = Some(check);
        self
    }

    /// Set the retry budget.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Maximum number of times the action may be invoked.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
