//! Provisioning steps.
//!
//! - [`ProvisioningStep`] - one ordered action (a command or a readiness wait)
//! - [`IdempotencyCheck`] - decides whether a step's target state already holds
//! - [`build_plan`] - the standard build, start, wait, create-site, install-app plan
//! - [`StepStatus`] / [`StepResult`] - per-step outcome recorded by the sequencer

pub mod completed_check;
pub mod plan;
pub mod result;
pub mod step;

pub use completed_check::{
    run_check, CheckResult, CompletionChecker, IdempotencyCheck, SystemChecker,
    DEFAULT_CHECK_TIMEOUT,
};
pub use plan::{build_plan, db_endpoint};
pub use result::{format_duration, StepResult, StepStatus};
pub use step::{ProvisioningStep, StepAction, DEFAULT_STEP_TIMEOUT};
