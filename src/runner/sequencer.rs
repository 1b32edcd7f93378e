//! Ordered, fail-fast execution of provisioning steps.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::{ProvisionError, Result};
use crate::readiness::ReadinessWait;
use crate::secrets::OutputMasker;
use crate::shell::{CommandOptions, ProcessRunner};
use crate::steps::{CheckResult, CompletionChecker, ProvisioningStep, StepAction, StepResult};

use super::backoff::RetryPolicy;
use super::report::{FatalError, Outcome, ProvisioningReport};

/// Progress events emitted while the sequencer runs.
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// A step is about to be checked and run.
    StepStarting {
        name: &'a str,
        index: usize,
        total: usize,
        /// Masked description of the action.
        description: &'a str,
    },
    /// An attempt failed and the step will run again after `delay`.
    StepRetrying {
        name: &'a str,
        /// The attempt about to start (1-based).
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
        /// Masked error from the failed attempt.
        error: &'a str,
    },
    /// A step reached a terminal state.
    StepFinished {
        name: &'a str,
        result: &'a StepResult,
    },
}

/// What a successful action produced.
struct ActionOutput {
    exit_code: Option<i32>,
    output: Option<String>,
}

/// Runs steps in order, skipping satisfied ones and retrying transient failures.
///
/// The first fatal failure aborts the run. Every step still appears in the
/// report; those after the failure stay `Pending`.
pub struct Sequencer<'a> {
    runner: &'a dyn ProcessRunner,
    checker: &'a dyn CompletionChecker,
    readiness: &'a dyn ReadinessWait,
    options: CommandOptions,
    retry: RetryPolicy,
    force: bool,
    masker: OutputMasker,
    cancel: CancellationToken,
}

impl<'a> Sequencer<'a> {
    /// Create a sequencer over the given collaborators.
    pub fn new(
        runner: &'a dyn ProcessRunner,
        checker: &'a dyn CompletionChecker,
        readiness: &'a dyn ReadinessWait,
    ) -> Self {
        Self {
            runner,
            checker,
            readiness,
            options: CommandOptions::default(),
            retry: RetryPolicy::default(),
            force: false,
            masker: OutputMasker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Working directory and environment for step commands.
    pub fn with_command_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    /// Delay policy between attempts.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run steps even when their idempotency check passes.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Mask these secrets in results, logs and progress events.
    pub fn with_masker(mut self, masker: OutputMasker) -> Self {
        self.masker = masker;
        self
    }

    /// Abort the run when `token` trips.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run all steps.
    pub fn run(&self, steps: &[ProvisioningStep]) -> ProvisioningReport {
        self.run_with_progress(steps, |_| {})
    }

    /// Run all steps, reporting progress through `on_progress`.
    pub fn run_with_progress(
        &self,
        steps: &[ProvisioningStep],
        mut on_progress: impl FnMut(RunProgress<'_>),
    ) -> ProvisioningReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let total = steps.len();

        let mut results: Vec<StepResult> = Vec::with_capacity(total);
        let mut first_error = None;

        for (index, step) in steps.iter().enumerate() {
            if first_error.is_some() {
                results.push(StepResult::pending(&step.name));
                continue;
            }

            let description = self.masker.mask(&step.action.describe());
            debug!(step = %step.name, action = %description, "Starting step");
            on_progress(RunProgress::StepStarting {
                name: &step.name,
                index,
                total,
                description: &description,
            });

            let (result, error) = self.run_step(step, &mut on_progress);
            on_progress(RunProgress::StepFinished {
                name: &step.name,
                result: &result,
            });

            if let Some(err) = error {
                warn!(step = %step.name, kind = err.kind(), "Step failed, aborting run");
                first_error = Some(FatalError::new(&step.name, &err, &self.masker));
            }
            results.push(result);
        }

        let outcome = if first_error.is_some() {
            Outcome::Aborted
        } else {
            Outcome::Completed
        };
        debug!(%outcome, elapsed = ?start.elapsed(), "Provisioning finished");

        ProvisioningReport {
            outcome,
            steps: results,
            first_error,
            started_at,
            finished_at: Utc::now(),
            duration: start.elapsed(),
        }
    }

    /// Check, then run with retries. Returns the error if the step failed.
    fn run_step(
        &self,
        step: &ProvisioningStep,
        on_progress: &mut impl FnMut(RunProgress<'_>),
    ) -> (StepResult, Option<ProvisionError>) {
        let start = Instant::now();

        if self.cancel.is_cancelled() {
            return self.failure(step, 0, start, ProvisionError::Cancelled, None);
        }

        let check = self.evaluate_check(step);
        if let Some(check) = &check {
            if check.complete {
                debug!(step = %step.name, reason = %check.description, "Already complete, skipping");
                return (StepResult::skipped(&step.name, check.clone()), None);
            }
        }

        let max_attempts = step.max_attempts();
        let mut attempt = 1;
        loop {
            match self.execute_action(step) {
                Ok(done) => {
                    let result = StepResult::succeeded(
                        &step.name,
                        attempt,
                        start.elapsed(),
                        done.exit_code,
                        done.output.map(|o| self.masker.mask(&o)),
                    )
                    .with_check(check);
                    return (result, None);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    let message = self.masker.mask(&err.to_string());
                    warn!(
                        step = %step.name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Attempt failed, retrying"
                    );
                    attempt += 1;
                    on_progress(RunProgress::StepRetrying {
                        name: &step.name,
                        attempt,
                        max_attempts,
                        delay,
                        error: &message,
                    });
                    if !self.cancel.sleep(delay) {
                        return self.failure(step, attempt - 1, start, ProvisionError::Cancelled, check);
                    }
                }
                Err(err) => return self.failure(step, attempt, start, err, check),
            }
        }
    }

    fn evaluate_check(&self, step: &ProvisioningStep) -> Option<CheckResult> {
        let check = step.check.as_ref()?;
        if self.force {
            debug!(step = %step.name, "Forced, not evaluating idempotency check");
            return None;
        }
        let result = self.checker.evaluate(check);
        debug!(step = %step.name, complete = result.complete, "Idempotency check evaluated");
        Some(result)
    }

    fn execute_action(&self, step: &ProvisioningStep) -> Result<ActionOutput> {
        match &step.action {
            StepAction::Command { argv } => {
                let mut options = self.options.with_timeout(Some(step.timeout));
                options.cancel = Some(self.cancel.clone());
                let result = self.runner.run(argv, &options)?;
                Ok(ActionOutput {
                    exit_code: result.exit_code,
                    output: Some(result.output),
                })
            }
            StepAction::WaitReady {
                endpoint,
                poll_interval,
            } => {
                let ready = self.readiness.wait(endpoint, step.timeout, *poll_interval)?;
                Ok(ActionOutput {
                    exit_code: None,
                    output: Some(format!(
                        "{} ready after {} attempt(s) in {:.1}s",
                        endpoint,
                        ready.attempts,
                        ready.elapsed.as_secs_f64()
                    )),
                })
            }
        }
    }

    fn failure(
        &self,
        step: &ProvisioningStep,
        attempts: u32,
        start: Instant,
        err: ProvisionError,
        check: Option<CheckResult>,
    ) -> (StepResult, Option<ProvisionError>) {
        let mut result = StepResult::failed(
            &step.name,
            attempts,
            start.elapsed(),
            self.masker.mask(&err.to_string()),
            err.kind(),
            err.captured_output().map(|o| self.masker.mask(o)),
        )
        .with_check(check);
        if let ProvisionError::ProcessExit { code, .. } = &err {
            result.exit_code = *code;
        }
        (result, Some(err))
    }
}
