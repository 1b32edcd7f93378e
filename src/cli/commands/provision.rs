//! The `provision` command.
//!
//! Loads the configuration, builds the standard plan and runs it through
//! the sequencer, rendering progress and the final report.

use std::path::{Path, PathBuf};

use crate::cancel::CancellationToken;
use crate::cli::args::Cli;
use crate::config::{load_config, ConfigOverrides};
use crate::error::Result;
use crate::readiness::ReadinessProber;
use crate::runner::{ProvisioningReport, RetryPolicy, RunProgress, Sequencer};
use crate::secrets::OutputMasker;
use crate::shell::{CommandOptions, OutputLine, SystemRunner};
use crate::steps::{
    build_plan, format_duration, ProvisioningStep, StepResult, StepStatus, SystemChecker,
};
use crate::ui::{SpinnerHandle, UserInterface};

use super::{Command, CommandResult};

/// Options for a provisioning run.
#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    /// Explicit config file.
    pub config: Option<PathBuf>,
    /// Command-line overrides.
    pub overrides: ConfigOverrides,
    /// Ignore idempotency checks.
    pub force: bool,
    /// Show the plan only.
    pub dry_run: bool,
    /// Print the report as JSON.
    pub json: bool,
}

impl From<&Cli> for ProvisionOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            overrides: cli.overrides(),
            force: cli.force,
            dry_run: cli.dry_run,
            json: cli.json,
        }
    }
}

/// The provision command implementation.
pub struct ProvisionCommand {
    cwd: PathBuf,
    options: ProvisionOptions,
    cancel: CancellationToken,
}

impl ProvisionCommand {
    /// Create a command resolving relative paths against `cwd`.
    pub fn new(cwd: &Path, options: ProvisionOptions) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the run when `token` trips.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Get the run options.
    pub fn options(&self) -> &ProvisionOptions {
        &self.options
    }

    fn show_plan(&self, ui: &mut dyn UserInterface, steps: &[ProvisioningStep], masker: &OutputMasker) {
        ui.message("Dry run: no commands will be executed");
        ui.message("");
        for (index, step) in steps.iter().enumerate() {
            ui.message(&format!(
                "  {}. {:<12} {}",
                index + 1,
                step.name,
                masker.mask(&step.action.describe())
            ));
            if let Some(check) = &step.check {
                let note = if self.options.force {
                    "forced"
                } else {
                    "skip if"
                };
                ui.message(&format!("     {}: {}", note, masker.mask(&check.describe())));
            }
            if step.max_retries > 0 {
                ui.message(&format!(
                    "     retries: {}, timeout: {}",
                    step.max_retries,
                    format_duration(step.timeout)
                ));
            }
        }
    }

    fn run_plan(
        &self,
        ui: &mut dyn UserInterface,
        sequencer: &Sequencer<'_>,
        steps: &[ProvisioningStep],
    ) -> ProvisioningReport {
        let mut spinner: Option<Box<dyn SpinnerHandle>> = None;

        sequencer.run_with_progress(steps, |event| match event {
            RunProgress::StepStarting {
                name,
                index,
                total,
                description,
            } => {
                spinner = Some(ui.start_spinner(&format!(
                    "[{}/{}] {} ({})",
                    index + 1,
                    total,
                    name,
                    description
                )));
            }
            RunProgress::StepRetrying {
                name,
                attempt,
                max_attempts,
                delay,
                error,
            } => {
                if let Some(s) = spinner.as_mut() {
                    s.set_message(&format!("{} (attempt {}/{})", name, attempt, max_attempts));
                }
                ui.warning(&format!(
                    "{}: {}; retrying in {} (attempt {}/{})",
                    name,
                    error,
                    format_duration(delay),
                    attempt,
                    max_attempts
                ));
            }
            RunProgress::StepFinished { name, result } => {
                let mut handle = spinner.take().unwrap_or_else(|| ui.start_spinner(name));
                finish_spinner(handle.as_mut(), result);
            }
        })
    }

    fn show_failure(
        &self,
        ui: &mut dyn UserInterface,
        report: &ProvisioningReport,
        steps: &[ProvisioningStep],
        masker: &OutputMasker,
    ) {
        let Some(fatal) = &report.first_error else {
            return;
        };

        let streamed = ui.output_mode().shows_command_output();
        let output = report.step(&fatal.step).and_then(|r| r.output.as_deref());
        let step = steps.iter().find(|s| s.name == fatal.step);
        if let (false, Some(output), Some(step)) = (streamed, output, step) {
            ui.show_error_block(&masker.mask(&step.action.describe()), output);
        }
        ui.error(&format!("{}: {}", fatal.step, fatal.message));
    }
}

fn finish_spinner(spinner: &mut dyn SpinnerHandle, result: &StepResult) {
    let duration = format_duration(result.duration);
    match result.status {
        StepStatus::Succeeded if result.attempts > 1 => spinner.finish_success(&format!(
            "{} ({}, attempt {})",
            result.name, duration, result.attempts
        )),
        StepStatus::Succeeded => spinner.finish_success(&format!("{} ({})", result.name, duration)),
        StepStatus::Skipped => {
            let reason = result
                .check
                .as_ref()
                .map(|c| c.description.as_str())
                .unwrap_or("already complete");
            spinner.finish_skipped(&format!("{} skipped: {}", result.name, reason));
        }
        StepStatus::Failed => spinner.finish_error(&format!(
            "{} failed after {} attempt(s) ({})",
            result.name, result.attempts, duration
        )),
        StepStatus::Pending | StepStatus::Running => {}
    }
}

impl Command for ProvisionCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let loaded = load_config(
            self.options.config.as_deref(),
            &self.cwd,
            &self.options.overrides,
        )?;
        let config = &loaded.config;
        let steps = build_plan(config)?;
        let masker = OutputMasker::from_config(config);

        ui.show_header(&format!(
            "Provisioning {}",
            config.site_name.as_deref().unwrap_or_default()
        ));
        if self.options.dry_run || ui.output_mode().shows_command_output() {
            ui.message(&format!("Config: {}", loaded.path.display()));
        }

        if self.options.dry_run {
            self.show_plan(ui, &steps, &masker);
            return Ok(CommandResult::success());
        }

        let options = CommandOptions {
            cwd: Some(loaded.project_dir()),
            env: config.ports.as_env().into_iter().collect(),
            timeout: None,
            cancel: Some(self.cancel.clone()),
        };

        let runner = if ui.output_mode().shows_command_output() {
            let masker = masker.clone();
            SystemRunner::streaming(move |line| {
                let (OutputLine::Stdout(text) | OutputLine::Stderr(text)) = line;
                let text = text.trim_end();
                if !text.is_empty() {
                    println!("      {}", masker.mask(text));
                }
            })
        } else {
            SystemRunner::new()
        };
        let checker = SystemChecker::new(options.clone());
        let prober = ReadinessProber::new().with_cancellation(self.cancel.clone());

        let sequencer = Sequencer::new(&runner, &checker, &prober)
            .with_command_options(options)
            .with_retry_policy(RetryPolicy::from(&config.backoff))
            .with_force(self.options.force)
            .with_masker(masker.clone())
            .with_cancellation(self.cancel.clone());

        let report = self.run_plan(ui, &sequencer, &steps);
        self.show_failure(ui, &report, &steps, &masker);

        if self.options.json {
            let json = serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)?;
            println!("{}", json);
        } else {
            ui.show_report(&report);
        }

        if report.is_success() {
            ui.success("Provisioning complete");
            Ok(CommandResult::success())
        } else {
            Ok(CommandResult::failure(report.exit_code()))
        }
    }
}
