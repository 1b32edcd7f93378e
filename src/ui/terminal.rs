//! Terminal UI.

use console::Term;
use std::io::Write;

use crate::runner::ProvisioningReport;
use crate::steps::{format_duration, StepStatus};

use super::spinner::{LineSpinner, ProgressSpinner};
use super::{OutputMode, ProvisionTheme, SpinnerHandle, UserInterface};

/// UI writing status to stdout and errors to stderr.
pub struct TerminalUI {
    out: Term,
    err: Term,
    theme: ProvisionTheme,
    mode: OutputMode,
}

impl TerminalUI {
    /// Create a terminal UI.
    pub fn new(mode: OutputMode, colors: bool) -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            theme: ProvisionTheme::for_colors(colors),
            mode,
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.err, "{}", self.theme.format_error(msg)).ok();
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() && self.out.is_term() {
            Box::new(ProgressSpinner::new(message, self.theme.clone()))
        } else if self.mode.shows_status() {
            if self.mode.shows_command_output() {
                writeln!(self.out, "  {}", self.theme.info.apply_to(message)).ok();
            }
            Box::new(LineSpinner::new(self.theme.clone()))
        } else {
            Box::new(ProgressSpinner::hidden())
        }
    }

    fn show_error_block(&mut self, command: &str, output: &str) {
        let b = &self.theme.border;
        writeln!(
            self.err,
            "    {} {}",
            b.apply_to("┌─"),
            b.apply_to("Command ──────────────────────────")
        )
        .ok();
        writeln!(
            self.err,
            "    {} {}",
            b.apply_to("│"),
            self.theme.command.apply_to(command)
        )
        .ok();

        if !output.trim().is_empty() {
            writeln!(
                self.err,
                "    {} {}",
                b.apply_to("├─"),
                b.apply_to("Output ───────────────────────────")
            )
            .ok();
            for line in output.trim_end().lines() {
                writeln!(self.err, "    {} {}", b.apply_to("│"), line).ok();
            }
        }

        writeln!(
            self.err,
            "    {}",
            b.apply_to("└────────────────────────────────────")
        )
        .ok();
    }

    fn show_report(&mut self, report: &ProvisioningReport) {
        if !self.mode.shows_status() {
            return;
        }

        let b = &self.theme.border;
        writeln!(self.out).ok();
        writeln!(
            self.out,
            "  {} {}",
            b.apply_to("┌─"),
            b.apply_to("Summary ──────────────────────────")
        )
        .ok();

        for step in &report.steps {
            let icon = step.status.display_char();
            let icon = match step.status {
                StepStatus::Succeeded => self.theme.success.apply_to(icon),
                StepStatus::Failed => self.theme.error.apply_to(icon),
                _ => self.theme.dim.apply_to(icon),
            };
            let detail = match step.status {
                StepStatus::Succeeded | StepStatus::Failed => format_duration(step.duration),
                other => other.to_string(),
            };
            writeln!(
                self.out,
                "  {} {} {:<20} {}",
                b.apply_to("│"),
                icon,
                step.name,
                self.theme.duration.apply_to(detail),
            )
            .ok();
        }

        writeln!(
            self.out,
            "  {}",
            b.apply_to("├────────────────────────────────────")
        )
        .ok();
        writeln!(
            self.out,
            "  {} Total: {} {} {} run {} {} skipped",
            b.apply_to("│"),
            self.theme
                .duration
                .apply_to(format_duration(report.duration)),
            self.theme.dim.apply_to("·"),
            report.count(StepStatus::Succeeded) + report.count(StepStatus::Failed),
            self.theme.dim.apply_to("·"),
            report.count(StepStatus::Skipped),
        )
        .ok();
        writeln!(
            self.out,
            "  {}",
            b.apply_to("└────────────────────────────────────")
        )
        .ok();
    }
}

/// Create the terminal UI for the given mode.
pub fn create_ui(mode: OutputMode, colors: bool) -> Box<dyn UserInterface> {
    Box::new(TerminalUI::new(mode, colors))
}
