//! Progress spinners.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::theme::ProvisionTheme;
use super::SpinnerHandle;

/// A spinner shown while a step runs.
pub struct ProgressSpinner {
    bar: ProgressBar,
    theme: ProvisionTheme,
}

impl ProgressSpinner {
    /// Create a visible spinner with a message.
    pub fn new(message: &str, theme: ProvisionTheme) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("  {spinner:.magenta} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Self { bar, theme }
    }

    /// Create a spinner that doesn't draw.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            theme: ProvisionTheme::plain(),
        }
    }

    fn finish(&mut self, line: String) {
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg}") {
            self.bar.set_style(style);
        }
        self.bar.finish_with_message(format!("  {}", line));
    }
}

impl SpinnerHandle for ProgressSpinner {
    fn set_message(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    fn finish_success(&mut self, msg: &str) {
        let line = self.theme.format_success(msg);
        self.finish(line);
    }

    fn finish_error(&mut self, msg: &str) {
        let line = self.theme.format_error(msg);
        self.finish(line);
    }

    fn finish_skipped(&mut self, msg: &str) {
        let line = self.theme.format_skipped(msg);
        self.finish(line);
    }
}

/// Stand-in for a spinner when stdout is not a terminal.
///
/// Nothing animates; only the final line is printed.
pub struct LineSpinner {
    theme: ProvisionTheme,
}

impl LineSpinner {
    /// Create a line spinner.
    pub fn new(theme: ProvisionTheme) -> Self {
        Self { theme }
    }
}

impl SpinnerHandle for LineSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        println!("  {}", self.theme.format_success(msg));
    }

    fn finish_error(&mut self, msg: &str) {
        println!("  {}", self.theme.format_error(msg));
    }

    fn finish_skipped(&mut self, msg: &str) {
        println!("  {}", self.theme.format_skipped(msg));
    }
}
