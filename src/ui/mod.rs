//! User interface components.
//!
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for real terminals and plain pipes
//! - [`MockUI`] for tests
//!
//! # Example
//!
//! ```
//! use provision::ui::{create_ui, OutputMode};
//!
//! let mut ui = create_ui(OutputMode::Silent, false);
//! ui.show_header("Provisioning erp.localhost");
//! ui.success("Done");
//! ```

pub mod mock;
pub mod output;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use mock::{MockSpinner, MockUI, SpinnerEvent};
pub use output::OutputMode;
pub use spinner::{LineSpinner, ProgressSpinner};
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, ProvisionTheme};

use crate::runner::ProvisioningReport;

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message. Shown in every mode.
    fn error(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Start a spinner for a running step.
    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    /// Show a failed command together with its captured output.
    fn show_error_block(&mut self, command: &str, output: &str);

    /// Show the final per-step summary.
    fn show_report(&mut self, report: &ProvisioningReport);
}

/// Handle for controlling a spinner.
pub trait SpinnerHandle {
    /// Update the spinner message.
    fn set_message(&mut self, msg: &str);

    /// Mark the operation as successful.
    fn finish_success(&mut self, msg: &str);

    /// Mark the operation as failed.
    fn finish_error(&mut self, msg: &str);

    /// Mark as skipped.
    fn finish_skipped(&mut self, msg: &str);
}
