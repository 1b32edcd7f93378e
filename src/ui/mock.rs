//! Mock UI implementation for testing.
//!
//! `MockUI` implements [`UserInterface`] and records every interaction
//! for later assertion.
//!
//! # Example
//!
//! ```
//! use provision::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.message("Starting");
//! ui.success("Done!");
//!
//! assert!(ui.has_message("Starting"));
//! assert_eq!(ui.successes(), ["Done!"]);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::runner::ProvisioningReport;

use super::{OutputMode, SpinnerHandle, UserInterface};

/// Mock UI capturing all output.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    error_blocks: Vec<(String, String)>,
    reports: usize,
    spinners: Rc<RefCell<Vec<SpinnerEvent>>>,
}

/// What happened to a spinner started through [`MockUI`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpinnerEvent {
    Started(String),
    Success(String),
    Error(String),
    Skipped(String),
}

impl MockUI {
    /// Create a new MockUI with Normal output mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new MockUI with a specific output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Get all captured messages.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Get all captured success messages.
    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    /// Get all captured warnings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Get all captured errors.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Get all captured headers.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Get all captured error blocks as (command, output).
    pub fn error_blocks(&self) -> &[(String, String)] {
        &self.error_blocks
    }

    /// Number of reports shown.
    pub fn reports_shown(&self) -> usize {
        self.reports
    }

    /// Spinner starts and finishes, in order.
    pub fn spinner_events(&self) -> Vec<SpinnerEvent> {
        self.spinners.borrow().clone()
    }

    /// Whether any message contains `needle`.
    pub fn has_message(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }

    /// Every line written, in no particular order, for leak checks.
    pub fn all_output(&self) -> String {
        let spinner_text = self
            .spinner_events()
            .into_iter()
            .map(|e| format!("{e:?}"))
            .collect::<Vec<_>>();
        self.messages
            .iter()
            .chain(&self.successes)
            .chain(&self.warnings)
            .chain(&self.errors)
            .chain(&self.headers)
            .chain(self.error_blocks.iter().flat_map(|(c, o)| [c, o]))
            .chain(&spinner_text)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        self.spinners
            .borrow_mut()
            .push(SpinnerEvent::Started(message.to_string()));
        Box::new(MockSpinner {
            events: Rc::clone(&self.spinners),
        })
    }

    fn show_error_block(&mut self, command: &str, output: &str) {
        self.error_blocks
            .push((command.to_string(), output.to_string()));
    }

    fn show_report(&mut self, _report: &ProvisioningReport) {
        self.reports += 1;
    }
}

/// Spinner recording into its [`MockUI`].
#[derive(Debug)]
pub struct MockSpinner {
    events: Rc<RefCell<Vec<SpinnerEvent>>>,
}

impl SpinnerHandle for MockSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        self.events
            .borrow_mut()
            .push(SpinnerEvent::Success(msg.to_string()));
    }

    fn finish_error(&mut self, msg: &str) {
        self.events
            .borrow_mut()
            .push(SpinnerEvent::Error(msg.to_string()));
    }

    fn finish_skipped(&mut self, msg: &str) {
        self.events
            .borrow_mut()
            .push(SpinnerEvent::Skipped(msg.to_string()));
    }
}
