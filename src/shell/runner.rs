//! The process-runner seam used by the sequencer.

use crate::error::Result;

use super::command::{self, CommandOptions, CommandResult, OutputLine};

/// Runs external commands on behalf of the sequencer.
///
/// Implementations must report a non-zero exit as
/// [`ProvisionError::ProcessExit`](crate::error::ProvisionError::ProcessExit)
/// and must not retry on their own.
pub trait ProcessRunner {
    /// Run `command` to completion.
    fn run(&self, command: &[String], options: &CommandOptions) -> Result<CommandResult>;
}

/// Runs commands as real child processes.
#[derive(Default)]
pub struct SystemRunner {
    on_output: Option<Box<dyn Fn(&OutputLine)>>,
}

impl SystemRunner {
    /// Create a runner that only captures output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner that also forwards every output line as it arrives.
    pub fn streaming(on_output: impl Fn(&OutputLine) + 'static) -> Self {
        Self {
            on_output: Some(Box::new(on_output)),
        }
    }
}

impl std::fmt::Debug for SystemRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemRunner")
            .field("streaming", &self.on_output.is_some())
            .finish()
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &[String], options: &CommandOptions) -> Result<CommandResult> {
        command::run_streaming(command, options, self.on_output.as_deref())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn system_runner_reports_nonzero_exit_as_error() {
        let runner = SystemRunner::new();
        let command = vec!["sh".to_string(), "-c".to_string(), "exit 2".to_string()];

        let err = runner.run(&command, &CommandOptions::default()).unwrap_err();

        assert!(matches!(err, ProvisionError::ProcessExit { code: Some(2), .. }));
    }

    #[test]
    fn streaming_runner_forwards_lines() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let runner = SystemRunner::streaming(move |line| sink.borrow_mut().push(line.clone()));
        let command = vec!["echo".to_string(), "building".to_string()];

        runner.run(&command, &CommandOptions::default()).unwrap();

        assert_eq!(
            seen.borrow().as_slice(),
            &[OutputLine::Stdout("building".to_string())]
        );
    }
}
