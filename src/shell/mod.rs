//! External process execution.

pub mod command;
pub mod runner;

pub use command::{
    display_command, execute, execute_check, execute_streaming, run, run_streaming, CommandOptions,
    CommandResult, OutputLine,
};
pub use runner::{ProcessRunner, SystemRunner};
