//! External command execution.
//!
//! Commands are executed as argv, never through a shell, so values such as
//! passwords are passed through verbatim. On Unix each child is placed in
//! its own process group so a timeout or cancellation can terminate the
//! whole tree the command spawned.

use crate::cancel::CancellationToken;
use crate::error::{ProvisionError, Result};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// How often the child is polled for exit.
const POLL_TICK: Duration = Duration::from_millis(10);

/// Time between SIGTERM and SIGKILL when terminating a process group.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Result of executing a command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Stdout and stderr interleaved in arrival order.
    pub output: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,

    /// Kill the command after this long (None = no timeout).
    pub timeout: Option<Duration>,

    /// Abort the command when this token trips.
    pub cancel: Option<CancellationToken>,
}

impl CommandOptions {
    /// Copy of these options with a different timeout.
    pub fn with_timeout(&self, timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }
}

/// Output line from command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Render argv as a single display string.
pub fn display_command(command: &[String]) -> String {
    command
        .iter()
        .map(|token| {
            if token.is_empty() || token.chars().any(char::is_whitespace) {
                format!("'{}'", token.replace('\'', "'\\''"))
            } else {
                token.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Execute a command and capture its output.
///
/// A non-zero exit is reported through [`CommandResult::success`], not as
/// an error. Launch failures, timeouts and cancellation are errors.
pub fn execute(command: &[String], options: &CommandOptions) -> Result<CommandResult> {
    execute_streaming(command, options, None)
}

/// Execute a command, invoking `callback` for every output line as it arrives.
pub fn execute_streaming(
    command: &[String],
    options: &CommandOptions,
    callback: Option<&dyn Fn(&OutputLine)>,
) -> Result<CommandResult> {
    let display = display_command(command);
    let Some((program, args)) = command.split_first() else {
        return Err(ProvisionError::ProcessLaunch {
            command: display,
            message: "empty command".to_string(),
        });
    };

    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| ProvisionError::ProcessLaunch {
        command: display.clone(),
        message: if e.kind() == std::io::ErrorKind::NotFound {
            format!("'{}' not found", program)
        } else {
            e.to_string()
        },
    })?;

    tracing::debug!(
        program = %program,
        args = args.len(),
        pid = child.id(),
        "Spawned process"
    );

    let (tx, rx) = mpsc::channel();
    let stdout_handle = child
        .stdout
        .take()
        .map(|pipe| spawn_reader(pipe, tx.clone(), OutputLine::Stdout));
    let stderr_handle = child
        .stderr
        .take()
        .map(|pipe| spawn_reader(pipe, tx, OutputLine::Stderr));

    let mut combined = String::new();
    let drain = |rx: &mpsc::Receiver<OutputLine>, combined: &mut String| {
        for line in rx.try_iter() {
            if let Some(cb) = callback {
                cb(&line);
            }
            let (OutputLine::Stdout(text) | OutputLine::Stderr(text)) = &line;
            combined.push_str(text);
            combined.push('\n');
        }
    };

    let mut outcome = loop {
        drain(&rx, &mut combined);

        if let Some(status) = child.try_wait()? {
            break Outcome::Exited(status);
        }

        if let Some(limit) = options.timeout {
            if start.elapsed() >= limit {
                tracing::warn!(program = %program, "Process exceeded {:?}, terminating", limit);
                terminate(&mut child)?;
                break Outcome::TimedOut(limit);
            }
        }

        if options.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            tracing::warn!(program = %program, "Cancellation requested, terminating");
            terminate(&mut child)?;
            break Outcome::Cancelled;
        }

        thread::sleep(POLL_TICK);
    };

    // The leader has exited, but background members of its group may still
    // hold the pipes open. They get until the same deadline, then are killed.
    if matches!(outcome, Outcome::Exited(_)) {
        let readers = [&stdout_handle, &stderr_handle];
        while readers
            .iter()
            .any(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
        {
            drain(&rx, &mut combined);

            if options.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                tracing::warn!(program = %program, "Cancellation requested, killing process group");
                kill_group(&child);
                outcome = Outcome::Cancelled;
                break;
            }
            if options.timeout.is_some_and(|limit| start.elapsed() >= limit) {
                tracing::warn!(
                    program = %program,
                    "Process exited but its group outlived the timeout, killing it"
                );
                kill_group(&child);
                break;
            }

            thread::sleep(POLL_TICK);
        }
    }

    let stdout = stdout_handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default();
    let stderr = stderr_handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default();
    drain(&rx, &mut combined);

    let duration = start.elapsed();

    match outcome {
        Outcome::Exited(status) => {
            tracing::debug!(program = %program, code = ?status.code(), ?duration, "Process exited");
            Ok(CommandResult {
                exit_code: status.code(),
                stdout,
                stderr,
                output: combined,
                duration,
                success: status.success(),
            })
        }
        Outcome::TimedOut(timeout) => Err(ProvisionError::ProcessTimeout {
            command: display,
            timeout,
            output: combined,
        }),
        Outcome::Cancelled => Err(ProvisionError::Cancelled),
    }
}

/// Execute a command, treating a non-zero exit as [`ProvisionError::ProcessExit`].
pub fn run(command: &[String], options: &CommandOptions) -> Result<CommandResult> {
    run_streaming(command, options, None)
}

/// Streaming variant of [`run`].
pub fn run_streaming(
    command: &[String],
    options: &CommandOptions,
    callback: Option<&dyn Fn(&OutputLine)>,
) -> Result<CommandResult> {
    let result = execute_streaming(command, options, callback)?;
    if result.success {
        Ok(result)
    } else {
        Err(ProvisionError::ProcessExit {
            command: display_command(command),
            code: result.exit_code,
            output: result.output,
        })
    }
}

/// Execute a command and return success/failure.
pub fn execute_check(command: &[String], options: &CommandOptions) -> bool {
    execute(command, options)
        .map(|r| r.success)
        .unwrap_or(false)
}

enum Outcome {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
}

fn spawn_reader<R, F>(pipe: R, tx: mpsc::Sender<OutputLine>, wrap: F) -> thread::JoinHandle<String>
where
    R: Read + Send + 'static,
    F: Fn(String) -> OutputLine + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut output = String::new();
        let mut buf = Vec::new();
        // Lines are decoded lossily; stopping early would leave the child
        // writing into a closed pipe.
        while matches!(reader.read_until(b'\n', &mut buf), Ok(n) if n > 0) {
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            let line = String::from_utf8_lossy(&buf).into_owned();
            buf.clear();
            output.push_str(&line);
            output.push('\n');
            let _ = tx.send(wrap(line));
        }
        output
    })
}

/// SIGKILL whatever is left of an already reaped child's process group.
#[cfg(unix)]
fn kill_group(child: &Child) {
    // SAFETY: killpg only sends a signal; the group was created by process_group(0)
    // and cannot be reused while members remain.
    unsafe {
        libc::killpg(child.id() as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

/// Terminate the child and everything in its process group.
#[cfg(unix)]
fn terminate(child: &mut Child) -> Result<()> {
    let pgid = child.id() as libc::pid_t;

    // SAFETY: killpg only sends a signal; the group was created by process_group(0).
    unsafe {
        libc::killpg(pgid, libc::SIGTERM);
    }

    let deadline = Instant::now() + KILL_GRACE;
    while Instant::now() < deadline {
        if child.try_wait()?.is_some() {
            // Leader is gone; make sure stragglers in the group are too.
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
            return Ok(());
        }
        thread::sleep(POLL_TICK);
    }

    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
    child.wait()?;
    Ok(())
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> Result<()> {
    let _ = child.kill();
    child.wait()?;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn execute_successful_command() {
        let result = execute(&sh("echo hello"), &CommandOptions::default()).unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.contains("hello"));
        assert!(result.output.contains("hello"));
    }

    #[test]
    fn execute_failing_command_is_not_an_error() {
        let result = execute(&sh("exit 3"), &CommandOptions::default()).unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[test]
    fn run_maps_nonzero_exit_to_process_exit() {
        let err = run(&sh("echo boom >&2; exit 1"), &CommandOptions::default()).unwrap_err();

        match err {
            ProvisionError::ProcessExit { code, output, .. } => {
                assert_eq!(code, Some(1));
                assert!(output.contains("boom"));
            }
            other => panic!("expected ProcessExit, got {other:?}"),
        }
    }

    #[test]
    fn missing_binary_is_launch_error() {
        let command = vec!["definitely-not-a-real-binary-xyz".to_string()];
        let err = execute(&command, &CommandOptions::default()).unwrap_err();

        assert!(matches!(err, ProvisionError::ProcessLaunch { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn empty_command_is_launch_error() {
        let err = execute(&[], &CommandOptions::default()).unwrap_err();
        assert!(matches!(err, ProvisionError::ProcessLaunch { .. }));
    }

    #[test]
    fn combined_output_contains_both_streams() {
        let result = execute(&sh("echo out; echo err >&2"), &CommandOptions::default()).unwrap();

        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
        assert!(result.stderr.contains("err"));
        assert!(!result.stdout.contains("err"));
    }

    #[test]
    fn timeout_kills_process() {
        let options = CommandOptions {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };

        let start = Instant::now();
        let err = execute(&sh("echo started; sleep 30"), &options).unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(10));
        match err {
            ProvisionError::ProcessTimeout { timeout, output, .. } => {
                assert_eq!(timeout, Duration::from_millis(200));
                assert!(output.contains("started"));
            }
            other => panic!("expected ProcessTimeout, got {other:?}"),
        }
    }

    #[test]
    fn timeout_kills_whole_process_group() {
        let options = CommandOptions {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };

        // The backgrounded sleep holds stdout open; if it survived the kill,
        // the reader threads would block until it exited.
        let start = Instant::now();
        let err = execute(&sh("sleep 30 & sleep 30"), &options).unwrap_err();

        assert!(matches!(err, ProvisionError::ProcessTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn background_member_cannot_outlive_timeout() {
        let options = CommandOptions {
            timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        };

        let start = Instant::now();
        let result = execute(&sh("sleep 8 & echo leader-done"), &options).unwrap();

        assert!(start.elapsed() < Duration::from_secs(5), "{:?}", start.elapsed());
        assert!(result.success);
        assert!(result.stdout.contains("leader-done"));
    }

    #[test]
    fn non_utf8_output_does_not_break_capture() {
        let script = "printf 'caf\\351\\n'; seq 1 20000; echo done";
        let result = execute(&sh(script), &CommandOptions::default()).unwrap();

        assert!(result.success, "exit code: {:?}", result.exit_code);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.starts_with("caf\u{FFFD}\n"));
        assert!(result.stdout.contains("\n20000\n"));
        assert!(result.stdout.trim_end().ends_with("done"));
    }

    #[test]
    fn crlf_line_endings_are_trimmed() {
        let result = execute(&sh("printf 'one\\r\\ntwo\\r\\n'"), &CommandOptions::default()).unwrap();
        assert_eq!(result.stdout, "one\ntwo\n");
    }

    #[test]
    fn cancellation_kills_process() {
        let token = CancellationToken::new();
        let options = CommandOptions {
            cancel: Some(token.clone()),
            ..Default::default()
        };
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            remote.cancel();
        });

        let err = execute(&sh("sleep 30"), &options).unwrap_err();

        assert!(matches!(err, ProvisionError::Cancelled));
        handle.join().unwrap();
    }

    #[test]
    fn execute_with_env() {
        let mut options = CommandOptions::default();
        options
            .env
            .insert("SITE_NAME".to_string(), "erp.local".to_string());

        let result = execute(&sh("echo $SITE_NAME"), &options).unwrap();

        assert!(result.stdout.contains("erp.local"));
    }

    #[test]
    fn execute_with_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "").unwrap();
        let options = CommandOptions {
            cwd: Some(temp.path().to_path_buf()),
            ..Default::default()
        };

        assert!(execute_check(&sh("test -f marker.txt"), &options));
    }

    #[test]
    fn arguments_are_not_shell_interpreted() {
        let command = vec!["echo".to_string(), "$HOME; rm -rf /".to_string()];
        let result = execute(&command, &CommandOptions::default()).unwrap();

        assert_eq!(result.stdout.trim(), "$HOME; rm -rf /");
    }

    #[test]
    fn execute_streaming_reports_lines() {
        use std::sync::Mutex;

        let lines = Mutex::new(Vec::new());
        let callback = |line: &OutputLine| lines.lock().unwrap().push(line.clone());

        let result = execute_streaming(
            &sh("echo one; echo two >&2"),
            &CommandOptions::default(),
            Some(&callback as &dyn Fn(&OutputLine)),
        )
        .unwrap();

        assert!(result.success);
        let captured = lines.lock().unwrap();
        assert!(captured.contains(&OutputLine::Stdout("one".to_string())));
        assert!(captured.contains(&OutputLine::Stderr("two".to_string())));
    }

    #[test]
    fn execute_check_returns_bool() {
        assert!(execute_check(&sh("exit 0"), &CommandOptions::default()));
        assert!(!execute_check(&sh("exit 1"), &CommandOptions::default()));
    }

    #[test]
    fn display_command_quotes_whitespace() {
        let command = vec![
            "bench".to_string(),
            "new-site".to_string(),
            "my site".to_string(),
        ];
        assert_eq!(display_command(&command), "bench new-site 'my site'");
    }
}
