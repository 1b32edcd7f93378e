//! Provision CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use provision::cancel::CancellationToken;
use provision::cli::{Cli, Command, ProvisionCommand, ProvisionOptions};
use provision::ui::{create_ui, should_use_colors, OutputMode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("provision=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("provision=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!(
        config = ?cli.config,
        dry_run = cli.dry_run,
        force = cli.force,
        "Provision starting"
    );

    let output_mode = OutputMode::from_flags(cli.verbose, cli.quiet, cli.json);
    let mut ui = create_ui(output_mode, should_use_colors(cli.no_color));

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            ui.error(&format!("Error: cannot determine working directory: {}", e));
            return ExitCode::from(1);
        }
    };

    let command = ProvisionCommand::new(&cwd, ProvisionOptions::from(&cli))
        .with_cancellation(CancellationToken::from_signals());

    match command.execute(ui.as_mut()) {
        Ok(result) => exit_code(result.exit_code),
        Err(e) => {
            ui.error(&format!("Error: {}", e));
            exit_code(e.exit_code())
        }
    }
}
