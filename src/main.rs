//! basecamp CLI entry point.

use std::process::ExitCode;

use basecamp::cli::{Cli, CommandDispatcher, LaunchContext};
use basecamp::error::ErrorClass;
use basecamp::shell::is_ci;
use basecamp::ui::{create_ui, OutputMode};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("basecamp=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("basecamp=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("basecamp starting with args: {:?}", cli);

    let output_mode = OutputMode::from_flags(cli.quiet, cli.verbose);

    if cli.no_color {
        std::env::set_var("NO_COLOR", "1");
    }

    let is_interactive = !cli.non_interactive && !is_ci();
    let mut ui = create_ui(is_interactive, output_mode);

    let context = match LaunchContext::load(cli.data_dir.clone(), cli.bundle_dir.clone()) {
        Ok(context) => context,
        Err(e) => {
            ui.error(&format!("Error: {}", e));
            return ExitCode::from(1);
        }
    };

    let dispatcher = CommandDispatcher::new(context);
    match dispatcher.dispatch(&cli, ui.as_mut()) {
        Ok(result) => ExitCode::from(result.exit_code.clamp(0, 255) as u8),
        Err(e) => {
            ui.error(&format!("Error: {}", e));
            if e.class() == ErrorClass::Fatal {
                ui.message("Startup stopped. Fix the problem above and run basecamp again.");
            }
            ExitCode::from(1)
        }
    }
}
