//! unbun binary entry point.
//!
//! This is a thin wrapper around the unbun-cli library that:
//! 1. Initializes logging
//! 2. Parses command-line arguments
//! 3. Runs the extraction
//! 4. Maps failures to exit codes
//!
//! For library usage, see the unbun-cli crate documentation.

use anyhow::Result;
use std::process::ExitCode;
use unbun_cli::error::{EXIT_FAILURE, EXIT_SUCCESS};
use unbun_cli::{CliConfig, CliError, run};

fn main() -> ExitCode {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::from_args();

    match execute(&config) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(err) => {
            eprintln!("error: {err}");
            let code = err
                .downcast_ref::<CliError>()
                .map_or(EXIT_FAILURE, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn execute(config: &CliConfig) -> Result<()> {
    tracing::debug!(
        "Configuration loaded: binary={:?}, output={:?}, prettier={}",
        config.binary,
        config.output,
        config.formatting_enabled()
    );

    let summary = run(config)?;

    tracing::info!(
        "Extracted {} files ({} formatted)",
        summary.written.len(),
        summary.formatted
    );

    Ok(())
}
