//! restcheck CLI - Main entry point.
//!
//! Exit codes:
//! - 0: No error-severity rule failed
//! - 1: At least one error-severity rule failed
//! - 2: Configuration error
//! - 3: Other error

use std::process::ExitCode;

use clap::Parser;
use restcheck_policy::PolicyError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const NONCONFORMANT: u8 = 1;
    pub const CONFIGURATION_ERROR: u8 = 2;
    pub const GENERAL_ERROR: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = dispatch(cli.command).await;
    if let Err(e) = &result {
        eprintln!("❌ Error: {:#}", e);
    }
    ExitCode::from(exit_code(&result))
}

/// Run a command. `Ok(false)` means the samples did not conform.
async fn dispatch(command: Commands) -> anyhow::Result<bool> {
    match command {
        Commands::Check(args) => commands::check::execute(args).await,
        Commands::Rules(args) => commands::rules::execute(args).await.map(|()| true),
    }
}

fn exit_code(result: &anyhow::Result<bool>) -> u8 {
    match result {
        Ok(true) => ExitCodes::SUCCESS,
        Ok(false) => ExitCodes::NONCONFORMANT,
        Err(e) => categorize_error(e),
    }
}

/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,restcheck={}", level)));

    // Ignore a second initialization
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let configuration = e
        .chain()
        .filter_map(|cause| cause.downcast_ref::<PolicyError>())
        .any(PolicyError::is_configuration);

    if configuration {
        ExitCodes::CONFIGURATION_ERROR
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
