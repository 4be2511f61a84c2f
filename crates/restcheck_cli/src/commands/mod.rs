//! CLI command definitions.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use restcheck_policy::CheckerConfig;

pub mod check;
pub mod rules;

/// restcheck - REST API guideline conformance checker
#[derive(Parser)]
#[command(name = "restcheck")]
#[command(version, about = "restcheck - REST API guideline conformance checker")]
#[command(long_about = r#"
restcheck evaluates captured HTTP request/response samples against a catalog
of REST API design rules and reports which samples conform.

COMMANDS:
  check  → Evaluate capture files and report findings
  rules  → List the rule catalog and the archetype/method matrix

EXIT CODES:
  0 - No error-severity rule failed
  1 - At least one error-severity rule failed
  2 - Configuration error
  3 - Other error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate captured samples against the rule catalog
    Check(check::CheckArgs),

    /// List the rule catalog
    Rules(rules::RulesArgs),
}

/// Output format shared by commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Load `--config` if given, otherwise look for the default file in the working directory.
pub fn load_config(path: Option<&Path>) -> Result<CheckerConfig> {
    match path {
        Some(path) => CheckerConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            let cwd: PathBuf = std::env::current_dir()?;
            CheckerConfig::discover(&cwd).context("Failed to load configuration")
        }
    }
}
