//! Check command - evaluate capture files against the rule catalog.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use restcheck_core::{CaptureBatch, CaptureReader};
use restcheck_policy::{Evaluator, Report};
use tracing::{info, warn};

use super::{load_config, OutputFormat};

#[derive(Args)]
pub struct CheckArgs {
    /// Capture files or directories (.json, .jsonl, .ndjson, .yaml)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Configuration file (defaults to ./restcheck.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Only list failed findings
    #[arg(long)]
    failures_only: bool,

    /// Number of evaluation workers
    #[arg(short, long)]
    workers: Option<usize>,
}

/// Run the check. Returns whether the samples conform.
pub async fn execute(args: CheckArgs) -> Result<bool> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    config.validate()?;

    let registry = config.registry()?;
    let mut reader = CaptureReader::new(config.resolver()?);

    let mut batch = CaptureBatch::new();
    for path in &args.paths {
        info!("Reading captures from {}", path.display());
        let read = reader
            .read_path(path)
            .with_context(|| format!("Failed to read captures from {}", path.display()))?;
        batch.extend(read);
    }

    let rejected = batch.rejected().count();
    if rejected > 0 {
        warn!("{} capture records rejected at ingestion", rejected);
    }
    if batch.is_empty() {
        warn!("No capture records found");
    }

    let evaluator = Evaluator::new(registry, config.evaluator_config());
    info!(
        "Evaluating {} entries with {} workers",
        batch.len(),
        evaluator.config().workers
    );
    let report = evaluator
        .run(batch)
        .await
        .context("Failed to evaluate captures")?;

    print_report(&report, args.format, args.failures_only)?;
    Ok(report.passed())
}

fn print_report(report: &Report, format: OutputFormat, failures_only: bool) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = report
                .to_json(failures_only)
                .context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("{}", report.to_text());
            println!();
            if report.passed() {
                println!("✅ API conformance check PASSED");
            } else {
                println!("❌ API conformance check FAILED");
            }
        }
    }
    Ok(())
}
