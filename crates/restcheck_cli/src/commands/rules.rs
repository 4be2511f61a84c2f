//! Rules command - list the rule catalog and the archetype/method matrix.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use restcheck_policy::{MatrixEntry, Permission, Rule, RuleRegistry, ARCHETYPE_METHOD_MATRIX};
use serde::Serialize;

use super::{load_config, OutputFormat};

#[derive(Args)]
pub struct RulesArgs {
    /// Configuration file (defaults to ./restcheck.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Serialize)]
struct Catalog<'a> {
    rules: Vec<&'a Rule>,
    matrix: &'a [MatrixEntry],
}

pub async fn execute(args: RulesArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let registry = config.registry()?;

    match args.format {
        OutputFormat::Json => {
            let catalog = Catalog {
                rules: registry.iter().collect(),
                matrix: &ARCHETYPE_METHOD_MATRIX,
            };
            let json = serde_json::to_string_pretty(&catalog).context("Failed to serialize catalog")?;
            println!("{}", json);
        }
        OutputFormat::Text => println!("{}", render_text(&registry)),
    }
    Ok(())
}

fn render_text(registry: &RuleRegistry) -> String {
    let mut out = String::new();

    out.push_str(&format!("Rules ({}):\n", registry.len()));
    for rule in registry.iter() {
        let status = if rule.enabled { "✅" } else { "⏸️" };
        out.push_str(&format!(
            "  {} {:<30} [{}] {}\n",
            status,
            rule.id,
            rule.severity,
            rule.display_name()
        ));
        if !rule.description.is_empty() {
            out.push_str(&format!("      {}\n", rule.description));
        }
    }

    out.push_str("\nArchetype/method matrix:\n");
    for entry in ARCHETYPE_METHOD_MATRIX.iter() {
        let mark = match entry.permission {
            Permission::Allowed => "✅",
            Permission::Forbidden => "❌",
        };
        out.push_str(&format!(
            "  {} {:<10} {:<6} {}\n",
            mark,
            entry.archetype.as_str(),
            entry.method.as_str(),
            entry.note
        ));
    }
    out
}
