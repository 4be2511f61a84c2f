//! # restcheck_policy
//!
//! Guideline rules, evaluation and reporting for restcheck.
//!
//! This crate provides:
//! - **Rule Registry**: the standard guideline catalog plus configured custom rules
//! - **Evaluator**: pure `(Rule, Sample) -> Finding` checks, run in parallel over a batch
//! - **Report Aggregator**: order-independent summary counts with text and JSON output
//!
//! ## Example
//!
//! ```rust,ignore
//! use restcheck_core::CaptureReader;
//! use restcheck_policy::{CheckerConfig, Evaluator};
//! use std::path::Path;
//!
//! let config = CheckerConfig::discover(Path::new("."))?;
//! let mut reader = CaptureReader::new(config.resolver()?);
//! let batch = reader.read_path(Path::new("captures/"))?;
//!
//! let evaluator = Evaluator::new(config.registry()?, config.evaluator_config());
//! let report = evaluator.run(batch).await?;
//!
//! if report.passed() {
//!     println!("✅ API conforms");
//! } else {
//!     println!("{}", report.to_text());
//! }
//! ```

pub mod catalog;
pub mod checks;
pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod report;
pub mod rules;

pub use catalog::{standard_rules, MatrixEntry, Permission, ARCHETYPE_METHOD_MATRIX};
pub use checks::Verdict;
pub use config::{CheckerConfig, RuleSettings, DEFAULT_FILE};
pub use engine::{evaluate_rule, Evaluator, EvaluatorConfig};
pub use envelope::{parse_envelope, EnvelopeProblem, ErrorEnvelope};
pub use error::{PolicyError, PolicyResult};
pub use registry::RuleRegistry;
pub use report::{aggregate, Finding, Outcome, Report, RuleCounts, Summary, Tally, INGESTION_RULE_ID};
pub use rules::{ResourceScope, Rule, RuleCheck, Severity};
