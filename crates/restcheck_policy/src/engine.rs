//! Evaluation engine.
//!
//! Evaluation is a pure function of `(Rule, Sample)`. Batches are split into
//! chunks that run on tokio's blocking pool and are re-joined in input order.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use restcheck_core::{CaptureBatch, Ingested, Sample};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::checks::Verdict;
use crate::error::{PolicyError, PolicyResult};
use crate::registry::RuleRegistry;
use crate::report::{aggregate, Finding, Report};
use crate::rules::Rule;

/// Configuration for the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Number of blocking worker tasks a batch is split across
    pub workers: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

impl EvaluatorConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Apply one rule to one sample.
pub fn evaluate_rule(rule: &Rule, sample: &Sample) -> Finding {
    match rule.check.verdict(sample) {
        Verdict::Pass => Finding::pass(rule, &sample.id),
        Verdict::Fail(evidence) => {
            debug!("{} failed on {}: {}", rule.id, sample.id, evidence);
            Finding::fail(rule, &sample.id, evidence)
        }
        Verdict::NotApplicable => Finding::not_applicable(rule, &sample.id),
    }
}

/// Runs registry rules over captured samples.
#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: Arc<RuleRegistry>,
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(registry: RuleRegistry, config: EvaluatorConfig) -> Self {
        Self::shared(Arc::new(registry), config)
    }

    /// Evaluator over a registry that is already shared.
    pub fn shared(registry: Arc<RuleRegistry>, config: EvaluatorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Findings for every applicable rule, in registry order.
    pub fn evaluate_sample(&self, sample: &Sample) -> Vec<Finding> {
        evaluate_with(&self.registry, sample)
    }

    /// Evaluate entries on the current thread, keeping input order.
    pub fn evaluate_entries(&self, entries: &[Ingested]) -> Vec<Finding> {
        evaluate_entries_with(&self.registry, entries)
    }

    /// Evaluate a batch across blocking worker tasks.
    ///
    /// Output order matches a sequential run regardless of worker count.
    pub async fn evaluate_batch(&self, batch: CaptureBatch) -> PolicyResult<Vec<Finding>> {
        let entries = batch.entries;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let workers = self.config.workers.max(1).min(entries.len());
        let chunk_size = entries.len().div_ceil(workers);
        debug!(
            "Evaluating {} entries in chunks of {} across {} workers",
            entries.len(),
            chunk_size,
            workers
        );

        let mut handles = Vec::with_capacity(workers);
        let mut remaining = entries;
        while !remaining.is_empty() {
            let rest = remaining.split_off(chunk_size.min(remaining.len()));
            let chunk = std::mem::replace(&mut remaining, rest);
            let registry = Arc::clone(&self.registry);
            handles.push(tokio::task::spawn_blocking(move || {
                evaluate_entries_with(&registry, &chunk)
            }));
        }

        let mut findings = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(chunk) => findings.extend(chunk),
                Err(e) => {
                    error!("Evaluation worker failed: {}", e);
                    return Err(PolicyError::WorkerFailed(e.to_string()));
                }
            }
        }
        Ok(findings)
    }

    /// Evaluate a batch and aggregate the report.
    pub async fn run(&self, batch: CaptureBatch) -> PolicyResult<Report> {
        let start = Instant::now();
        let entries = batch.len();

        let findings = self.evaluate_batch(batch).await?;
        let report = aggregate(findings);

        info!(
            "Evaluated {} entries in {}ms: {}/{} samples passed, {} warnings",
            entries,
            start.elapsed().as_millis(),
            report.summary.passed,
            report.summary.total,
            report.summary.warnings
        );
        Ok(report)
    }
}

fn evaluate_with(registry: &RuleRegistry, sample: &Sample) -> Vec<Finding> {
    registry
        .rules_for(sample)
        .map(|rule| evaluate_rule(rule, sample))
        .collect()
}

fn evaluate_entries_with(registry: &RuleRegistry, entries: &[Ingested]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for entry in entries {
        match entry {
            Ingested::Accepted(sample) => findings.extend(evaluate_with(registry, sample)),
            Ingested::Rejected(rejection) => findings.push(Finding::rejected(rejection)),
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Outcome;
    use restcheck_core::{Archetype, Method, Rejection, StatusCode};
    use serde_json::json;

    fn created() -> Sample {
        Sample::new("create", Method::Post, "/widgets", StatusCode::new(201).unwrap())
            .with_archetype(Archetype::Collection)
            .with_response_header("Location", "/widgets/42")
    }

    fn not_found() -> Sample {
        Sample::new("missing", Method::Get, "/widgets/42", StatusCode::new(404).unwrap())
            .with_archetype(Archetype::Document)
            .with_json(json!({"error": {"code": 400, "message": "nope", "status": "NOT_FOUND"}}))
    }

    fn outcome<'a>(findings: &'a [Finding], rule: &str) -> &'a Finding {
        findings.iter().find(|f| f.rule == rule).unwrap()
    }

    fn batch(samples: Vec<Sample>) -> CaptureBatch {
        CaptureBatch {
            entries: samples.into_iter().map(Ingested::Accepted).collect(),
        }
    }

    #[test]
    fn test_evaluate_sample() {
        let evaluator = Evaluator::new(RuleRegistry::standard(), EvaluatorConfig::default());
        let findings = evaluator.evaluate_sample(&created());

        assert_eq!(outcome(&findings, "archetype-method").outcome, Outcome::Pass);
        assert_eq!(outcome(&findings, "created-location").outcome, Outcome::Pass);
        assert_eq!(outcome(&findings, "error-envelope").outcome, Outcome::NotApplicable);
        assert!(findings.iter().all(|f| f.sample == "create"));
    }

    #[test]
    fn test_envelope_mismatch_evidence() {
        let evaluator = Evaluator::new(RuleRegistry::standard(), EvaluatorConfig::default());
        let findings = evaluator.evaluate_sample(&not_found());
        let envelope = outcome(&findings, "error-envelope");

        assert_eq!(envelope.outcome, Outcome::Fail);
        assert_eq!(
            envelope.evidence.as_deref(),
            Some("error.code 400 does not match status line 404")
        );
    }

    #[test]
    fn test_disabled_rule_skipped() {
        let mut settings = crate::config::RuleSettings::default();
        settings.disabled.push("created-location".to_string());
        let registry = RuleRegistry::from_settings(&settings).unwrap();
        let evaluator = Evaluator::new(registry, EvaluatorConfig::default());

        let findings = evaluator.evaluate_sample(&created());
        assert!(findings.iter().all(|f| f.rule != "created-location"));
    }

    #[test]
    fn test_rejections_keep_position() {
        let evaluator = Evaluator::new(RuleRegistry::standard(), EvaluatorConfig::default());
        let entries = vec![
            Ingested::Rejected(Rejection {
                sample_id: "bad#1".to_string(),
                reason: "missing request method".to_string(),
            }),
            Ingested::Accepted(created()),
        ];

        let findings = evaluator.evaluate_entries(&entries);
        assert_eq!(findings[0].rule, crate::report::INGESTION_RULE_ID);
        assert_eq!(findings[0].outcome, Outcome::Fail);
        assert!(findings[1..].iter().all(|f| f.sample == "create"));
    }

    #[tokio::test]
    async fn test_batch_order_independent_of_workers() {
        let samples: Vec<Sample> = (0..25)
            .map(|i| {
                let base = if i % 2 == 0 { created() } else { not_found() };
                Sample { id: format!("s{}", i), ..base }
            })
            .collect();

        let sequential = Evaluator::new(RuleRegistry::standard(), EvaluatorConfig::default())
            .evaluate_entries(&batch(samples.clone()).entries);

        for workers in [1, 3, 8, 64] {
            let evaluator = Evaluator::new(
                RuleRegistry::standard(),
                EvaluatorConfig::default().with_workers(workers),
            );
            let parallel = evaluator.evaluate_batch(batch(samples.clone())).await.unwrap();
            assert_eq!(parallel, sequential, "workers = {}", workers);
        }
    }

    #[tokio::test]
    async fn test_run_empty_batch() {
        let evaluator = Evaluator::new(RuleRegistry::standard(), EvaluatorConfig::default());
        let report = evaluator.run(CaptureBatch::new()).await.unwrap();

        assert_eq!(report.summary.total, 0);
        assert!(report.findings.is_empty());
        assert_eq!(report.summary.pass_rate, 1.0);
        assert!(report.passed());
    }

    #[tokio::test]
    async fn test_run_reports_failure() {
        let evaluator = Evaluator::new(RuleRegistry::standard(), EvaluatorConfig::default());
        let report = evaluator.run(batch(vec![created(), not_found()])).await.unwrap();

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.failed, 1);
        assert!(!report.passed());
    }
}
