//! Findings and the conformance report.
//!
//! Summary counts are a commutative fold over findings ([`Tally`]), so the
//! order findings arrive in never changes the numbers. The report itself keeps
//! findings in input order for display.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use restcheck_core::Rejection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PolicyResult;
use crate::rules::{Rule, Severity};

/// Rule id used for records rejected at ingestion.
pub const INGESTION_RULE_ID: &str = "ingestion";

/// Result of applying one rule to one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Pass,
    Fail,
    NotApplicable,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::NotApplicable => "not-applicable",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule evaluated against one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule id
    pub rule: String,
    pub severity: Severity,
    /// Sample id
    pub sample: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Finding {
    pub fn pass(rule: &Rule, sample: impl Into<String>) -> Self {
        Self::new(rule, sample, Outcome::Pass, None)
    }

    pub fn fail(rule: &Rule, sample: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self::new(rule, sample, Outcome::Fail, Some(evidence.into()))
    }

    pub fn not_applicable(rule: &Rule, sample: impl Into<String>) -> Self {
        Self::new(rule, sample, Outcome::NotApplicable, None)
    }

    fn new(rule: &Rule, sample: impl Into<String>, outcome: Outcome, evidence: Option<String>) -> Self {
        Self {
            rule: rule.id.clone(),
            severity: rule.severity,
            sample: sample.into(),
            outcome,
            evidence,
        }
    }

    /// Finding for a record that never became a sample.
    pub fn rejected(rejection: &Rejection) -> Self {
        Self {
            rule: INGESTION_RULE_ID.to_string(),
            severity: Severity::Error,
            sample: rejection.sample_id.clone(),
            outcome: Outcome::Fail,
            evidence: Some(rejection.reason.clone()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Fail
    }

    /// A failure of an error-severity rule.
    pub fn is_blocking(&self) -> bool {
        self.is_failure() && self.severity.blocks()
    }
}

/// Per-rule counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCounts {
    pub severity: Severity,
    pub passed: usize,
    pub failed: usize,
    pub not_applicable: usize,
}

impl RuleCounts {
    fn new(severity: Severity) -> Self {
        Self {
            severity,
            passed: 0,
            failed: 0,
            not_applicable: 0,
        }
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Pass => self.passed += 1,
            Outcome::Fail => self.failed += 1,
            Outcome::NotApplicable => self.not_applicable += 1,
        }
    }

    fn merge(&mut self, other: &RuleCounts) {
        self.severity = self.severity.max(other.severity);
        self.passed += other.passed;
        self.failed += other.failed;
        self.not_applicable += other.not_applicable;
    }
}

/// Headline numbers of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Distinct samples seen
    pub total: usize,
    /// Samples with no failed error-severity finding
    pub passed: usize,
    /// Samples with at least one failed error-severity finding
    pub failed: usize,
    /// Failed warning-severity findings
    pub warnings: usize,
    /// `passed / total`, 1.0 for an empty run
    pub pass_rate: f64,
}

/// Commutative accumulator behind [`Summary`].
///
/// `absorb` and `merge` may be applied in any order and grouping; the
/// resulting counts are the same.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    /// sample id -> has a blocking failure
    samples: BTreeMap<String, bool>,
    rules: BTreeMap<String, RuleCounts>,
    warnings: usize,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, finding: &Finding) {
        let blocked = self.samples.entry(finding.sample.clone()).or_insert(false);
        *blocked |= finding.is_blocking();

        if finding.is_failure() && !finding.severity.blocks() {
            self.warnings += 1;
        }

        let counts = self
            .rules
            .entry(finding.rule.clone())
            .or_insert_with(|| RuleCounts::new(finding.severity));
        counts.severity = counts.severity.max(finding.severity);
        counts.record(finding.outcome);
    }

    pub fn merge(mut self, other: Tally) -> Tally {
        for (sample, blocked) in other.samples {
            *self.samples.entry(sample).or_insert(false) |= blocked;
        }
        for (rule, counts) in other.rules {
            self.rules
                .entry(rule)
                .and_modify(|existing| existing.merge(&counts))
                .or_insert(counts);
        }
        self.warnings += other.warnings;
        self
    }

    pub fn summary(&self) -> Summary {
        let total = self.samples.len();
        let failed = self.samples.values().filter(|blocked| **blocked).count();
        let passed = total - failed;
        let pass_rate = if total == 0 {
            1.0
        } else {
            passed as f64 / total as f64
        };

        Summary {
            total,
            passed,
            failed,
            warnings: self.warnings,
            pass_rate,
        }
    }

    pub fn rule_counts(&self) -> &BTreeMap<String, RuleCounts> {
        &self.rules
    }
}

impl<'a> FromIterator<&'a Finding> for Tally {
    fn from_iter<I: IntoIterator<Item = &'a Finding>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for finding in iter {
            tally.absorb(finding);
        }
        tally
    }
}

/// Result of one evaluation run. Read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub summary: Summary,
    pub rules: BTreeMap<String, RuleCounts>,
    pub findings: Vec<Finding>,
}

/// Fold findings into a report. Findings keep their order.
pub fn aggregate(findings: Vec<Finding>) -> Report {
    let tally: Tally = findings.iter().collect();
    Report {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        summary: tally.summary(),
        rules: tally.rule_counts().clone(),
        findings,
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    run_id: &'a Uuid,
    generated_at: &'a DateTime<Utc>,
    summary: &'a Summary,
    rules: &'a BTreeMap<String, RuleCounts>,
    findings: Vec<&'a Finding>,
}

impl Report {
    /// True when no error-severity rule failed.
    pub fn passed(&self) -> bool {
        self.summary.failed == 0
    }

    /// Failed error-severity findings.
    pub fn blocking_failures(&self) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.is_blocking()).collect()
    }

    /// Failed warning-severity findings.
    pub fn warnings(&self) -> Vec<&Finding> {
        self.findings
            .iter()
            .filter(|f| f.is_failure() && !f.severity.blocks())
            .collect()
    }

    /// Distinct sample ids in first-seen order.
    pub fn sample_ids(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.findings
            .iter()
            .filter(|f| seen.insert(f.sample.as_str()))
            .map(|f| f.sample.as_str())
            .collect()
    }

    /// Machine-readable form. `failures_only` keeps just the failed findings.
    pub fn to_json(&self, failures_only: bool) -> PolicyResult<String> {
        let doc = JsonReport {
            run_id: &self.run_id,
            generated_at: &self.generated_at,
            summary: &self.summary,
            rules: &self.rules,
            findings: self
                .findings
                .iter()
                .filter(|f| !failures_only || f.is_failure())
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Human-readable report.
    pub fn to_text(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!("Run: {} ({})\n", self.run_id, self.generated_at.to_rfc3339()));
        report.push_str(&format!(
            "Status: {}\n\n",
            if self.passed() { "✅ CONFORMANT" } else { "❌ NONCONFORMANT" }
        ));

        if !self.rules.is_empty() {
            report.push_str("Rules:\n");
            for (id, counts) in &self.rules {
                let status = if counts.failed == 0 {
                    "✅"
                } else if counts.severity.blocks() {
                    "❌"
                } else {
                    "⚠️"
                };
                report.push_str(&format!(
                    "  {} {} [{}] - {} passed, {} failed, {} n/a\n",
                    status, id, counts.severity, counts.passed, counts.failed, counts.not_applicable
                ));
            }
        }

        let failures = self.blocking_failures();
        if !failures.is_empty() {
            report.push_str("\nViolations:\n");
            for failure in failures {
                report.push_str(&format!(
                    "  ❌ {} on {}: {}\n",
                    failure.rule,
                    failure.sample,
                    failure.evidence.as_deref().unwrap_or("no evidence")
                ));
            }
        }

        let warnings = self.warnings();
        if !warnings.is_empty() {
            report.push_str("\nWarnings:\n");
            for warning in warnings {
                report.push_str(&format!(
                    "  ⚠️ {} on {}: {}\n",
                    warning.rule,
                    warning.sample,
                    warning.evidence.as_deref().unwrap_or("no evidence")
                ));
            }
        }

        report.push_str(&format!(
            "\nSummary: {}/{} samples passed ({:.1}%), {} warnings",
            self.summary.passed,
            self.summary.total,
            self.summary.pass_rate * 100.0,
            self.summary.warnings
        ));

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleCheck;

    fn rule(id: &str, severity: Severity) -> Rule {
        Rule::new(id, id, RuleCheck::RecommendedStatus).with_severity(severity)
    }

    fn findings() -> Vec<Finding> {
        let envelope = rule("error-envelope", Severity::Error);
        let location = rule("created-location", Severity::Warning);
        vec![
            Finding::pass(&envelope, "a"),
            Finding::fail(&location, "a", "expected Location header, found none"),
            Finding::fail(&envelope, "b", "missing error.code"),
            Finding::not_applicable(&location, "b"),
            Finding::pass(&envelope, "c"),
            Finding::rejected(&Rejection {
                sample_id: "d".to_string(),
                reason: "missing request method".to_string(),
            }),
        ]
    }

    #[test]
    fn test_empty_report() {
        let report = aggregate(Vec::new());

        assert_eq!(report.summary.total, 0);
        assert!(report.findings.is_empty());
        assert_eq!(report.summary.pass_rate, 1.0);
        assert!(report.passed());
    }

    #[test]
    fn test_summary_counts() {
        let report = aggregate(findings());

        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.failed, 2);
        assert_eq!(report.summary.passed, 2);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.passed + report.summary.failed, report.summary.total);
        assert_eq!(report.summary.total, report.sample_ids().len());
        assert!(!report.passed());

        let envelope = report.rules["error-envelope"];
        assert_eq!((envelope.passed, envelope.failed, envelope.not_applicable), (2, 1, 0));
        assert_eq!(report.rules[INGESTION_RULE_ID].failed, 1);
    }

    #[test]
    fn test_order_preserved() {
        let report = aggregate(findings());
        let samples: Vec<&str> = report.findings.iter().map(|f| f.sample.as_str()).collect();
        assert_eq!(samples, vec!["a", "a", "b", "b", "c", "d"]);
        assert_eq!(report.sample_ids(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_tally_merge_matches_single_fold() {
        let all = findings();
        let whole: Tally = all.iter().collect();
        let left: Tally = all[..3].iter().collect();
        let right: Tally = all[3..].iter().collect();

        assert_eq!(left.clone().merge(right.clone()), whole);
        assert_eq!(right.merge(left), whole);
    }

    #[test]
    fn test_json_shape() {
        let report = aggregate(findings());
        let json: serde_json::Value = serde_json::from_str(&report.to_json(false).unwrap()).unwrap();

        assert_eq!(json["summary"]["total"], 4);
        assert_eq!(json["summary"]["passed"], 2);
        assert_eq!(json["summary"]["failed"], 2);
        assert_eq!(json["findings"].as_array().unwrap().len(), 6);
        assert_eq!(json["findings"][2]["rule"], "error-envelope");
        assert_eq!(json["findings"][2]["sample"], "b");
        assert_eq!(json["findings"][2]["outcome"], "fail");
        assert_eq!(json["findings"][2]["evidence"], "missing error.code");
        assert_eq!(json["findings"][3]["outcome"], "not-applicable");

        let failures: serde_json::Value = serde_json::from_str(&report.to_json(true).unwrap()).unwrap();
        assert_eq!(failures["findings"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_text_report() {
        let text = aggregate(findings()).to_text();

        assert!(text.contains("❌ NONCONFORMANT"));
        assert!(text.contains("error-envelope on b: missing error.code"));
        assert!(text.contains("⚠️ created-location on a"));
        assert!(text.contains("Summary: 2/4 samples passed (50.0%), 1 warnings"));
    }
}
