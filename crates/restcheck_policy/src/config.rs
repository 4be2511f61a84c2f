//! Checker configuration file.
//!
//! ```yaml
//! workers: 4
//! routes:
//!   - pattern: /carts/*/checkout
//!     archetype: controller
//! rules:
//!   disabled: [status-code-recommended]
//!   severity:
//!     created-location: error
//!   custom:
//!     - id: request-id
//!       severity: warning
//!       check: {kind: header_presence, header: X-Request-Id, statuses: [200]}
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use restcheck_core::{ArchetypeResolver, RouteRule};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::EvaluatorConfig;
use crate::error::{PolicyError, PolicyResult};
use crate::registry::RuleRegistry;
use crate::rules::{Rule, Severity};

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_FILE: &str = "restcheck.yaml";

/// Adjustments to the standard rule catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSettings {
    /// Rule ids to switch off
    #[serde(default)]
    pub disabled: Vec<String>,
    /// Severity overrides by rule id
    #[serde(default)]
    pub severity: BTreeMap<String, Severity>,
    /// Extra rules built from the check primitives
    #[serde(default)]
    pub custom: Vec<Rule>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckerConfig {
    /// Evaluation workers; defaults to available parallelism
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub routes: Vec<RouteRule>,
    #[serde(default)]
    pub rules: RuleSettings,
}

impl CheckerConfig {
    pub fn from_file(path: &Path) -> PolicyResult<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load `restcheck.yaml` from `dir` if present, defaults otherwise.
    pub fn discover(dir: &Path) -> PolicyResult<Self> {
        let path = dir.join(DEFAULT_FILE);
        if path.is_file() {
            Self::from_file(&path)
        } else {
            debug!("No {} in {}, using defaults", DEFAULT_FILE, dir.display());
            Ok(Self::default())
        }
    }

    pub fn from_yaml(yaml: &str) -> PolicyResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> PolicyResult<String> {
        serde_yaml::to_string(self).map_err(PolicyError::from)
    }

    pub fn validate(&self) -> PolicyResult<()> {
        if self.workers == Some(0) {
            return Err(PolicyError::InvalidConfiguration(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn resolver(&self) -> PolicyResult<ArchetypeResolver> {
        Ok(ArchetypeResolver::with_routes(&self.routes)?)
    }

    pub fn registry(&self) -> PolicyResult<RuleRegistry> {
        RuleRegistry::from_settings(&self.rules)
    }

    pub fn evaluator_config(&self) -> EvaluatorConfig {
        match self.workers {
            Some(workers) => EvaluatorConfig::default().with_workers(workers),
            None => EvaluatorConfig::default(),
        }
    }
}
