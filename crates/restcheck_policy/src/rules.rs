//! Rule definitions.
//!
//! A rule pairs applicability (which methods and archetypes it looks at) with
//! a [`RuleCheck`], one of a closed set of data-driven checks. Rules are
//! serializable so custom ones can be declared in the checker config.

use std::fmt;

use restcheck_core::{Archetype, Method, Sample};
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};

/// Rule severity levels.
///
/// Declaration order matters: `Error` is the stricter of the two.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Guidance the API "should" follow; reported, never blocking
    Warning,
    /// Blocks conformance
    #[default]
    Error,
}

impl Severity {
    pub fn blocks(&self) -> bool {
        matches!(self, Severity::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which resource archetypes a rule applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    Any,
    Document,
    Collection,
    Store,
    Controller,
}

impl ResourceScope {
    pub fn matches(&self, archetype: Archetype) -> bool {
        match self {
            ResourceScope::Any => true,
            ResourceScope::Document => archetype == Archetype::Document,
            ResourceScope::Collection => archetype == Archetype::Collection,
            ResourceScope::Store => archetype == Archetype::Store,
            ResourceScope::Controller => archetype == Archetype::Controller,
        }
    }
}

impl From<Archetype> for ResourceScope {
    fn from(archetype: Archetype) -> Self {
        match archetype {
            Archetype::Document => ResourceScope::Document,
            Archetype::Collection => ResourceScope::Collection,
            Archetype::Store => ResourceScope::Store,
            Archetype::Controller => ResourceScope::Controller,
        }
    }
}

/// The closed set of checks a rule can run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCheck {
    /// Archetype/method compatibility matrix
    MethodCompatibility,
    /// `{error: {code, message, status}}` on 4xx/5xx
    ErrorEnvelope,
    /// `error.status` is a canonical name matching the HTTP code
    CanonicalErrorStatus,
    /// `error.details` items carry `code`, `message` and optional `target`
    ErrorDetails,
    /// Response declares a JSON content type
    ContentType {
        #[serde(default)]
        statuses: Vec<u16>,
        #[serde(default)]
        errors_only: bool,
    },
    /// Response header required for the listed statuses
    HeaderPresence { header: String, statuses: Vec<u16> },
    /// Request header that should not be sent
    HeaderAbsence { header: String },
    /// No body for the listed statuses or for `HEAD`
    EmptyBody { statuses: Vec<u16> },
    /// Every `Link` relation is in the allowed set
    LinkRelations {
        #[serde(default = "default_link_relations")]
        allowed: Vec<String>,
    },
    /// Status is one the guide recommends
    RecommendedStatus,
    /// 2xx responses use one of the listed codes
    SuccessStatus { codes: Vec<u16> },
}

fn default_link_relations() -> Vec<String> {
    crate::catalog::PAGINATION_RELATIONS
        .iter()
        .map(|r| r.to_string())
        .collect()
}

impl RuleCheck {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleCheck::MethodCompatibility => "method_compatibility",
            RuleCheck::ErrorEnvelope => "error_envelope",
            RuleCheck::CanonicalErrorStatus => "canonical_error_status",
            RuleCheck::ErrorDetails => "error_details",
            RuleCheck::ContentType { .. } => "content_type",
            RuleCheck::HeaderPresence { .. } => "header_presence",
            RuleCheck::HeaderAbsence { .. } => "header_absence",
            RuleCheck::EmptyBody { .. } => "empty_body",
            RuleCheck::LinkRelations { .. } => "link_relations",
            RuleCheck::RecommendedStatus => "recommended_status",
            RuleCheck::SuccessStatus { .. } => "success_status",
        }
    }

    fn validate(&self) -> Result<(), String> {
        let check_statuses = |statuses: &[u16]| -> Result<(), String> {
            match statuses.iter().find(|s| !(100..=599).contains(*s)) {
                Some(bad) => Err(format!("status {} is outside 100..=599", bad)),
                None => Ok(()),
            }
        };

        match self {
            RuleCheck::ContentType { statuses, errors_only } => {
                if statuses.is_empty() && !errors_only {
                    return Err("content_type needs statuses or errors_only".to_string());
                }
                check_statuses(statuses)
            }
            RuleCheck::HeaderPresence { header, statuses } => {
                if header.trim().is_empty() {
                    return Err("header_presence needs a header name".to_string());
                }
                if statuses.is_empty() {
                    return Err("header_presence needs at least one status".to_string());
                }
                check_statuses(statuses)
            }
            RuleCheck::HeaderAbsence { header } if header.trim().is_empty() => {
                Err("header_absence needs a header name".to_string())
            }
            RuleCheck::EmptyBody { statuses } => check_statuses(statuses),
            RuleCheck::LinkRelations { allowed } if allowed.is_empty() => {
                Err("link_relations needs at least one allowed relation".to_string())
            }
            RuleCheck::SuccessStatus { codes } => {
                if codes.is_empty() {
                    return Err("success_status needs at least one code".to_string());
                }
                match codes.iter().find(|c| !(200..=299).contains(*c)) {
                    Some(bad) => Err(format!("success_status code {} is not 2xx", bad)),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

/// A checkable rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    /// Archetypes this rule looks at
    #[serde(default = "default_scope")]
    pub archetypes: Vec<ResourceScope>,
    /// Methods this rule looks at (empty = all)
    #[serde(default)]
    pub methods: Vec<Method>,
    pub check: RuleCheck,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_scope() -> Vec<ResourceScope> {
    vec![ResourceScope::Any]
}

fn default_true() -> bool {
    true
}

impl Rule {
    /// Create an error-severity rule applying to every sample.
    pub fn new(id: impl Into<String>, name: impl Into<String>, check: RuleCheck) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            severity: Severity::Error,
            archetypes: default_scope(),
            methods: Vec::new(),
            check,
            enabled: true,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn for_archetypes(mut self, archetypes: &[Archetype]) -> Self {
        self.archetypes = archetypes.iter().copied().map(ResourceScope::from).collect();
        self
    }

    pub fn for_methods(mut self, methods: &[Method]) -> Self {
        self.methods = methods.to_vec();
        self
    }

    /// Whether the rule's method/archetype scope accepts the sample.
    pub fn applies_to(&self, sample: &Sample) -> bool {
        self.enabled
            && (self.methods.is_empty() || self.methods.contains(&sample.method))
            && self.archetypes.iter().any(|scope| scope.matches(sample.archetype))
    }

    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Reject definitions that could never evaluate meaningfully.
    pub fn validate(&self) -> PolicyResult<()> {
        let invalid = |message: String| PolicyError::InvalidRule {
            rule: self.id.clone(),
            message,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("rule id cannot be empty".to_string()));
        }
        if self.id == crate::report::INGESTION_RULE_ID {
            return Err(invalid(format!("'{}' is reserved", self.id)));
        }
        if self.archetypes.is_empty() {
            return Err(invalid("rule must apply to at least one archetype".to_string()));
        }
        self.check.validate().map_err(invalid)
    }
}
