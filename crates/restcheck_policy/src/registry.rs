//! Rule registry.
//!
//! The registry is assembled once at startup and shared read-only by the
//! evaluator afterwards, so lookups need no synchronization.

use std::collections::HashMap;

use restcheck_core::Sample;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::config::RuleSettings;
use crate::error::{PolicyError, PolicyResult};
use crate::rules::Rule;

/// Catalog of rules keyed by unique id, kept in registration order.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the standard catalog.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for rule in catalog::standard_rules() {
            if let Err(e) = registry.register(rule) {
                warn!("Skipping standard rule: {}", e);
            }
        }
        registry
    }

    /// Standard catalog adjusted by the config's rule settings.
    ///
    /// Unknown ids in `disabled` or `severity` are configuration errors, as are
    /// malformed or duplicate custom rules.
    pub fn from_settings(settings: &RuleSettings) -> PolicyResult<Self> {
        let mut registry = Self::standard();

        for rule in &settings.custom {
            registry.register(rule.clone())?;
        }

        for id in &settings.disabled {
            let rule = registry.get_mut(id)?;
            debug!("Disabling rule {}", id);
            rule.enabled = false;
        }

        for (id, severity) in &settings.severity {
            let rule = registry.get_mut(id)?;
            debug!("Overriding severity of {} to {}", id, severity);
            rule.severity = *severity;
        }

        info!(
            "Rule registry ready: {} rules ({} enabled)",
            registry.len(),
            registry.iter().filter(|r| r.enabled).count()
        );
        Ok(registry)
    }

    /// Add a rule. Fails if the id is taken or the definition is malformed.
    pub fn register(&mut self, rule: Rule) -> PolicyResult<()> {
        rule.validate()?;
        if self.index.contains_key(&rule.id) {
            return Err(PolicyError::DuplicateRule(rule.id));
        }
        debug!("Registering rule: {}", rule.id);
        self.index.insert(rule.id.clone(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// Rules whose method and archetype scope accept the sample.
    pub fn rules_for<'a>(&'a self, sample: &'a Sample) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |rule| rule.applies_to(sample))
    }

    /// Get a rule by id.
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.index.get(id).map(|&idx| &self.rules[idx])
    }

    fn get_mut(&mut self, id: &str) -> PolicyResult<&mut Rule> {
        match self.index.get(id) {
            Some(&idx) => Ok(&mut self.rules[idx]),
            None => Err(PolicyError::UnknownRule(id.to_string())),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleCheck, Severity};
    use restcheck_core::{Archetype, Method, StatusCode};

    #[test]
    fn test_register_duplicate() {
        let mut registry = RuleRegistry::new();
        registry
            .register(Rule::new("status", "Status", RuleCheck::RecommendedStatus))
            .unwrap();

        let err = registry
            .register(Rule::new("status", "Again", RuleCheck::RecommendedStatus))
            .unwrap_err();
        assert!(matches!(err, PolicyError::DuplicateRule(id) if id == "status"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_standard_registry() {
        let registry = RuleRegistry::standard();
        assert_eq!(registry.len(), catalog::standard_rules().len());
        assert!(registry.contains("archetype-method"));
        assert_eq!(registry.get("error-envelope").unwrap().severity, Severity::Error);
    }

    #[test]
    fn test_rules_for_filters_scope() {
        let registry = RuleRegistry::standard();
        let get = Sample::new("s", Method::Get, "/widgets", StatusCode::new(200).unwrap())
            .with_archetype(Archetype::Collection);
        let post = Sample::new("p", Method::Post, "/widgets", StatusCode::new(201).unwrap())
            .with_archetype(Archetype::Collection);

        let get_ids: Vec<&str> = registry.rules_for(&get).map(|r| r.id.as_str()).collect();
        let post_ids: Vec<&str> = registry.rules_for(&post).map(|r| r.id.as_str()).collect();

        assert!(get_ids.contains(&"idempotent-method"));
        assert!(get_ids.contains(&"pagination-link-relations"));
        assert!(!get_ids.contains(&"collection-post-created"));
        assert!(post_ids.contains(&"collection-post-created"));
        assert!(!post_ids.contains(&"idempotent-method"));
    }

    #[test]
    fn test_from_settings() {
        let mut settings = RuleSettings::default();
        settings.disabled.push("status-code-recommended".to_string());
        settings
            .severity
            .insert("created-location".to_string(), Severity::Error);
        settings.custom.push(
            Rule::new(
                "request-id",
                "Request Id",
                RuleCheck::HeaderPresence {
                    header: "X-Request-Id".to_string(),
                    statuses: vec![200],
                },
            )
            .with_severity(Severity::Warning),
        );

        let registry = RuleRegistry::from_settings(&settings).unwrap();

        assert!(!registry.get("status-code-recommended").unwrap().enabled);
        assert_eq!(registry.get("created-location").unwrap().severity, Severity::Error);
        assert!(registry.contains("request-id"));
    }

    #[test]
    fn test_from_settings_unknown_id() {
        let mut settings = RuleSettings::default();
        settings.disabled.push("no-such-rule".to_string());

        let err = RuleRegistry::from_settings(&settings).unwrap_err();
        assert!(matches!(err, PolicyError::UnknownRule(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_from_settings_custom_collides_with_standard() {
        let mut settings = RuleSettings::default();
        settings
            .custom
            .push(Rule::new("error-envelope", "Mine", RuleCheck::RecommendedStatus));

        assert!(matches!(
            RuleRegistry::from_settings(&settings),
            Err(PolicyError::DuplicateRule(_))
        ));
    }
}
