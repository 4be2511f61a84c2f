//! Resource archetype resolution.
//!
//! A sample's archetype comes from, in order: the capture record itself, the
//! first configured route pattern matching the path, or the shape of the path.

use std::sync::OnceLock;

use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::model::Archetype;

/// A configured `pattern -> archetype` mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteRule {
    /// Glob over the request path, e.g. `/carts/*/checkout`
    pub pattern: String,
    pub archetype: Archetype,
}

impl RouteRule {
    pub fn new(pattern: impl Into<String>, archetype: Archetype) -> Self {
        Self {
            pattern: pattern.into(),
            archetype,
        }
    }
}

/// Resolves archetypes for request paths.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeResolver {
    routes: Vec<(Pattern, Archetype)>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn identifier_segment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:\d+|[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}|[0-9a-fA-F]{24,}|\{[^}]+\}|:[A-Za-z_]\w*)$",
        )
        .expect("identifier pattern is valid")
    })
}

impl ArchetypeResolver {
    /// Resolver using only the path-shape heuristic.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile configured routes. Patterns are matched in declaration order.
    pub fn with_routes(routes: &[RouteRule]) -> CoreResult<Self> {
        let mut compiled = Vec::with_capacity(routes.len());
        for route in routes {
            let pattern = Pattern::new(&route.pattern).map_err(|e| CoreError::InvalidRoutePattern {
                pattern: route.pattern.clone(),
                message: e.to_string(),
            })?;
            compiled.push((pattern, route.archetype));
        }
        Ok(Self { routes: compiled })
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Resolve the archetype for a path, honouring an explicit declaration.
    pub fn resolve(&self, path: &str, declared: Option<Archetype>) -> Archetype {
        if let Some(archetype) = declared {
            return archetype;
        }

        let trimmed = normalize(path);
        if let Some((pattern, archetype)) = self
            .routes
            .iter()
            .find(|(pattern, _)| pattern.matches_with(&trimmed, MATCH_OPTIONS))
        {
            debug!("Path {} matched route {}", path, pattern.as_str());
            return *archetype;
        }

        infer_from_shape(&trimmed)
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `/widgets` is a collection, `/widgets/42` a document, `/` the API root document.
fn infer_from_shape(path: &str) -> Archetype {
    match path.rsplit('/').find(|s| !s.is_empty()) {
        None => Archetype::Document,
        Some(last) if identifier_segment().is_match(last) => Archetype::Document,
        Some(_) => Archetype::Collection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_heuristic() {
        let resolver = ArchetypeResolver::new();

        assert_eq!(resolver.resolve("/widgets", None), Archetype::Collection);
        assert_eq!(resolver.resolve("/widgets/", None), Archetype::Collection);
        assert_eq!(resolver.resolve("/widgets/42", None), Archetype::Document);
        assert_eq!(
            resolver.resolve("/users/3f2504e0-4f89-11d3-9a0c-0305e82c3301", None),
            Archetype::Document
        );
        assert_eq!(resolver.resolve("/widgets/{id}", None), Archetype::Document);
        assert_eq!(resolver.resolve("/", None), Archetype::Document);
    }

    #[test]
    fn test_declared_archetype_wins() {
        let resolver =
            ArchetypeResolver::with_routes(&[RouteRule::new("/widgets", Archetype::Store)]).unwrap();

        assert_eq!(
            resolver.resolve("/widgets", Some(Archetype::Controller)),
            Archetype::Controller
        );
    }

    #[test]
    fn test_routes_in_order() {
        let resolver = ArchetypeResolver::with_routes(&[
            RouteRule::new("/carts/*/checkout", Archetype::Controller),
            RouteRule::new("/users/*/favorites", Archetype::Store),
            RouteRule::new("/carts/*", Archetype::Document),
        ])
        .unwrap();

        assert_eq!(resolver.route_count(), 3);
        assert_eq!(resolver.resolve("/carts/7/checkout", None), Archetype::Controller);
        assert_eq!(resolver.resolve("/users/1/favorites/", None), Archetype::Store);
        assert_eq!(resolver.resolve("/carts/7", None), Archetype::Document);
        assert_eq!(resolver.resolve("/carts", None), Archetype::Collection);
    }

    #[test]
    fn test_invalid_pattern() {
        let result = ArchetypeResolver::with_routes(&[RouteRule::new("/a/[", Archetype::Store)]);
        assert!(matches!(result, Err(CoreError::InvalidRoutePattern { .. })));
    }
}
