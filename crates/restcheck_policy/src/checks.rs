//! Check predicates.
//!
//! Each [`RuleCheck`] variant is a pure function of the sample. Malformed input
//! never escapes as an error: it becomes a failing verdict with evidence.

use restcheck_core::{is_json_media_type, Method, Sample};

use crate::catalog::{self, Permission};
use crate::envelope;
use crate::rules::RuleCheck;

/// Outcome of running one check against one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
    NotApplicable,
}

impl Verdict {
    fn fail(evidence: impl Into<String>) -> Self {
        Verdict::Fail(evidence.into())
    }
}

impl RuleCheck {
    /// Run the check against a sample.
    pub fn verdict(&self, sample: &Sample) -> Verdict {
        match self {
            RuleCheck::MethodCompatibility => method_compatibility(sample),
            RuleCheck::ErrorEnvelope => error_envelope(sample),
            RuleCheck::CanonicalErrorStatus => canonical_error_status(sample),
            RuleCheck::ErrorDetails => error_details(sample),
            RuleCheck::ContentType { statuses, errors_only } => {
                content_type(sample, statuses, *errors_only)
            }
            RuleCheck::HeaderPresence { header, statuses } => header_presence(sample, header, statuses),
            RuleCheck::HeaderAbsence { header } => header_absence(sample, header),
            RuleCheck::EmptyBody { statuses } => empty_body(sample, statuses),
            RuleCheck::LinkRelations { allowed } => link_relations(sample, allowed),
            RuleCheck::RecommendedStatus => recommended_status(sample),
            RuleCheck::SuccessStatus { codes } => success_status(sample, codes),
        }
    }
}

fn method_compatibility(sample: &Sample) -> Verdict {
    match catalog::method_permission(sample.archetype, sample.method) {
        Some(entry) if entry.permission == Permission::Forbidden => Verdict::fail(format!(
            "{} not permitted on {} resource",
            sample.method, sample.archetype
        )),
        Some(_) => Verdict::Pass,
        None => Verdict::NotApplicable,
    }
}

fn error_envelope(sample: &Sample) -> Verdict {
    if !sample.status.is_error() {
        return Verdict::NotApplicable;
    }

    match envelope::parse_envelope(&sample.body) {
        Ok(env) if env.code != i64::from(sample.status.as_u16()) => Verdict::fail(format!(
            "error.code {} does not match status line {}",
            env.code, sample.status
        )),
        Ok(_) => Verdict::Pass,
        Err(problem) => Verdict::fail(problem.evidence()),
    }
}

fn canonical_error_status(sample: &Sample) -> Verdict {
    if !sample.status.is_error() {
        return Verdict::NotApplicable;
    }
    let Ok(env) = envelope::parse_envelope(&sample.body) else {
        return Verdict::NotApplicable;
    };

    if !catalog::is_canonical_status(&env.status) {
        return Verdict::fail(format!(
            "error.status '{}' is not a canonical status name",
            env.status
        ));
    }

    let expected = catalog::canonical_statuses_for(sample.status.as_u16());
    if expected.is_empty() || expected.contains(&env.status.as_str()) {
        Verdict::Pass
    } else {
        Verdict::fail(format!(
            "error.status '{}' does not correspond to HTTP {} (expected {})",
            env.status,
            sample.status,
            expected.join(" or ")
        ))
    }
}

fn error_details(sample: &Sample) -> Verdict {
    if !sample.status.is_error() {
        return Verdict::NotApplicable;
    }
    let details = match envelope::parse_envelope(&sample.body) {
        Ok(env) => env.details,
        Err(_) => return Verdict::NotApplicable,
    };

    match details {
        None => Verdict::NotApplicable,
        Some(details) => {
            let problems = envelope::detail_problems(&details);
            if problems.is_empty() {
                Verdict::Pass
            } else {
                Verdict::fail(problems.join("; "))
            }
        }
    }
}

fn content_type(sample: &Sample, statuses: &[u16], errors_only: bool) -> Verdict {
    let code = sample.status.as_u16();
    let in_scope = statuses.contains(&code) || (errors_only && sample.status.is_error());
    if !in_scope || sample.body.is_empty() {
        return Verdict::NotApplicable;
    }

    match sample.response_headers.media_type() {
        None => Verdict::fail("missing Content-Type header"),
        Some(media) if is_json_media_type(&media) => Verdict::Pass,
        Some(media) => Verdict::fail(format!("Content-Type '{}' is not a JSON media type", media)),
    }
}

fn header_presence(sample: &Sample, header: &str, statuses: &[u16]) -> Verdict {
    if !statuses.contains(&sample.status.as_u16()) {
        return Verdict::NotApplicable;
    }
    match sample.response_headers.get(header) {
        Some(value) if !value.trim().is_empty() => Verdict::Pass,
        Some(_) => Verdict::fail(format!("{} header is empty", header)),
        None => Verdict::fail(format!("expected {} header, found none", header)),
    }
}

fn header_absence(sample: &Sample, header: &str) -> Verdict {
    if sample.request_headers.contains(header) {
        let qualifier = if sample.method.is_idempotent() { "idempotent " } else { "" };
        Verdict::fail(format!(
            "{} header is redundant on {}{} request",
            header, qualifier, sample.method
        ))
    } else {
        Verdict::Pass
    }
}

fn empty_body(sample: &Sample, statuses: &[u16]) -> Verdict {
    let in_scope = sample.method == Method::Head || statuses.contains(&sample.status.as_u16());
    if !in_scope {
        return Verdict::NotApplicable;
    }
    if sample.body.is_empty() {
        Verdict::Pass
    } else {
        Verdict::fail(format!(
            "{} response to {} carries a body",
            sample.status, sample.method
        ))
    }
}

fn link_relations(sample: &Sample, allowed: &[String]) -> Verdict {
    let Some(header) = sample.response_headers.get("link") else {
        return Verdict::NotApplicable;
    };

    let mut problems = Vec::new();
    for link in split_links(header) {
        let rels = link_rels(link);
        if rels.is_empty() {
            problems.push(format!("link '{}' has no rel parameter", link.trim()));
        }
        for rel in rels {
            if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&rel)) {
                problems.push(format!(
                    "Link relation '{}' is not one of {}",
                    rel,
                    allowed.join(", ")
                ));
            }
        }
    }

    if problems.is_empty() {
        Verdict::Pass
    } else {
        Verdict::fail(problems.join("; "))
    }
}

/// Split a `Link` header into link-values, ignoring commas inside `<...>` and quotes.
fn split_links(header: &str) -> Vec<&str> {
    let mut links = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;

    for (idx, ch) in header.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '<' if !quoted => depth += 1,
            '>' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                links.push(&header[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    links.push(&header[start..]);
    links.into_iter().filter(|l| !l.trim().is_empty()).collect()
}

/// Relation types of one link-value. `rel="next last"` yields two.
fn link_rels(link: &str) -> Vec<String> {
    let params = match link.find('>') {
        Some(end) => &link[end + 1..],
        None => link,
    };

    params
        .split(';')
        .filter_map(|param| {
            let (name, value) = param.split_once('=')?;
            if name.trim().eq_ignore_ascii_case("rel") {
                Some(value.trim().trim_matches('"').to_string())
            } else {
                None
            }
        })
        .flat_map(|value| {
            value
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn recommended_status(sample: &Sample) -> Verdict {
    if catalog::RECOMMENDED_STATUS_CODES.contains(&sample.status.as_u16()) {
        Verdict::Pass
    } else {
        Verdict::fail(format!(
            "status {} is not among the recommended status codes",
            sample.status
        ))
    }
}

fn success_status(sample: &Sample, codes: &[u16]) -> Verdict {
    if !sample.status.is_success() {
        return Verdict::NotApplicable;
    }
    if codes.contains(&sample.status.as_u16()) {
        Verdict::Pass
    } else {
        let expected: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        Verdict::fail(format!(
            "{} {} returned {}; expected {}",
            sample.method,
            sample.path,
            sample.status,
            expected.join(" or ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restcheck_core::{Archetype, Body, StatusCode};
    use serde_json::json;

    fn sample(method: Method, path: &str, status: u16, archetype: Archetype) -> Sample {
        Sample::new("t", method, path, StatusCode::new(status).unwrap()).with_archetype(archetype)
    }

    #[test]
    fn test_post_on_document_forbidden() {
        let s = sample(Method::Post, "/widgets/42", 201, Archetype::Document);
        assert_eq!(
            RuleCheck::MethodCompatibility.verdict(&s),
            Verdict::Fail("POST not permitted on document resource".to_string())
        );
    }

    #[test]
    fn test_trace_has_no_matrix_opinion() {
        let s = sample(Method::Trace, "/widgets", 200, Archetype::Collection);
        assert_eq!(RuleCheck::MethodCompatibility.verdict(&s), Verdict::NotApplicable);
    }

    #[test]
    fn test_envelope_code_mismatch() {
        let body = json!({"error": {"code": 400, "message": "bad", "status": "INVALID_ARGUMENT"}});
        let ok = sample(Method::Get, "/w", 400, Archetype::Collection).with_json(body.clone());
        let mismatched = sample(Method::Get, "/w", 404, Archetype::Collection).with_json(body);

        assert_eq!(RuleCheck::ErrorEnvelope.verdict(&ok), Verdict::Pass);
        assert_eq!(
            RuleCheck::ErrorEnvelope.verdict(&mismatched),
            Verdict::Fail("error.code 400 does not match status line 404".to_string())
        );
    }

    #[test]
    fn test_envelope_not_applicable_below_400() {
        let s = sample(Method::Get, "/w", 302, Archetype::Collection);
        assert_eq!(RuleCheck::ErrorEnvelope.verdict(&s), Verdict::NotApplicable);
    }

    #[test]
    fn test_envelope_non_json_body() {
        let s = sample(Method::Get, "/w", 500, Archetype::Collection)
            .with_response_header("Content-Type", "text/html")
            .with_body(Body::Raw(b"<h1>oops</h1>".to_vec()));

        match RuleCheck::ErrorEnvelope.verdict(&s) {
            Verdict::Fail(evidence) => assert!(evidence.contains("not valid JSON")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_canonical_status() {
        let wrong = sample(Method::Get, "/w", 404, Archetype::Collection)
            .with_json(json!({"error": {"code": 404, "message": "m", "status": "INVALID_ARGUMENT"}}));
        let unknown = sample(Method::Get, "/w", 404, Archetype::Collection)
            .with_json(json!({"error": {"code": 404, "message": "m", "status": "MISSING"}}));
        let unmapped = sample(Method::Get, "/w", 422, Archetype::Collection)
            .with_json(json!({"error": {"code": 422, "message": "m", "status": "INVALID_ARGUMENT"}}));

        assert!(matches!(RuleCheck::CanonicalErrorStatus.verdict(&wrong), Verdict::Fail(e) if e.contains("expected NOT_FOUND")));
        assert!(matches!(RuleCheck::CanonicalErrorStatus.verdict(&unknown), Verdict::Fail(e) if e.contains("not a canonical")));
        assert_eq!(RuleCheck::CanonicalErrorStatus.verdict(&unmapped), Verdict::Pass);
    }

    #[test]
    fn test_error_details() {
        let without = sample(Method::Get, "/w", 400, Archetype::Collection)
            .with_json(json!({"error": {"code": 400, "message": "m", "status": "INVALID_ARGUMENT"}}));
        let broken = sample(Method::Get, "/w", 400, Archetype::Collection).with_json(
            json!({"error": {"code": 400, "message": "m", "status": "INVALID_ARGUMENT", "details": [{"code": "x"}]}}),
        );

        assert_eq!(RuleCheck::ErrorDetails.verdict(&without), Verdict::NotApplicable);
        assert_eq!(
            RuleCheck::ErrorDetails.verdict(&broken),
            Verdict::Fail("error.details[0] missing message".to_string())
        );
    }

    #[test]
    fn test_content_type() {
        let check = RuleCheck::ContentType {
            statuses: vec![],
            errors_only: true,
        };
        let html = sample(Method::Get, "/w", 500, Archetype::Collection)
            .with_response_header("Content-Type", "text/html; charset=utf-8")
            .with_body(Body::Raw(b"x".to_vec()));
        let problem = sample(Method::Get, "/w", 500, Archetype::Collection)
            .with_response_header("Content-Type", "application/problem+json")
            .with_body(Body::Raw(b"{}".to_vec()));

        assert_eq!(
            check.verdict(&html),
            Verdict::Fail("Content-Type 'text/html' is not a JSON media type".to_string())
        );
        assert_eq!(check.verdict(&problem), Verdict::Pass);
    }

    #[test]
    fn test_header_presence() {
        let check = RuleCheck::HeaderPresence {
            header: "Location".to_string(),
            statuses: vec![201],
        };
        let with = sample(Method::Post, "/w", 201, Archetype::Collection).with_response_header("location", "/w/1");
        let without = sample(Method::Post, "/w", 201, Archetype::Collection);
        let other = sample(Method::Post, "/w", 202, Archetype::Collection);

        assert_eq!(check.verdict(&with), Verdict::Pass);
        assert_eq!(
            check.verdict(&without),
            Verdict::Fail("expected Location header, found none".to_string())
        );
        assert_eq!(check.verdict(&other), Verdict::NotApplicable);
    }

    #[test]
    fn test_header_absence() {
        let check = RuleCheck::HeaderAbsence {
            header: "Idempotency-Key".to_string(),
        };
        let keyed = sample(Method::Put, "/w/1", 200, Archetype::Document).with_request_header("Idempotency-Key", "abc");

        assert_eq!(
            check.verdict(&keyed),
            Verdict::Fail("Idempotency-Key header is redundant on idempotent PUT request".to_string())
        );
        assert_eq!(check.verdict(&sample(Method::Put, "/w/1", 200, Archetype::Document)), Verdict::Pass);
    }

    #[test]
    fn test_empty_body() {
        let check = RuleCheck::EmptyBody { statuses: vec![204] };
        let with_body = sample(Method::Delete, "/w/1", 204, Archetype::Document).with_body(Body::Raw(b"x".to_vec()));
        let head = sample(Method::Head, "/w", 200, Archetype::Collection);

        assert_eq!(
            check.verdict(&with_body),
            Verdict::Fail("204 response to DELETE carries a body".to_string())
        );
        assert_eq!(check.verdict(&head), Verdict::Pass);
        assert_eq!(
            check.verdict(&sample(Method::Get, "/w", 200, Archetype::Collection)),
            Verdict::NotApplicable
        );
    }

    #[test]
    fn test_link_relations() {
        let check = RuleCheck::LinkRelations {
            allowed: catalog::PAGINATION_RELATIONS.iter().map(|r| r.to_string()).collect(),
        };
        let good = sample(Method::Get, "/w", 200, Archetype::Collection).with_response_header(
            "Link",
            "<https://api.example.com/w?page=2&sort=a,b>; rel=\"next\", <https://api.example.com/w?page=9>; rel=last",
        );
        let bad = sample(Method::Get, "/w", 200, Archetype::Collection)
            .with_response_header("Link", "</w?page=2>; rel=\"next following\", </w>");

        assert_eq!(check.verdict(&good), Verdict::Pass);
        match check.verdict(&bad) {
            Verdict::Fail(evidence) => {
                assert!(evidence.contains("'following'"));
                assert!(evidence.contains("has no rel parameter"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(
            check.verdict(&sample(Method::Get, "/w", 200, Archetype::Collection)),
            Verdict::NotApplicable
        );
    }

    #[test]
    fn test_recommended_status() {
        assert_eq!(
            RuleCheck::RecommendedStatus.verdict(&sample(Method::Get, "/w", 418, Archetype::Collection)),
            Verdict::Fail("status 418 is not among the recommended status codes".to_string())
        );
    }

    #[test]
    fn test_success_status() {
        let check = RuleCheck::SuccessStatus { codes: vec![201, 202] };
        assert_eq!(
            check.verdict(&sample(Method::Post, "/widgets", 200, Archetype::Collection)),
            Verdict::Fail("POST /widgets returned 200; expected 201 or 202".to_string())
        );
        assert_eq!(
            check.verdict(&sample(Method::Post, "/widgets", 409, Archetype::Collection)),
            Verdict::NotApplicable
        );
    }
}
