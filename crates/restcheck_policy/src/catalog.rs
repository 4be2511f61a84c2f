//! Guideline tables and the standard rule catalog.
//!
//! The tables here are static data so the guide's recommendations can be
//! audited in one place. Check logic reads them; it never hard-codes them.

use restcheck_core::{Archetype, Method};
use serde::Serialize;

use crate::rules::{Rule, RuleCheck, Severity};

use self::Permission::{Allowed, Forbidden};
use restcheck_core::Archetype::{Collection, Controller, Document, Store};

/// Whether the guide permits a method on an archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Allowed,
    Forbidden,
}

/// One cell of the archetype/method matrix.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MatrixEntry {
    pub archetype: Archetype,
    pub method: Method,
    pub permission: Permission,
    /// Meaning of the method on this archetype
    pub note: &'static str,
}

const fn cell(archetype: Archetype, method: Method, permission: Permission, note: &'static str) -> MatrixEntry {
    MatrixEntry {
        archetype,
        method,
        permission,
        note,
    }
}

/// Methods that have a column in the matrix.
pub const MATRIX_METHODS: [Method; 4] = [Method::Post, Method::Get, Method::Put, Method::Delete];

pub static ARCHETYPE_METHOD_MATRIX: [MatrixEntry; 16] = [
    cell(Document, Method::Post, Forbidden, "documents are created through their collection"),
    cell(Document, Method::Get, Allowed, "read"),
    cell(Document, Method::Put, Allowed, "replace"),
    cell(Document, Method::Delete, Allowed, "remove"),
    cell(Collection, Method::Post, Allowed, "create"),
    cell(Collection, Method::Get, Allowed, "list"),
    cell(Collection, Method::Put, Allowed, "replace the whole collection"),
    cell(Collection, Method::Delete, Allowed, "remove"),
    cell(Store, Method::Post, Forbidden, "stores are client-named; use PUT"),
    cell(Store, Method::Get, Allowed, "list"),
    cell(Store, Method::Put, Allowed, "insert or replace a client-named entry"),
    cell(Store, Method::Delete, Allowed, "remove"),
    cell(Controller, Method::Post, Allowed, "execute"),
    cell(Controller, Method::Get, Allowed, "read"),
    cell(Controller, Method::Put, Forbidden, "controllers are executed, not replaced"),
    cell(Controller, Method::Delete, Forbidden, "controllers are executed, not removed"),
];

/// Column a method is judged by. `None` means the guide has no opinion.
pub fn matrix_column(method: Method) -> Option<Method> {
    match method {
        Method::Get | Method::Head | Method::Options => Some(Method::Get),
        Method::Put | Method::Patch => Some(Method::Put),
        Method::Post => Some(Method::Post),
        Method::Delete => Some(Method::Delete),
        Method::Trace | Method::Connect => None,
    }
}

/// Look up the matrix cell for a method on an archetype.
pub fn method_permission(archetype: Archetype, method: Method) -> Option<&'static MatrixEntry> {
    let column = matrix_column(method)?;
    ARCHETYPE_METHOD_MATRIX
        .iter()
        .find(|e| e.archetype == archetype && e.method == column)
}

/// Canonical error status names and the HTTP code each maps to.
pub static CANONICAL_STATUSES: [(&str, u16); 16] = [
    ("INVALID_ARGUMENT", 400),
    ("FAILED_PRECONDITION", 400),
    ("OUT_OF_RANGE", 400),
    ("UNAUTHENTICATED", 401),
    ("PERMISSION_DENIED", 403),
    ("NOT_FOUND", 404),
    ("ABORTED", 409),
    ("ALREADY_EXISTS", 409),
    ("RESOURCE_EXHAUSTED", 429),
    ("CANCELLED", 499),
    ("DATA_LOSS", 500),
    ("UNKNOWN", 500),
    ("INTERNAL", 500),
    ("UNIMPLEMENTED", 501),
    ("UNAVAILABLE", 503),
    ("DEADLINE_EXCEEDED", 504),
];

pub fn is_canonical_status(name: &str) -> bool {
    CANONICAL_STATUSES.iter().any(|(n, _)| *n == name)
}

/// Canonical names for an HTTP code. Empty when the code has no mapping.
pub fn canonical_statuses_for(code: u16) -> Vec<&'static str> {
    CANONICAL_STATUSES
        .iter()
        .filter(|(_, c)| *c == code)
        .map(|(n, _)| *n)
        .collect()
}

/// Status codes the guide recommends APIs use.
pub static RECOMMENDED_STATUS_CODES: [u16; 27] = [
    200, 201, 202, 204, 206, 301, 303, 304, 307, 308, 400, 401, 403, 404, 405, 406, 409, 410, 412,
    415, 422, 429, 499, 500, 501, 503, 504,
];

/// `Link` relations used for pagination.
pub static PAGINATION_RELATIONS: [&str; 5] = ["first", "prev", "next", "last", "self"];

/// Build the standard rule catalog.
pub fn standard_rules() -> Vec<Rule> {
    vec![
        Rule::new("archetype-method", "Archetype/Method Compatibility", RuleCheck::MethodCompatibility)
            .with_description("Methods must make sense for the resource archetype (e.g. no POST on a document)"),
        Rule::new("error-envelope", "Error Envelope", RuleCheck::ErrorEnvelope)
            .with_description("4xx/5xx bodies carry {error: {code, message, status}} with code equal to the status line"),
        Rule::new("error-status-canonical", "Canonical Error Status", RuleCheck::CanonicalErrorStatus)
            .with_description("error.status uses the canonical name for the HTTP status")
            .with_severity(Severity::Warning),
        Rule::new("error-details-shape", "Error Details Shape", RuleCheck::ErrorDetails)
            .with_description("error.details entries carry code, message and optional target")
            .with_severity(Severity::Warning),
        Rule::new(
            "error-content-type",
            "Error Content Type",
            RuleCheck::ContentType {
                statuses: Vec::new(),
                errors_only: true,
            },
        )
        .with_description("Error responses declare a JSON content type")
        .with_severity(Severity::Warning),
        Rule::new(
            "created-location",
            "Location on Create",
            RuleCheck::HeaderPresence {
                header: "Location".to_string(),
                statuses: vec![201],
            },
        )
        .with_description("201 Created responses point at the new resource with Location")
        .with_severity(Severity::Warning),
        Rule::new(
            "method-not-allowed-allow",
            "Allow on 405",
            RuleCheck::HeaderPresence {
                header: "Allow".to_string(),
                statuses: vec![405],
            },
        )
        .with_description("405 responses list the permitted methods in Allow")
        .with_severity(Severity::Warning),
        Rule::new(
            "unauthorized-www-authenticate",
            "WWW-Authenticate on 401",
            RuleCheck::HeaderPresence {
                header: "WWW-Authenticate".to_string(),
                statuses: vec![401],
            },
        )
        .with_description("401 responses include a WWW-Authenticate challenge")
        .with_severity(Severity::Warning),
        Rule::new(
            "throttled-retry-after",
            "Retry-After when Throttled",
            RuleCheck::HeaderPresence {
                header: "Retry-After".to_string(),
                statuses: vec![429, 503],
            },
        )
        .with_description("429 and 503 responses tell the client when to retry")
        .with_severity(Severity::Warning),
        Rule::new(
            "no-content-empty-body",
            "Empty Body",
            RuleCheck::EmptyBody {
                statuses: vec![204, 304],
            },
        )
        .with_description("204, 304 and HEAD responses carry no body")
        .with_severity(Severity::Warning),
        Rule::new(
            "pagination-link-relations",
            "Pagination Link Relations",
            RuleCheck::LinkRelations {
                allowed: PAGINATION_RELATIONS.iter().map(|r| r.to_string()).collect(),
            },
        )
        .with_description("Link headers use the first/prev/next/last/self relations")
        .with_severity(Severity::Warning)
        .for_methods(&[Method::Get, Method::Head]),
        Rule::new(
            "idempotent-method",
            "Idempotent Method",
            RuleCheck::HeaderAbsence {
                header: "Idempotency-Key".to_string(),
            },
        )
        .with_description("Idempotent methods are safe to retry and need no Idempotency-Key")
        .with_severity(Severity::Warning)
        .for_methods(&[Method::Get, Method::Head, Method::Put, Method::Delete, Method::Options]),
        Rule::new("status-code-recommended", "Recommended Status Code", RuleCheck::RecommendedStatus)
            .with_description("Responses use the status codes the guide recommends")
            .with_severity(Severity::Warning),
        Rule::new(
            "collection-post-created",
            "Create Returns 201",
            RuleCheck::SuccessStatus {
                codes: vec![201, 202],
            },
        )
        .with_description("Successful POST to a collection answers 201 Created or 202 Accepted")
        .with_severity(Severity::Warning)
        .for_methods(&[Method::Post])
        .for_archetypes(&[Archetype::Collection]),
    ]
}
