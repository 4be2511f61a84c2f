//! Error envelope validation.
//!
//! The guide's error format:
//!
//! ```json
//! {"error": {"code": 404, "message": "widget 42 not found", "status": "NOT_FOUND",
//!            "details": [{"code": "missing", "target": "id", "message": "..."}]}}
//! ```

use restcheck_core::Body;
use serde_json::Value;

/// The required envelope fields, extracted from a well-formed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub code: i64,
    pub message: String,
    pub status: String,
    pub details: Option<Value>,
}

/// Why a body is not a valid envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeProblem {
    /// The body could not be read as JSON at all
    Unparseable(String),
    /// The body is JSON but fields are missing or mistyped
    Fields(Vec<String>),
}

impl EnvelopeProblem {
    pub fn evidence(&self) -> String {
        match self {
            EnvelopeProblem::Unparseable(reason) => reason.clone(),
            EnvelopeProblem::Fields(problems) => problems.join("; "),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse and shape-check an error body.
pub fn parse_envelope(body: &Body) -> Result<ErrorEnvelope, EnvelopeProblem> {
    let value = body.to_json().map_err(EnvelopeProblem::Unparseable)?;

    let error = match value.get("error") {
        Some(Value::Object(error)) => error,
        Some(other) => {
            return Err(EnvelopeProblem::Fields(vec![format!(
                "error must be an object, found {}",
                json_type(other)
            )]))
        }
        None => {
            return Err(EnvelopeProblem::Fields(vec![
                "error envelope missing top-level 'error' object".to_string(),
            ]))
        }
    };

    let mut problems = Vec::new();

    let code = match error.get("code") {
        Some(Value::Number(n)) if n.as_i64().is_some() => n.as_i64(),
        Some(other) => {
            problems.push(format!("error.code must be an integer, found {}", describe(other)));
            None
        }
        None => {
            problems.push("missing error.code".to_string());
            None
        }
    };

    let mut string_field = |name: &str| match error.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            problems.push(format!("error.{} must be a string, found {}", name, json_type(other)));
            None
        }
        None => {
            problems.push(format!("missing error.{}", name));
            None
        }
    };

    let message = string_field("message");
    let status = string_field("status");

    match (code, message, status) {
        (Some(code), Some(message), Some(status)) => Ok(ErrorEnvelope {
            code,
            message,
            status,
            details: error.get("details").cloned(),
        }),
        _ => Err(EnvelopeProblem::Fields(problems)),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Number(n) => format!("number {}", n),
        other => json_type(other).to_string(),
    }
}

/// Check `error.details`. Returns the problems found, empty when valid.
pub fn detail_problems(details: &Value) -> Vec<String> {
    let items = match details {
        Value::Array(items) => items,
        other => return vec![format!("error.details must be an array, found {}", json_type(other))],
    };

    let mut problems = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        let Value::Object(fields) = item else {
            problems.push(format!("error.details[{}] must be an object, found {}", idx, json_type(item)));
            continue;
        };
        for required in ["code", "message"] {
            match fields.get(required) {
                Some(Value::String(_)) => {}
                Some(other) => problems.push(format!(
                    "error.details[{}].{} must be a string, found {}",
                    idx,
                    required,
                    json_type(other)
                )),
                None => problems.push(format!("error.details[{}] missing {}", idx, required)),
            }
        }
        match fields.get("target") {
            None | Some(Value::String(_)) => {}
            Some(other) => problems.push(format!(
                "error.details[{}].target must be a string, found {}",
                idx,
                json_type(other)
            )),
        }
    }
    problems
}
