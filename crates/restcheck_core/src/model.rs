//! HTTP exchange model.
//!
//! A [`Sample`] is one observed request/response pair. Samples are built once
//! during ingestion and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// HTTP request method.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Trace,
    Connect,
}

impl Method {
    pub const ALL: [Method; 9] = [
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Options,
        Method::Trace,
        Method::Connect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }

    /// Whether repeating the request leaves the resource in the same state.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Self::Post | Self::Patch | Self::Connect)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == upper)
            .ok_or_else(|| CoreError::InvalidSample(format!("unknown HTTP method '{}'", s)))
    }
}

/// Classification of what a URI addresses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// A single resource instance, e.g. `/widgets/42`
    Document,
    /// A server-managed directory of resources, e.g. `/widgets`
    Collection,
    /// A client-managed resource repository
    Store,
    /// An executable function, e.g. `/carts/7/checkout`
    Controller,
}

impl Archetype {
    pub const ALL: [Archetype; 4] = [
        Archetype::Document,
        Archetype::Collection,
        Archetype::Store,
        Archetype::Controller,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Collection => "collection",
            Self::Store => "store",
            Self::Controller => "controller",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Archetype {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "collection" => Ok(Self::Collection),
            "store" => Ok(Self::Store),
            "controller" => Ok(Self::Controller),
            other => Err(CoreError::InvalidSample(format!("unknown resource archetype '{}'", other))),
        }
    }
}

/// Header map with case-insensitive names.
///
/// Names are stored lowercased. Repeated headers are joined with `", "` the
/// way an HTTP/1.1 intermediary would fold them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Headers {
    entries: BTreeMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let key = name.as_ref().trim().to_ascii_lowercase();
        let value = value.into();
        self.entries
            .entry(key)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Media type of the `Content-Type` header, lowercased and without parameters.
    pub fn media_type(&self) -> Option<String> {
        self.get("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Whether the `Content-Type` header declares a JSON media type.
    pub fn declares_json(&self) -> bool {
        self.media_type().is_some_and(|m| is_json_media_type(&m))
    }
}

impl From<BTreeMap<String, String>> for Headers {
    fn from(map: BTreeMap<String, String>) -> Self {
        let mut headers = Headers::new();
        for (name, value) in map {
            headers.insert(name, value);
        }
        headers
    }
}

impl From<Headers> for BTreeMap<String, String> {
    fn from(headers: Headers) -> Self {
        headers.entries
    }
}

/// `application/json`, `application/problem+json`, `text/json`, ...
pub fn is_json_media_type(media: &str) -> bool {
    let subtype = media.rsplit('/').next().unwrap_or_default();
    subtype == "json" || subtype.ends_with("+json")
}

/// Response body as captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Raw(Vec<u8>),
}

impl Body {
    /// Build a body from response text, parsing it when the headers say JSON.
    pub fn from_text(text: &str, headers: &Headers) -> Self {
        if text.is_empty() {
            return Body::Empty;
        }
        if headers.declares_json() {
            if let Ok(value) = serde_json::from_str(text) {
                return Body::Json(value);
            }
        }
        Body::Raw(text.as_bytes().to_vec())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Raw(bytes) => bytes.is_empty(),
            Body::Json(_) => false,
        }
    }

    /// Parse the body as JSON, whatever form it was captured in.
    pub fn to_json(&self) -> Result<serde_json::Value, String> {
        match self {
            Body::Json(value) => Ok(value.clone()),
            Body::Empty => Err("response body is empty".to_string()),
            Body::Raw(bytes) => serde_json::from_slice(bytes)
                .map_err(|e| format!("response body is not valid JSON: {}", e)),
        }
    }
}

/// HTTP status code, guaranteed to be within `100..=599`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StatusCode(u16);

impl StatusCode {
    pub fn new(code: u16) -> Result<Self, CoreError> {
        if (100..=599).contains(&code) {
            Ok(Self(code))
        } else {
            Err(CoreError::InvalidSample(format!(
                "status code {} is outside 100..=599",
                code
            )))
        }
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// First digit of the code: 1 informational ... 5 server error.
    pub fn class(&self) -> u16 {
        self.0 / 100
    }

    pub fn is_success(&self) -> bool {
        self.class() == 2
    }

    pub fn is_error(&self) -> bool {
        self.0 >= 400
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One observed request/response exchange.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub id: String,
    pub method: Method,
    pub path: String,
    pub archetype: Archetype,
    pub request_headers: Headers,
    pub status: StatusCode,
    pub response_headers: Headers,
    pub body: Body,
}

impl Sample {
    /// Start building a sample. The archetype defaults to collection until set.
    pub fn new(id: impl Into<String>, method: Method, path: impl Into<String>, status: StatusCode) -> Self {
        Self {
            id: id.into(),
            method,
            path: path.into(),
            archetype: Archetype::Collection,
            request_headers: Headers::new(),
            status,
            response_headers: Headers::new(),
            body: Body::Empty,
        }
    }

    pub fn with_archetype(mut self, archetype: Archetype) -> Self {
        self.archetype = archetype;
        self
    }

    pub fn with_request_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.request_headers.insert(name, value);
        self
    }

    pub fn with_response_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.response_headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Attach a JSON body and the matching content type.
    pub fn with_json(self, value: serde_json::Value) -> Self {
        self.with_response_header("Content-Type", "application/json")
            .with_body(Body::Json(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!(" DELETE ".parse::<Method>().unwrap(), Method::Delete);
        assert!("FETCH".parse::<Method>().is_err());
    }

    #[test]
    fn test_method_idempotency() {
        assert!(Method::Get.is_idempotent());
        assert!(Method::Put.is_idempotent());
        assert!(Method::Delete.is_idempotent());
        assert!(!Method::Post.is_idempotent());
        assert!(!Method::Patch.is_idempotent());
    }

    #[test]
    fn test_headers_case_insensitive() {
        let headers = Headers::new().with("Content-Type", "application/json; charset=utf-8");

        assert_eq!(headers.get("content-type"), Some("application/json; charset=utf-8"));
        assert!(headers.contains("CONTENT-TYPE"));
        assert_eq!(headers.media_type().as_deref(), Some("application/json"));
        assert!(headers.declares_json());
    }

    #[test]
    fn test_headers_fold_repeats() {
        let headers = Headers::new()
            .with("Link", "</a?page=2>; rel=\"next\"")
            .with("link", "</a?page=9>; rel=\"last\"");

        assert_eq!(headers.len(), 1);
        assert!(headers.get("Link").unwrap().contains("rel=\"last\""));
    }

    #[test]
    fn test_json_media_types() {
        assert!(is_json_media_type("application/json"));
        assert!(is_json_media_type("application/problem+json"));
        assert!(!is_json_media_type("text/html"));
    }

    #[test]
    fn test_status_code_bounds() {
        assert!(StatusCode::new(99).is_err());
        assert!(StatusCode::new(600).is_err());
        assert_eq!(StatusCode::new(404).unwrap().class(), 4);
        assert!(StatusCode::new(201).unwrap().is_success());
    }

    #[test]
    fn test_body_from_text() {
        let json = Headers::new().with("Content-Type", "application/json");
        assert!(matches!(Body::from_text("{\"a\":1}", &json), Body::Json(_)));
        assert!(matches!(Body::from_text("{oops", &json), Body::Raw(_)));
        assert!(matches!(Body::from_text("", &json), Body::Empty));
        assert!(matches!(Body::from_text("{\"a\":1}", &Headers::new()), Body::Raw(_)));
    }

    #[test]
    fn test_raw_body_parse_error() {
        let body = Body::Raw(b"<html/>".to_vec());
        let err = body.to_json().unwrap_err();
        assert!(err.contains("not valid JSON"));
    }
}
