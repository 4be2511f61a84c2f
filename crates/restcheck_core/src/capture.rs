//! Capture file ingestion.
//!
//! Captures hold recorded HTTP exchanges as JSON arrays, JSON lines or YAML
//! sequences. Every record either becomes a validated [`Sample`] or a
//! [`Rejection`] explaining why it could not; nothing is dropped silently.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::classify::ArchetypeResolver;
use crate::error::{CoreError, CoreResult};
use crate::model::{Archetype, Body, Headers, Method, Sample, StatusCode};

/// A capture record as it appears on disk, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    /// Request path or absolute URI
    #[serde(default, alias = "uri", alias = "url")]
    pub path: Option<String>,
    #[serde(default)]
    pub archetype: Option<String>,
    #[serde(default)]
    pub request_headers: BTreeMap<String, String>,
    #[serde(default, alias = "status_code")]
    pub status: Option<i64>,
    #[serde(default)]
    pub response_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

/// A record that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub sample_id: String,
    pub reason: String,
}

/// One ingested record, in input order.
#[derive(Debug, Clone)]
pub enum Ingested {
    Accepted(Sample),
    Rejected(Rejection),
}

impl Ingested {
    pub fn sample_id(&self) -> &str {
        match self {
            Ingested::Accepted(sample) => &sample.id,
            Ingested::Rejected(rejection) => &rejection.sample_id,
        }
    }
}

/// Ordered result of ingesting one or more captures.
#[derive(Debug, Clone, Default)]
pub struct CaptureBatch {
    pub entries: Vec<Ingested>,
}

impl CaptureBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted(&self) -> impl Iterator<Item = &Sample> {
        self.entries.iter().filter_map(|e| match e {
            Ingested::Accepted(sample) => Some(sample),
            Ingested::Rejected(_) => None,
        })
    }

    pub fn rejected(&self) -> impl Iterator<Item = &Rejection> {
        self.entries.iter().filter_map(|e| match e {
            Ingested::Rejected(rejection) => Some(rejection),
            Ingested::Accepted(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: CaptureBatch) {
        self.entries.extend(other.entries);
    }
}

/// Supported on-disk layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Json,
    JsonLines,
    Yaml,
}

impl CaptureFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Records(Vec<serde_json::Value>),
    Wrapped { samples: Vec<serde_json::Value> },
}

/// Reads captures and turns records into samples.
#[derive(Debug)]
pub struct CaptureReader {
    resolver: ArchetypeResolver,
    seen: HashSet<String>,
}

impl CaptureReader {
    pub fn new(resolver: ArchetypeResolver) -> Self {
        Self {
            resolver,
            seen: HashSet::new(),
        }
    }

    /// Read a capture file, or every capture file below a directory.
    pub fn read_path(&mut self, path: &Path) -> CoreResult<CaptureBatch> {
        if !path.exists() {
            return Err(CoreError::CaptureNotFound(path.to_path_buf()));
        }

        if path.is_file() {
            let format = CaptureFormat::from_path(path)
                .ok_or_else(|| CoreError::UnsupportedFormat(path.to_path_buf()))?;
            return self.read_file(path, format);
        }

        let mut files: Vec<(PathBuf, CaptureFormat)> = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| {
                let format = CaptureFormat::from_path(e.path())?;
                Some((e.into_path(), format))
            })
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));

        info!("Found {} capture files under {:?}", files.len(), path);

        let mut batch = CaptureBatch::new();
        for (file, format) in files {
            let relative = file.strip_prefix(path).unwrap_or(&file);
            let source = relative.to_string_lossy().replace('\\', "/");
            batch.extend(self.read_source(&file, &source, format)?);
        }
        Ok(batch)
    }

    /// Read a single capture file. Records are named after the file name.
    pub fn read_file(&mut self, path: &Path, format: CaptureFormat) -> CoreResult<CaptureBatch> {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.read_source(path, &source, format)
    }

    fn read_source(&mut self, path: &Path, source: &str, format: CaptureFormat) -> CoreResult<CaptureBatch> {
        let content = std::fs::read_to_string(path)?;
        debug!("Reading {:?} capture {}", format, source);
        Ok(self.read_str(source, &content, format))
    }

    /// Parse capture text. Unparseable documents become a single rejection.
    pub fn read_str(&mut self, source: &str, content: &str, format: CaptureFormat) -> CaptureBatch {
        let mut batch = CaptureBatch::new();

        let values: Vec<(usize, Result<serde_json::Value, String>)> = match format {
            CaptureFormat::JsonLines => content
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(n, line)| (n + 1, serde_json::from_str(line).map_err(|e| e.to_string())))
                .collect(),
            CaptureFormat::Json => match serde_json::from_str::<JsonDocument>(content) {
                Ok(JsonDocument::Records(records)) | Ok(JsonDocument::Wrapped { samples: records }) => {
                    records.into_iter().enumerate().map(|(n, v)| (n + 1, Ok(v))).collect()
                }
                Err(e) => {
                    warn!("Capture {} is not a JSON record list: {}", source, e);
                    batch.entries.push(Ingested::Rejected(Rejection {
                        sample_id: source.to_string(),
                        reason: format!("capture is not a JSON array of records: {}", e),
                    }));
                    return batch;
                }
            },
            CaptureFormat::Yaml => match serde_yaml::from_str::<Vec<serde_json::Value>>(content) {
                Ok(records) => records.into_iter().enumerate().map(|(n, v)| (n + 1, Ok(v))).collect(),
                Err(e) => {
                    warn!("Capture {} is not a YAML record list: {}", source, e);
                    batch.entries.push(Ingested::Rejected(Rejection {
                        sample_id: source.to_string(),
                        reason: format!("capture is not a YAML sequence of records: {}", e),
                    }));
                    return batch;
                }
            },
        };

        for (number, value) in values {
            let fallback_id = format!("{}#{}", source, number);
            let entry = match value {
                Ok(value) => self.ingest_value(value, fallback_id),
                Err(e) => Ingested::Rejected(Rejection {
                    sample_id: fallback_id,
                    reason: format!("record is not valid JSON: {}", e),
                }),
            };
            if let Ingested::Rejected(rejection) = &entry {
                warn!("Rejected {}: {}", rejection.sample_id, rejection.reason);
            }
            batch.entries.push(entry);
        }

        batch
    }

    fn ingest_value(&mut self, value: serde_json::Value, fallback_id: String) -> Ingested {
        let explicit_id = value
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        match serde_json::from_value::<CaptureRecord>(value) {
            Ok(record) => self.ingest(record, fallback_id),
            Err(e) => {
                // Reserve the id so a later record cannot reuse it.
                let sample_id = match explicit_id {
                    Some(id) if self.seen.insert(id.clone()) => id,
                    _ => self.reserve(fallback_id),
                };
                Ingested::Rejected(Rejection {
                    sample_id,
                    reason: format!("malformed record: {}", e),
                })
            }
        }
    }

    fn reserve(&mut self, id: String) -> String {
        self.seen.insert(id.clone());
        id
    }

    /// Validate one record. `fallback_id` names records that carry no id.
    pub fn ingest(&mut self, record: CaptureRecord, fallback_id: String) -> Ingested {
        let id = match record.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => fallback_id.clone(),
        };

        // A duplicate is reported under its positional id so the accepted
        // sample keeps its own findings.
        if !self.seen.insert(id.clone()) {
            return Ingested::Rejected(Rejection {
                sample_id: self.reserve(fallback_id),
                reason: format!("duplicate sample id '{}'", id),
            });
        }

        match self.build_sample(id.clone(), record) {
            Ok(sample) => Ingested::Accepted(sample),
            Err(e) => Ingested::Rejected(Rejection {
                sample_id: id,
                reason: match e {
                    CoreError::InvalidSample(reason) => reason,
                    other => other.to_string(),
                },
            }),
        }
    }

    fn build_sample(&self, id: String, record: CaptureRecord) -> CoreResult<Sample> {
        let method = record
            .method
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| CoreError::InvalidSample("missing request method".to_string()))?
            .parse::<Method>()?;

        let raw_path = record
            .path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| CoreError::InvalidSample("missing request path".to_string()))?;
        let path = request_path(raw_path)?;

        let code = record
            .status
            .ok_or_else(|| CoreError::InvalidSample("missing response status".to_string()))?;
        let status = u16::try_from(code)
            .map_err(|_| CoreError::InvalidSample(format!("status code {} is outside 100..=599", code)))
            .and_then(StatusCode::new)?;

        let declared = record
            .archetype
            .as_deref()
            .map(str::parse::<Archetype>)
            .transpose()?;
        let archetype = self.resolver.resolve(&path, declared);

        let request_headers = Headers::from(record.request_headers);
        let response_headers = Headers::from(record.response_headers);
        let body = match record.body {
            None | Some(serde_json::Value::Null) => Body::Empty,
            Some(serde_json::Value::String(text)) => Body::from_text(&text, &response_headers),
            Some(value) => Body::Json(value),
        };

        Ok(Sample {
            id,
            method,
            path,
            archetype,
            request_headers,
            status,
            response_headers,
            body,
        })
    }
}

/// Extract the path from a request target, dropping scheme, authority and query.
fn request_path(target: &str) -> CoreResult<String> {
    let without_scheme = match target.find("://") {
        Some(idx) => {
            let rest = &target[idx + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => target,
    };

    let path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    if !path.starts_with('/') {
        return Err(CoreError::InvalidSample(format!(
            "request path '{}' must start with '/'",
            target
        )));
    }
    Ok(path.to_string())
}
