//! Error types for the core module.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building samples or reading captures.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Unsupported capture format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("Capture not found: {0:?}")]
    CaptureNotFound(PathBuf),

    #[error("Invalid route pattern '{pattern}': {message}")]
    InvalidRoutePattern { pattern: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
