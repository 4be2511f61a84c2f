//! Error types for policy module.

use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that can occur while building the rule catalog or running an evaluation.
///
/// Nonconformant samples are never errors; they become findings.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Duplicate rule id: {0}")]
    DuplicateRule(String),

    #[error("Unknown rule id: {0}")]
    UnknownRule(String),

    #[error("Invalid rule definition: {rule} - {message}")]
    InvalidRule { rule: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Evaluation worker failed: {0}")]
    WorkerFailed(String),

    #[error("Capture error: {0}")]
    Capture(#[from] restcheck_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PolicyError {
    /// Whether the error comes from a broken rule catalog or config file.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PolicyError::DuplicateRule(_)
                | PolicyError::UnknownRule(_)
                | PolicyError::InvalidRule { .. }
                | PolicyError::InvalidConfiguration(_)
                | PolicyError::Yaml(_)
                | PolicyError::Capture(restcheck_core::CoreError::InvalidRoutePattern { .. })
        )
    }
}
