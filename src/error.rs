//! Error types for examsched
//!
//! Centralized error handling using thiserror. Per-module placement failures
//! are not errors; see [`crate::domain::UnscheduledReason`].

use thiserror::Error;

/// All error types that can occur while generating a schedule
#[derive(Debug, Error)]
pub enum SchedError {
    /// Input data is structurally broken (unknown references, cycles, bad capacities)
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Job parameters rejected at submission
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An overlapping generation is already queued or running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unknown job or record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML dataset parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SchedError {
    /// Whether a caller polling for status should retry after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, SchedError::Storage(_) | SchedError::Io(_))
    }
}

/// Result type alias for examsched operations
pub type Result<T> = std::result::Result<T, SchedError>;
