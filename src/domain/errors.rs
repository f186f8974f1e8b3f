//! Domain error types
//!
//! Batch-level errors for Strata. Record-level failures are not errors: they are
//! tagged [`FailureKind`](crate::domain::stage::FailureKind) values recorded on
//! the record and never abort a batch.

use crate::domain::stage::{FailureKind, Stage};
use thiserror::Error;

/// Main Strata error type
#[derive(Debug, Error)]
pub enum StrataError {
    /// Invalid configuration (probability out of range, non-finite weight, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid input (empty batch, duplicate record ids, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The bounded worker pool could not run a record task
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Attribution of a record-level failure
///
/// Every terminal failure is fully attributed: kind, stage, substage and the
/// attempt on which it happened.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FailureAttribution {
    /// Failure kind produced by the probability check that fired
    pub kind: FailureKind,

    /// Stage in which the failure happened
    pub stage: Stage,

    /// Substage in which the failure happened
    pub substage: String,

    /// 1-based attempt number
    pub attempt: u32,

    /// Simulated timestamp
    pub at: chrono::DateTime<chrono::Utc>,

    /// Detail message
    pub detail: String,
}

// Conversion from std::io::Error
impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        StrataError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for StrataError {
    fn from(err: toml::de::Error) -> Self {
        StrataError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<tokio::task::JoinError> for StrataError {
    fn from(err: tokio::task::JoinError) -> Self {
        StrataError::WorkerPool(format!("record task failed: {err}"))
    }
}
