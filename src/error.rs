//! Error types for the unification engine.
//!
//! All errors are strongly typed using thiserror. Anticipated bad input inside
//! an ingestion batch is never surfaced through these types to the caller of
//! `ingest_platform_data`; it is logged and reported per record instead.

use thiserror::Error;

use crate::entity::EntityId;

/// Validation errors that occur during input validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Platform identifier cannot be empty")]
    EmptyPlatform,

    #[error("Record contains an empty field name")]
    EmptyFieldName,

    #[error("Record must be a JSON object, got {found}")]
    RecordNotObject {
        found: &'static str,
    },

    #[error("Threshold '{name}' value {value} is out of range [0.0, 1.0]")]
    ThresholdOutOfRange {
        name: &'static str,
        value: f64,
    },

    #[error("Deal risk amount {value} must be a non-negative finite number")]
    InvalidAmount {
        value: f64,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors that occur while the engine runs.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Entity not found: {id}")]
    EntityNotFound {
        id: EntityId,
    },

    #[error("Registry index is inconsistent: {message}")]
    Index {
        message: String,
    },

    #[error("Runtime queue is full (capacity {capacity})")]
    QueueFull {
        capacity: usize,
    },

    #[error("Runtime worker disconnected")]
    Disconnected,

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum UnifyError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl UnifyError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Internal { .. } => false,
            Self::Execution(e) => matches!(
                e,
                ExecutionError::QueueFull { .. } | ExecutionError::Timeout { .. }
            ),
        }
    }
}

/// Result type alias for engine operations.
pub type UnifyResult<T> = Result<T, UnifyError>;
