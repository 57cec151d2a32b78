//! Error types for the issue store.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Structured variants for caller-recoverable cases (validation, project
//!   immutability), `#[from]` conversions for backend failures
//! - Absence of a record is never an error: finders return empty collections
//!   and deletes of missing ids are no-ops

use crate::model::ProjectId;
use thiserror::Error;

/// Primary error type for issue store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A required field was missing or malformed; the operation had no effect.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// An upsert attempted to move an existing record to a different project.
    ///
    /// The project association is immutable after creation, so this is
    /// rejected and the stored record is left untouched.
    #[error("Record '{id}' belongs to project '{existing}', cannot move to '{requested}'")]
    ProjectChanged {
        id: String,
        existing: ProjectId,
        requested: ProjectId,
    },

    /// `SQLite` database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error (tracker payload column).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Can the caller fix this without operator intervention?
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::ProjectChanged { .. })
    }
}

/// Result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;
