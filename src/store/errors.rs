//! # Store Errors
//!
//! Every rejected write leaves the store unchanged.

use thiserror::Error;

use crate::schema::SchemaError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    // ==================
    // Constraint Errors
    // ==================
    /// Row failed column validation, or the table is unknown
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Another row already holds the same values for a uniqueness group
    #[error("Unique constraint violated on {table} ({}); conflicts with row {existing_id}", .fields.join(", "))]
    UniqueViolation {
        table: String,
        fields: Vec<String>,
        existing_id: i64,
    },

    /// Reference to a row that does not exist
    #[error("{table}.{field} references missing {target} row {id}")]
    DanglingReference {
        table: String,
        field: String,
        target: String,
        id: i64,
    },

    /// Field is assigned by the store and cannot be written
    #[error("{table}.{field} cannot be changed")]
    ImmutableField { table: String, field: String },

    // ==================
    // Lookup Errors
    // ==================
    #[error("{table} row {id} not found")]
    NotFound { table: String, id: i64 },

    /// Stored row does not match the requested model
    #[error("Failed to decode {table} row: {reason}")]
    Decode { table: String, reason: String },

    // ==================
    // Snapshot Errors
    // ==================
    #[error("Snapshot corrupted: {0}")]
    Corrupted(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl StoreError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Schema(e) => e.code().code(),
            StoreError::UniqueViolation { .. } => "COURSE_UNIQUE_VIOLATION",
            StoreError::DanglingReference { .. } => "COURSE_DANGLING_REFERENCE",
            StoreError::ImmutableField { .. } => "COURSE_IMMUTABLE_FIELD",
            StoreError::NotFound { .. } => "COURSE_NOT_FOUND",
            StoreError::Decode { .. } => "COURSE_DECODE_FAILED",
            StoreError::Corrupted(_) => "COURSE_SNAPSHOT_CORRUPTED",
            StoreError::Io(_) => "COURSE_IO_ERROR",
        }
    }

    /// Whether the caller's request caused the error
    pub fn is_client_error(&self) -> bool {
        match self {
            StoreError::Schema(e) => !e.is_fatal(),
            StoreError::UniqueViolation { .. }
            | StoreError::DanglingReference { .. }
            | StoreError::ImmutableField { .. }
            | StoreError::NotFound { .. } => true,
            StoreError::Decode { .. } | StoreError::Corrupted(_) | StoreError::Io(_) => false,
        }
    }

    pub(crate) fn not_found(table: &str, id: i64) -> Self {
        StoreError::NotFound {
            table: table.to_string(),
            id,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}
