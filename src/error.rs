//! Error types for taskboard
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (validation, bad args, unknown ids on the CLI)
//! - 4: Operation failed (I/O, serialization, storage)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tb CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for taskboard operations
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors (exit code 2)
    #[error("Title is required")]
    EmptyTitle,

    #[error("Field name is required")]
    EmptyFieldName,

    #[error("A field with this name already exists: {0}")]
    DuplicateFieldName(String),

    #[error("Default value for field '{field}' must be {expected}")]
    FieldTypeMismatch { field: String, expected: String },

    #[error("Value for field '{field}' must be a finite number")]
    NonFiniteNumber { field: String },

    #[error("Task id already exists: {0}")]
    DuplicateTaskId(String),

    #[error("Index out of range: {index} (length {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Stored state for '{key}' has version {found}, newest supported is {supported}")]
    UnsupportedVersion {
        key: String,
        found: u32,
        supported: u32,
    },

    #[error("Migration of '{key}' from version {from} failed: {reason}")]
    Migration {
        key: String,
        from: u32,
        reason: String,
    },

    #[error("Seed load failed: {0}")]
    Seed(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::EmptyTitle
            | Error::EmptyFieldName
            | Error::DuplicateFieldName(_)
            | Error::FieldTypeMismatch { .. }
            | Error::NonFiniteNumber { .. }
            | Error::DuplicateTaskId(_)
            | Error::InvalidIndex { .. }
            | Error::TaskNotFound(_)
            | Error::FieldNotFound(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_) => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::UnsupportedVersion { .. }
            | Error::Migration { .. }
            | Error::Seed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// True for errors a form should render inline next to the input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyTitle
                | Error::EmptyFieldName
                | Error::DuplicateFieldName(_)
                | Error::FieldTypeMismatch { .. }
                | Error::NonFiniteNumber { .. }
        )
    }

    /// Structured details for JSON output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::InvalidIndex { index, len } => Some(serde_json::json!({
                "index": index,
                "len": len,
            })),
            Error::FieldTypeMismatch { field, expected } => Some(serde_json::json!({
                "field": field,
                "expected": expected,
            })),
            Error::UnsupportedVersion {
                key,
                found,
                supported,
            } => Some(serde_json::json!({
                "key": key,
                "found": found,
                "supported": supported,
            })),
            _ => None,
        }
    }
}

/// Result type alias for taskboard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
