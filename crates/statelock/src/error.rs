//! Error types for StateLock

use std::fmt;

use thiserror::Error;

/// Main error type for StateLock operations
#[derive(Error, Debug)]
pub enum StateLockError {
    /// Malformed or out-of-range input, never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// A lookup that requires existence found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record store failures (LanceDB, file system, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding provider failures
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or invalid API key at the transport boundary
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected failures
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    /// Store or embedding provider unreachable; the caller may retry.
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl StateLockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StateLockError::Validation(_) => ErrorKind::Validation,
            StateLockError::NotFound(_) => ErrorKind::NotFound,
            StateLockError::Unauthorized(_) => ErrorKind::Unauthorized,
            StateLockError::Storage(_) | StateLockError::Embedding(_) => ErrorKind::Unavailable,
            StateLockError::Config(_)
            | StateLockError::Serialization(_)
            | StateLockError::Io(_)
            | StateLockError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Prefix the message with operation context, keeping the variant.
    pub fn context(self, context: impl fmt::Display) -> Self {
        match self {
            StateLockError::Validation(m) => StateLockError::Validation(format!("{context}: {m}")),
            StateLockError::NotFound(m) => StateLockError::NotFound(format!("{context}: {m}")),
            StateLockError::Storage(m) => StateLockError::Storage(format!("{context}: {m}")),
            StateLockError::Embedding(m) => StateLockError::Embedding(format!("{context}: {m}")),
            StateLockError::Config(m) => StateLockError::Config(format!("{context}: {m}")),
            StateLockError::Unauthorized(m) => {
                StateLockError::Unauthorized(format!("{context}: {m}"))
            }
            StateLockError::Serialization(m) => {
                StateLockError::Serialization(format!("{context}: {m}"))
            }
            StateLockError::Io(e) => StateLockError::Internal(format!("{context}: I/O error: {e}")),
            StateLockError::Internal(m) => StateLockError::Internal(format!("{context}: {m}")),
        }
    }
}

impl From<serde_json::Error> for StateLockError {
    fn from(e: serde_json::Error) -> Self {
        StateLockError::Serialization(e.to_string())
    }
}

/// Result type alias for StateLock operations
pub type Result<T> = std::result::Result<T, StateLockError>;
