//! Error taxonomy shared by the FxWallet crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error category surfaced to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad amount, unsupported currency or pair.
    Validation,
    /// Missing wallet, currency or rate.
    NotFound,
    /// Insufficient balance or duplicate record.
    Conflict,
    /// Journal or rate log write failure.
    Persistence,
    /// A wallet lock was not acquired within its bound.
    ConcurrencyTimeout,
    /// The component is shutting down or closed.
    Unavailable,
}

impl ErrorKind {
    /// Only contention and shutdown are worth retrying; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::ConcurrencyTimeout | ErrorKind::Unavailable)
    }
}

/// Implemented by every crate-level error so the boundary can report a kind,
/// a stable code and a message without matching on text.
pub trait Classify: std::error::Error {
    /// Error category.
    fn kind(&self) -> ErrorKind;

    /// Stable machine-readable code.
    fn error_code(&self) -> &'static str;

    /// Structured report for the boundary layer.
    fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Structured error handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
}

/// Errors raised by persistence backends (journal, rate log, wallet records).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A record with the same unique key already exists.
    #[error("{entity} already exists: {key}")]
    DuplicateKey { entity: &'static str, key: String },

    /// The backend could not be reached or refused the write.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The write was attempted and failed.
    #[error("write failed: {0}")]
    WriteFailed(String),
}

impl StoreError {
    /// Shorthand used by backends to report a duplicate key.
    pub fn duplicate(entity: &'static str, key: impl ToString) -> Self {
        StoreError::DuplicateKey {
            entity,
            key: key.to_string(),
        }
    }

    /// Check if this error is a duplicate-key violation.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::DuplicateKey { .. } => ErrorKind::Conflict,
            StoreError::Unavailable(_) | StoreError::WriteFailed(_) => ErrorKind::Persistence,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            StoreError::DuplicateKey { .. } => "DUPLICATE_KEY",
            StoreError::Unavailable(_) => "STORAGE_UNAVAILABLE",
            StoreError::WriteFailed(_) => "STORAGE_WRITE_FAILED",
        }
    }
}
