//! Error types for canopy-db

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// An underlying key-value operation failed to complete.
    ///
    /// Retryable: the store never partially applies a write, so the caller
    /// may re-issue the whole operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Resource not found under a caller-supplied key
    #[error("not found: {0}")]
    NotFound(String),

    /// A reference resolved to an absent fragment, or a fragment failed
    /// decoder validation. Fatal for the operation: the index is corrupt.
    #[error("store inconsistent: {0}")]
    StoreInconsistent(String),

    /// A key cannot participate in the index ordering
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A structural check failed; indicates an implementation bug
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// JSON encoding error (serde_json)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Create a store-unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Error::StoreUnavailable(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a store-inconsistency error
    pub fn store_inconsistent(msg: impl Into<String>) -> Self {
        Error::StoreInconsistent(msg.into())
    }

    /// Create an invalid key error
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Error::InvalidKey(msg.into())
    }

    /// Create an invariant violation error
    pub fn invariant_violation(msg: impl Into<String>) -> Self {
        Error::InvariantViolation(msg.into())
    }

    /// Create an I/O error
    pub fn io(msg: impl Into<String>) -> Self {
        Error::Io(msg.into())
    }
}
