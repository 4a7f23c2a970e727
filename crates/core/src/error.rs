//! Domain error model.

use thiserror::Error;

/// Result type used across the catalog and grant layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// "No permission" is never an error: the resolver and the access gate return
/// empty trees / `false` instead. These variants cover lookups, write-time
/// reference checks and storage failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty title, oversized field).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A catalog invariant would be violated (e.g. a parent cycle).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// An id-based lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was hit (duplicate action key).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A write referenced a node or action that does not exist.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The backing store failed to commit; the whole write was rolled back.
    #[error("transaction failed: {0}")]
    TransactionFailure(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_reference(msg: impl Into<String>) -> Self {
        Self::InvalidReference(msg.into())
    }

    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::TransactionFailure(msg.into())
    }
}
