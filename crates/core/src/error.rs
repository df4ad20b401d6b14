//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only (validation, invariants, conflicts).
/// Storage and transport failures live in the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty name, missing items).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Entity absent, or not owned by the requesting business.
    #[error("not found")]
    NotFound,

    /// Unknown status value, or a transition the state table does not allow.
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// A quantity (or per-unit amount) was zero, negative or otherwise unusable.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// FIFO allocation could not be satisfied from the remaining lots.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// A domain invariant was violated (e.g. ledger arithmetic mismatch).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_status(msg: impl Into<String>) -> Self {
        Self::InvalidStatus(msg.into())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
