//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant except `Storage` is detected before any write and leaves
/// state unchanged. `Storage` means the underlying commit could not complete;
/// the transaction mechanism guarantees nothing was partially applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A monetary amount was zero or negative.
    #[error("amount must be greater than zero")]
    InvalidAmount,

    /// An unrecognized movement kind.
    #[error("invalid movement kind: {0}")]
    InvalidKind(String),

    /// A referenced account, loan, customer or other record is absent.
    #[error("not found")]
    NotFound,

    /// A withdrawal or transfer exceeds the available balance.
    #[error("insufficient balance")]
    InsufficientFunds,

    /// The customer is already a holder of the account.
    #[error("customer is already linked to this account")]
    AlreadyLinked,

    /// A value failed validation (e.g. empty name, duplicate account number).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The storage layer failed to commit; state is as if the operation
    /// never started.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_kind(kind: impl Into<String>) -> Self {
        Self::InvalidKind(kind.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
