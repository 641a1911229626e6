//! Typed failures for the domain layer.

use thiserror::Error;

/// Result alias every aggregate and guard returns.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic business failure.
///
/// Every variant here is a *decision*, reproducible from the same state and
/// command. Storage and transport failures live with the engine, not here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, empty mandatory field).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A state machine was asked to take an edge its transition table does not allow.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// A quotation submission left at least one item without a quoted cost.
    #[error("incomplete quotation: {0}")]
    IncompleteQuotation(String),

    /// An order confirmation asked for more stock than the ledger holds.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    /// A ledger entry would have driven the running stock below zero.
    #[error("stock cannot go negative: {0}")]
    NegativeStock(String),

    /// A concurrent duplicate of a mutation that already committed (e.g. a
    /// second receipt of the same purchase order).
    #[error("already processed: {0}")]
    AlreadyProcessed(String),

    /// An identifier failed to parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// No such record in the directory, stream or read model.
    #[error("not found")]
    NotFound,

    /// Optimistic concurrency retries exhausted without a clean commit.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The actor's role does not permit this command.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn incomplete_quotation(msg: impl Into<String>) -> Self {
        Self::IncompleteQuotation(msg.into())
    }

    pub fn insufficient_stock(msg: impl Into<String>) -> Self {
        Self::InsufficientStock(msg.into())
    }

    pub fn negative_stock(msg: impl Into<String>) -> Self {
        Self::NegativeStock(msg.into())
    }

    pub fn already_processed(msg: impl Into<String>) -> Self {
        Self::AlreadyProcessed(msg.into())
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
