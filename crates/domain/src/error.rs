//! Domain error types and their classification.

use event_store::EventStoreError;
use serde::Serialize;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::negotiation::NeedError;
use crate::order::OrderError;
use crate::ports::PortError;
use crate::withdrawal::WithdrawalError;

/// Coarse error classes callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input; retrying without fixing it will fail again.
    Validation,
    NotFound,
    Forbidden,
    /// The entity's current status does not allow the operation.
    StateConflict,
    InsufficientFunds,
    /// The store or a collaborator failed; the whole operation may be retried.
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Need(#[from] NeedError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Withdrawal(#[from] WithdrawalError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{operation} kept conflicting with concurrent writers after {attempts} attempts")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
    },

    #[error("Internal error: {0}")]
    Infrastructure(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        DomainError::Forbidden(message.into())
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            message: message.into(),
        }
    }

    /// True when the failure came from a stale expected version.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Need(e) => e.kind(),
            DomainError::Order(e) => e.kind(),
            DomainError::Ledger(e) => e.kind(),
            DomainError::Withdrawal(e) => e.kind(),
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::Validation { .. } => ErrorKind::Validation,
            DomainError::EventStore(EventStoreError::InvalidAppend(_)) => ErrorKind::Validation,
            DomainError::EventStore(_)
            | DomainError::Port(_)
            | DomainError::RetriesExhausted { .. }
            | DomainError::Infrastructure(_)
            | DomainError::Serialization(_) => ErrorKind::Infrastructure,
        }
    }
}
