//! Seller withdrawals.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::Withdrawal;
pub use events::{
    WithdrawalApprovedData, WithdrawalCompletedData, WithdrawalEvent, WithdrawalRejectedData,
    WithdrawalRequestedData,
};
pub use commands::RequestWithdrawal;
pub use service::WithdrawalEngine;
pub use state::{PayoutMethod, WithdrawalDecision, WithdrawalStatus};

use common::Money;
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("Withdrawal already requested")]
    AlreadyRequested,

    #[error("Minimum withdrawal is {minimum}, requested {requested}")]
    BelowMinimum { minimum: Money, requested: Money },

    #[error("Destination account is required")]
    MissingAccount,

    #[error("Seller is not approved")]
    SellerNotApproved,

    #[error("Withdrawal is already {status}")]
    NotPending { status: WithdrawalStatus },
}

impl WithdrawalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WithdrawalError::BelowMinimum { .. } | WithdrawalError::MissingAccount => {
                ErrorKind::Validation
            }
            WithdrawalError::SellerNotApproved => ErrorKind::Forbidden,
            WithdrawalError::AlreadyRequested | WithdrawalError::NotPending { .. } => {
                ErrorKind::StateConflict
            }
        }
    }
}
