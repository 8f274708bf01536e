//! Wallets, seller accounts and the transaction ledger.
//!
//! The [`Ledger`] service is the only writer of balances. Every balance
//! change is a [`TransactionRecord`] appended to the owning stream, and the
//! balance is the fold of those records.

mod commission;
mod seller_account;
mod service;
mod transaction;
mod wallet;

use common::{Money, OrderId, TransactionId, WithdrawalId};
use thiserror::Error;

use crate::error::ErrorKind;

pub use commission::{
    CommissionRecognizedData, PlatformCommission, PlatformCommissionEvent, commission_stream,
};
pub use seller_account::{
    EarningsCreditedData, FundsReservedData, ReservationReleasedData, ReservationSettledData,
    SellerAccount, SellerAccountEvent,
};
pub use service::Ledger;
pub use transaction::{
    LedgerEntry, SettlementOutcome, TransactionLink, TransactionNumbers, TransactionRecord,
    TransactionStatus, TransactionType,
};
pub use wallet::{TransactionSettledData, Wallet, WalletEvent};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Money },

    #[error("Amount {amount} exceeds the transaction limit")]
    AmountOutOfRange { amount: Money },

    #[error("Crediting {amount} would overflow the balance of {balance}")]
    BalanceOverflow { balance: Money, amount: Money },

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: Money, requested: Money },

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Transaction {transaction_id} is already {status}")]
    NotPending {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },

    #[error("Commission for order {0} is already recognized")]
    CommissionAlreadyRecognized(OrderId),

    #[error("No funds reserved for withdrawal {0}")]
    ReservationNotFound(WithdrawalId),

    #[error("Withdrawal {withdrawal_id} reserved {reserved} but settlement records {settled}")]
    ReservationMismatch {
        withdrawal_id: WithdrawalId,
        reserved: Money,
        settled: Money,
    },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NonPositiveAmount { .. }
            | LedgerError::AmountOutOfRange { .. }
            | LedgerError::BalanceOverflow { .. } => ErrorKind::Validation,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::TransactionNotFound(_) | LedgerError::ReservationNotFound(_) => {
                ErrorKind::NotFound
            }
            LedgerError::NotPending { .. } | LedgerError::CommissionAlreadyRecognized(_) => {
                ErrorKind::StateConflict
            }
            LedgerError::ReservationMismatch { .. } => ErrorKind::Infrastructure,
        }
    }
}
