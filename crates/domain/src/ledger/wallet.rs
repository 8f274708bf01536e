//! A user's platform-held wallet.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, TransactionId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent};

use super::{LedgerError, SettlementOutcome, TransactionRecord, TransactionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WalletEvent {
    TransactionRecorded(TransactionRecord),
    TransactionSettled(TransactionSettledData),
}

impl DomainEvent for WalletEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WalletEvent::TransactionRecorded(_) => "WalletTransactionRecorded",
            WalletEvent::TransactionSettled(_) => "WalletTransactionSettled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSettledData {
    pub user_id: UserId,
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    pub settled_at: DateTime<Utc>,
}

/// Wallet aggregate, one stream per user.
///
/// `balance` is only ever changed by applying a completed transaction, so
/// it always equals the sum of completed transaction amounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wallet {
    user_id: Option<UserId>,
    #[serde(default)]
    version: Version,
    balance: Money,
    transactions: Vec<TransactionRecord>,
}

impl Aggregate for Wallet {
    type Event = WalletEvent;
    type Error = LedgerError;

    fn aggregate_type() -> &'static str {
        "Wallet"
    }

    fn id(&self) -> Option<AggregateId> {
        self.user_id.map(Into::into)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            WalletEvent::TransactionRecorded(record) => {
                self.user_id = Some(record.user_id);
                if record.is_completed() {
                    self.balance += record.amount;
                }
                self.transactions.push(record);
            }
            WalletEvent::TransactionSettled(data) => {
                if let Some(record) = self
                    .transactions
                    .iter_mut()
                    .find(|t| t.transaction_id == data.transaction_id)
                {
                    record.status = data.status;
                    record.settled_at = Some(data.settled_at);
                    if record.is_completed() {
                        self.balance += record.amount;
                    }
                }
            }
        }
    }
}

impl Wallet {
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Every transaction, oldest first.
    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    pub fn transaction(&self, transaction_id: TransactionId) -> Option<&TransactionRecord> {
        self.transactions
            .iter()
            .find(|t| t.transaction_id == transaction_id)
    }

    /// Recomputes the balance from the transaction log.
    pub fn completed_sum(&self) -> Money {
        self.transactions
            .iter()
            .filter(|t| t.is_completed())
            .map(|t| t.amount)
            .sum()
    }
}

impl Wallet {
    /// Records a transaction. Completed outflows must be covered by the
    /// current balance.
    pub fn record(&self, record: TransactionRecord) -> Result<Vec<WalletEvent>, LedgerError> {
        if record.amount.is_zero() {
            return Err(LedgerError::NonPositiveAmount {
                amount: record.amount,
            });
        }
        if !record.amount.is_within_limit() {
            return Err(LedgerError::AmountOutOfRange {
                amount: record.amount,
            });
        }

        if record.is_completed() {
            self.ensure_can_apply(record.amount)?;
        }

        Ok(vec![WalletEvent::TransactionRecorded(record)])
    }

    /// Moves a pending transaction to its final status.
    pub fn settle(
        &self,
        transaction_id: TransactionId,
        outcome: SettlementOutcome,
        at: DateTime<Utc>,
    ) -> Result<Vec<WalletEvent>, LedgerError> {
        let record = self
            .transaction(transaction_id)
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;

        if record.status != TransactionStatus::Pending {
            return Err(LedgerError::NotPending {
                transaction_id,
                status: record.status,
            });
        }

        let status = TransactionStatus::from(outcome);
        if status == TransactionStatus::Completed {
            self.ensure_can_apply(record.amount)?;
        }

        Ok(vec![WalletEvent::TransactionSettled(TransactionSettledData {
            user_id: record.user_id,
            transaction_id,
            status,
            settled_at: at,
        })])
    }

    /// Outflows must be covered; inflows must keep the balance in range.
    fn ensure_can_apply(&self, amount: Money) -> Result<(), LedgerError> {
        if amount.is_negative() {
            let requested = -amount;
            if self.balance < requested {
                return Err(LedgerError::InsufficientFunds {
                    available: self.balance,
                    requested,
                });
            }
            return Ok(());
        }

        match self.balance.checked_add(amount) {
            Some(next) if next.is_within_limit() => Ok(()),
            _ => Err(LedgerError::BalanceOverflow {
                balance: self.balance,
                amount,
            }),
        }
    }
}
