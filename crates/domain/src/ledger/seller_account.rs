//! A seller's earnings account.
//!
//! Funds owed to a seller sit either in `available_balance` or, while a
//! withdrawal is pending, in `pending_withdrawals`. Their sum always equals
//! the sum of the account's completed transactions: earnings add a positive
//! payout record, settling a withdrawal adds a negative one, and reserving
//! or releasing only moves money between the two buckets.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, OrderId, SellerId, UserId, WithdrawalId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent};

use super::{LedgerError, TransactionRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SellerAccountEvent {
    EarningsCredited(EarningsCreditedData),
    FundsReserved(FundsReservedData),
    ReservationReleased(ReservationReleasedData),
    ReservationSettled(ReservationSettledData),
}

impl DomainEvent for SellerAccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SellerAccountEvent::EarningsCredited(_) => "SellerEarningsCredited",
            SellerAccountEvent::FundsReserved(_) => "SellerFundsReserved",
            SellerAccountEvent::ReservationReleased(_) => "SellerReservationReleased",
            SellerAccountEvent::ReservationSettled(_) => "SellerReservationSettled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsCreditedData {
    pub seller_id: SellerId,
    pub order_id: OrderId,
    pub record: TransactionRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundsReservedData {
    pub seller_id: SellerId,
    pub user_id: UserId,
    pub withdrawal_id: WithdrawalId,
    pub amount: Money,
    pub reserved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationReleasedData {
    pub seller_id: SellerId,
    pub withdrawal_id: WithdrawalId,
    pub amount: Money,
    pub released_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationSettledData {
    pub seller_id: SellerId,
    pub withdrawal_id: WithdrawalId,
    pub record: TransactionRecord,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SellerAccount {
    seller_id: Option<SellerId>,
    user_id: Option<UserId>,
    #[serde(default)]
    version: Version,
    available_balance: Money,
    pending_withdrawals: Money,
    total_earnings: Money,
    completed_orders: u64,
    reservations: HashMap<WithdrawalId, Money>,
    transactions: Vec<TransactionRecord>,
}

impl Aggregate for SellerAccount {
    type Event = SellerAccountEvent;
    type Error = LedgerError;

    fn aggregate_type() -> &'static str {
        "SellerAccount"
    }

    fn id(&self) -> Option<AggregateId> {
        self.seller_id.map(Into::into)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            SellerAccountEvent::EarningsCredited(data) => {
                self.seller_id = Some(data.seller_id);
                self.user_id = Some(data.record.user_id);
                self.available_balance += data.record.amount;
                self.total_earnings += data.record.amount;
                self.completed_orders += 1;
                self.transactions.push(data.record);
            }
            SellerAccountEvent::FundsReserved(data) => {
                self.seller_id = Some(data.seller_id);
                self.user_id = Some(data.user_id);
                self.available_balance -= data.amount;
                self.pending_withdrawals += data.amount;
                self.reservations.insert(data.withdrawal_id, data.amount);
            }
            SellerAccountEvent::ReservationReleased(data) => {
                self.reservations.remove(&data.withdrawal_id);
                self.pending_withdrawals -= data.amount;
                self.available_balance += data.amount;
            }
            SellerAccountEvent::ReservationSettled(data) => {
                if let Some(amount) = self.reservations.remove(&data.withdrawal_id) {
                    self.pending_withdrawals -= amount;
                }
                self.transactions.push(data.record);
            }
        }
    }
}

// Query methods
impl SellerAccount {
    pub fn seller_id(&self) -> Option<SellerId> {
        self.seller_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn available_balance(&self) -> Money {
        self.available_balance
    }

    pub fn pending_withdrawals(&self) -> Money {
        self.pending_withdrawals
    }

    pub fn total_earnings(&self) -> Money {
        self.total_earnings
    }

    pub fn completed_orders(&self) -> u64 {
        self.completed_orders
    }

    pub fn reservation(&self, withdrawal_id: WithdrawalId) -> Option<Money> {
        self.reservations.get(&withdrawal_id).copied()
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    pub fn completed_sum(&self) -> Money {
        self.transactions
            .iter()
            .filter(|t| t.is_completed())
            .map(|t| t.amount)
            .sum()
    }
}

// Command methods
impl SellerAccount {
    pub fn credit_earnings(
        &self,
        seller_id: SellerId,
        order_id: OrderId,
        record: TransactionRecord,
    ) -> Result<Vec<SellerAccountEvent>, LedgerError> {
        if !record.amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount {
                amount: record.amount,
            });
        }
        if !record.amount.is_within_limit() {
            return Err(LedgerError::AmountOutOfRange {
                amount: record.amount,
            });
        }

        let held = self.available_balance + self.pending_withdrawals;
        let fits = held
            .checked_add(record.amount)
            .is_some_and(|next| next.is_within_limit())
            && self.total_earnings.checked_add(record.amount).is_some();
        if !fits {
            return Err(LedgerError::BalanceOverflow {
                balance: held,
                amount: record.amount,
            });
        }

        Ok(vec![SellerAccountEvent::EarningsCredited(
            EarningsCreditedData {
                seller_id,
                order_id,
                record,
            },
        )])
    }

    /// Earmarks `amount` of the available balance for a withdrawal.
    pub fn reserve(
        &self,
        seller_id: SellerId,
        user_id: UserId,
        withdrawal_id: WithdrawalId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<Vec<SellerAccountEvent>, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount { amount });
        }

        if self.available_balance < amount {
            return Err(LedgerError::InsufficientFunds {
                available: self.available_balance,
                requested: amount,
            });
        }

        Ok(vec![SellerAccountEvent::FundsReserved(FundsReservedData {
            seller_id,
            user_id,
            withdrawal_id,
            amount,
            reserved_at: at,
        })])
    }

    /// Returns an earmarked amount to the available balance.
    pub fn release(
        &self,
        withdrawal_id: WithdrawalId,
        at: DateTime<Utc>,
    ) -> Result<Vec<SellerAccountEvent>, LedgerError> {
        let (seller_id, amount) = self.reserved(withdrawal_id)?;

        Ok(vec![SellerAccountEvent::ReservationReleased(
            ReservationReleasedData {
                seller_id,
                withdrawal_id,
                amount,
                released_at: at,
            },
        )])
    }

    /// Pays an earmarked amount out of the platform. `record` must carry
    /// the negated reservation.
    pub fn settle_reservation(
        &self,
        withdrawal_id: WithdrawalId,
        record: TransactionRecord,
    ) -> Result<Vec<SellerAccountEvent>, LedgerError> {
        let (seller_id, amount) = self.reserved(withdrawal_id)?;

        if record.amount != -amount {
            return Err(LedgerError::ReservationMismatch {
                withdrawal_id,
                reserved: amount,
                settled: record.amount,
            });
        }

        Ok(vec![SellerAccountEvent::ReservationSettled(
            ReservationSettledData {
                seller_id,
                withdrawal_id,
                record,
            },
        )])
    }

    fn reserved(&self, withdrawal_id: WithdrawalId) -> Result<(SellerId, Money), LedgerError> {
        match (self.seller_id, self.reservation(withdrawal_id)) {
            (Some(seller_id), Some(amount)) => Ok((seller_id, amount)),
            _ => Err(LedgerError::ReservationNotFound(withdrawal_id)),
        }
    }
}
