//! Withdrawal domain events.

use chrono::{DateTime, Utc};
use common::{Money, SellerId, TransactionId, UserId, WithdrawalId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::PayoutMethod;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WithdrawalEvent {
    WithdrawalRequested(WithdrawalRequestedData),
    WithdrawalApproved(WithdrawalApprovedData),
    WithdrawalCompleted(WithdrawalCompletedData),
    WithdrawalRejected(WithdrawalRejectedData),
}

impl DomainEvent for WithdrawalEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WithdrawalEvent::WithdrawalRequested(_) => "WithdrawalRequested",
            WithdrawalEvent::WithdrawalApproved(_) => "WithdrawalApproved",
            WithdrawalEvent::WithdrawalCompleted(_) => "WithdrawalCompleted",
            WithdrawalEvent::WithdrawalRejected(_) => "WithdrawalRejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequestedData {
    pub withdrawal_id: WithdrawalId,
    pub seller_id: SellerId,
    pub user_id: UserId,
    pub amount: Money,
    pub method: PayoutMethod,
    /// Destination account reference on the payout rail.
    pub account: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalApprovedData {
    pub withdrawal_id: WithdrawalId,
    pub approved_by: UserId,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalCompletedData {
    pub withdrawal_id: WithdrawalId,
    pub transaction_id: TransactionId,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRejectedData {
    pub withdrawal_id: WithdrawalId,
    pub rejected_by: UserId,
    pub reason: Option<String>,
    pub rejected_at: DateTime<Utc>,
}
