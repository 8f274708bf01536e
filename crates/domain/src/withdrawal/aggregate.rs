//! Withdrawal aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, SellerId, TransactionId, UserId, WithdrawalId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    PayoutMethod, WithdrawalError, WithdrawalEvent, WithdrawalStatus,
    events::{
        WithdrawalApprovedData, WithdrawalCompletedData, WithdrawalRejectedData,
        WithdrawalRequestedData,
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Withdrawal {
    id: Option<WithdrawalId>,
    #[serde(default)]
    version: Version,
    seller_id: Option<SellerId>,
    user_id: Option<UserId>,
    amount: Money,
    method: Option<PayoutMethod>,
    account: String,
    status: WithdrawalStatus,
    requested_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
    resolved_by: Option<UserId>,
    rejection_reason: Option<String>,
    transaction_id: Option<TransactionId>,
}

impl Aggregate for Withdrawal {
    type Event = WithdrawalEvent;
    type Error = WithdrawalError;

    fn aggregate_type() -> &'static str {
        "Withdrawal"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.map(Into::into)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            WithdrawalEvent::WithdrawalRequested(data) => {
                self.id = Some(data.withdrawal_id);
                self.seller_id = Some(data.seller_id);
                self.user_id = Some(data.user_id);
                self.amount = data.amount;
                self.method = Some(data.method);
                self.account = data.account;
                self.status = WithdrawalStatus::Pending;
                self.requested_at = Some(data.requested_at);
            }
            WithdrawalEvent::WithdrawalApproved(data) => {
                self.status = WithdrawalStatus::Approved;
                self.resolved_by = Some(data.approved_by);
                self.resolved_at = Some(data.approved_at);
            }
            WithdrawalEvent::WithdrawalCompleted(data) => {
                self.status = WithdrawalStatus::Completed;
                self.transaction_id = Some(data.transaction_id);
            }
            WithdrawalEvent::WithdrawalRejected(data) => {
                self.status = WithdrawalStatus::Rejected;
                self.resolved_by = Some(data.rejected_by);
                self.resolved_at = Some(data.rejected_at);
                self.rejection_reason = data.reason;
            }
        }
    }
}

// Query methods
impl Withdrawal {
    pub fn withdrawal_id(&self) -> Option<WithdrawalId> {
        self.id
    }

    pub fn seller_id(&self) -> Option<SellerId> {
        self.seller_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn method(&self) -> Option<PayoutMethod> {
        self.method
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn status(&self) -> WithdrawalStatus {
        self.status
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn resolved_by(&self) -> Option<UserId> {
        self.resolved_by
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }
}

// Command methods
impl Withdrawal {
    #[allow(clippy::too_many_arguments)]
    pub fn request(
        &self,
        withdrawal_id: WithdrawalId,
        seller_id: SellerId,
        user_id: UserId,
        amount: Money,
        method: PayoutMethod,
        account: &str,
        minimum: Money,
        at: DateTime<Utc>,
    ) -> Result<Vec<WithdrawalEvent>, WithdrawalError> {
        if self.id.is_some() {
            return Err(WithdrawalError::AlreadyRequested);
        }

        if amount < minimum {
            return Err(WithdrawalError::BelowMinimum {
                minimum,
                requested: amount,
            });
        }

        if account.trim().is_empty() {
            return Err(WithdrawalError::MissingAccount);
        }

        Ok(vec![WithdrawalEvent::WithdrawalRequested(
            WithdrawalRequestedData {
                withdrawal_id,
                seller_id,
                user_id,
                amount,
                method,
                account: account.to_string(),
                requested_at: at,
            },
        )])
    }

    /// The withdrawal id, if it still awaits a decision.
    pub fn ensure_pending(&self) -> Result<WithdrawalId, WithdrawalError> {
        let withdrawal_id = self.id.ok_or(WithdrawalError::NotPending {
            status: self.status,
        })?;
        if !self.status.can_resolve() {
            return Err(WithdrawalError::NotPending {
                status: self.status,
            });
        }
        Ok(withdrawal_id)
    }

    /// Approval and settlement in one step.
    pub fn approve(
        &self,
        admin_id: UserId,
        transaction_id: TransactionId,
        at: DateTime<Utc>,
    ) -> Result<Vec<WithdrawalEvent>, WithdrawalError> {
        let withdrawal_id = self.ensure_pending()?;

        Ok(vec![
            WithdrawalEvent::WithdrawalApproved(WithdrawalApprovedData {
                withdrawal_id,
                approved_by: admin_id,
                approved_at: at,
            }),
            WithdrawalEvent::WithdrawalCompleted(WithdrawalCompletedData {
                withdrawal_id,
                transaction_id,
                completed_at: at,
            }),
        ])
    }

    pub fn reject(
        &self,
        admin_id: UserId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Vec<WithdrawalEvent>, WithdrawalError> {
        let withdrawal_id = self.ensure_pending()?;

        Ok(vec![WithdrawalEvent::WithdrawalRejected(
            WithdrawalRejectedData {
                withdrawal_id,
                rejected_by: admin_id,
                reason,
                rejected_at: at,
            },
        )])
    }
}
