//! Platform commission, one stream per order.
//!
//! Each completed order recognizes its commission on a stream derived from
//! the order id, so completions of unrelated orders never append to the
//! same stream. Platform revenue is the sum over all of these streams.

use common::{AggregateId, Money, OrderId};
use event_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, DomainEvent};

use super::{LedgerError, TransactionRecord};

const COMMISSION_NAMESPACE: Uuid = Uuid::from_u128(0x6d61726b_6574_636f_6d6d_697373696f6e);

/// The commission stream that belongs to `order_id`.
pub fn commission_stream(order_id: OrderId) -> AggregateId {
    AggregateId::from_uuid(Uuid::new_v5(
        &COMMISSION_NAMESPACE,
        order_id.as_uuid().as_bytes(),
    ))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PlatformCommissionEvent {
    CommissionRecognized(CommissionRecognizedData),
}

impl DomainEvent for PlatformCommissionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PlatformCommissionEvent::CommissionRecognized(_) => "PlatformCommissionRecognized",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRecognizedData {
    pub order_id: OrderId,
    pub record: TransactionRecord,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformCommission {
    order_id: Option<OrderId>,
    #[serde(default)]
    version: Version,
    record: Option<TransactionRecord>,
}

impl Aggregate for PlatformCommission {
    type Event = PlatformCommissionEvent;
    type Error = LedgerError;

    fn aggregate_type() -> &'static str {
        "PlatformCommission"
    }

    fn id(&self) -> Option<AggregateId> {
        self.order_id.map(commission_stream)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            PlatformCommissionEvent::CommissionRecognized(data) => {
                self.order_id = Some(data.order_id);
                self.record = Some(data.record);
            }
        }
    }
}

impl PlatformCommission {
    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn record(&self) -> Option<&TransactionRecord> {
        self.record.as_ref()
    }

    pub fn amount(&self) -> Money {
        self.record.as_ref().map(|r| r.amount).unwrap_or_default()
    }

    /// Records the commission earned on `order_id`. An order's commission
    /// is recognized at most once.
    pub fn recognize(
        &self,
        order_id: OrderId,
        record: TransactionRecord,
    ) -> Result<Vec<PlatformCommissionEvent>, LedgerError> {
        if self.record.is_some() {
            return Err(LedgerError::CommissionAlreadyRecognized(order_id));
        }
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

        Ok(vec![PlatformCommissionEvent::CommissionRecognized(
            CommissionRecognizedData { order_id, record },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerEntry, TransactionStatus, TransactionType};
    use chrono::Utc;
    use common::UserId;

    fn commission(cents: i64) -> TransactionRecord {
        TransactionRecord::from_entry(
            LedgerEntry::new(
                UserId::new(),
                Money::from_cents(cents),
                TransactionType::Commission,
                "commission",
            ),
            "TXN-test".to_string(),
            Money::from_cents(cents),
            TransactionStatus::Completed,
            Utc::now(),
        )
    }

    #[test]
    fn each_order_gets_its_own_stream() {
        let first = OrderId::new();
        let second = OrderId::new();
        assert_eq!(commission_stream(first), commission_stream(first));
        assert_ne!(commission_stream(first), commission_stream(second));
        assert_ne!(commission_stream(first), AggregateId::from(first));
    }

    #[test]
    fn commission_is_recognized_once() {
        let order_id = OrderId::new();
        let mut account = PlatformCommission::default();
        account.apply_events(account.recognize(order_id, commission(22_50)).unwrap());

        assert_eq!(account.amount(), Money::from_cents(22_50));
        assert_eq!(account.id(), Some(commission_stream(order_id)));

        let again = account.recognize(order_id, commission(22_50));
        assert!(matches!(
            again,
            Err(LedgerError::CommissionAlreadyRecognized(id)) if id == order_id
        ));
    }

    #[test]
    fn empty_commission_is_refused() {
        let result = PlatformCommission::default().recognize(OrderId::new(), commission(0));
        assert!(matches!(result, Err(LedgerError::NonPositiveAmount { .. })));
    }
}
