//! Ledger entries and their numbering.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use common::{Money, OrderId, TransactionId, UserId, WithdrawalId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    OrderPayment,
    OrderRefund,
    Commission,
    Payout,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::OrderPayment => "order_payment",
            TransactionType::OrderRefund => "order_refund",
            TransactionType::Commission => "commission",
            TransactionType::Payout => "payout",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        })
    }
}

/// Final state of a pending transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementOutcome {
    Completed,
    Failed,
}

impl From<SettlementOutcome> for TransactionStatus {
    fn from(outcome: SettlementOutcome) -> Self {
        match outcome {
            SettlementOutcome::Completed => TransactionStatus::Completed,
            SettlementOutcome::Failed => TransactionStatus::Failed,
        }
    }
}

/// The entity a transaction moved money for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity", content = "id", rename_all = "lowercase")]
pub enum TransactionLink {
    Order(OrderId),
    Withdrawal(WithdrawalId),
}

/// What a caller asks the ledger to record. `amount` is the magnitude; the
/// ledger operation decides the sign.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub amount: Money,
    pub tx_type: TransactionType,
    pub link: Option<TransactionLink>,
    pub description: String,
}

impl LedgerEntry {
    pub fn new(
        user_id: UserId,
        amount: Money,
        tx_type: TransactionType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            amount,
            tx_type,
            link: None,
            description: description.into(),
        }
    }

    pub fn linked(mut self, link: TransactionLink) -> Self {
        self.link = Some(link);
        self
    }
}

/// Append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    /// Human-facing unique number.
    pub number: String,
    pub user_id: UserId,
    pub tx_type: TransactionType,
    /// Signed: negative amounts leave the account.
    pub amount: Money,
    pub status: TransactionStatus,
    pub link: Option<TransactionLink>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    pub fn from_entry(
        entry: LedgerEntry,
        number: String,
        amount: Money,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: TransactionId::new(),
            number,
            user_id: entry.user_id,
            tx_type: entry.tx_type,
            amount,
            status,
            link: entry.link,
            description: entry.description,
            created_at: at,
            settled_at: (status != TransactionStatus::Pending).then_some(at),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}

/// Allocates transaction numbers.
///
/// A number is `TXN-<unix millis>-<node>-<sequence>`: the sequence comes
/// from an atomic counter, and the node is a random v4 UUID drawn per
/// process, so processes sharing one store cannot hand out the same
/// number.
#[derive(Debug)]
pub struct TransactionNumbers {
    node: Uuid,
    sequence: AtomicU64,
}

impl TransactionNumbers {
    pub fn new() -> Self {
        Self::with_node(Uuid::new_v4())
    }

    pub fn with_node(node: Uuid) -> Self {
        Self {
            node,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn node(&self) -> Uuid {
        self.node
    }

    pub fn allocate(&self, at: DateTime<Utc>) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!(
            "TXN-{}-{}-{:06}",
            at.timestamp_millis(),
            self.node.simple(),
            sequence
        )
    }
}

impl Default for TransactionNumbers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn numbers_embed_time_node_and_sequence() {
        let node = Uuid::from_u128(0xAB);
        let numbers = TransactionNumbers::with_node(node);
        let at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        assert_eq!(
            numbers.allocate(at),
            "TXN-1700000000000-000000000000000000000000000000ab-000001"
        );
        assert_eq!(
            numbers.allocate(at),
            "TXN-1700000000000-000000000000000000000000000000ab-000002"
        );
    }

    #[test]
    fn replicas_starting_together_do_not_collide() {
        let at = Utc::now();
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            let replica = TransactionNumbers::new();
            assert!(seen.insert(replica.allocate(at)));
        }
        assert_eq!(seen.len(), 1_000);
    }

    #[test]
    fn concurrent_allocation_never_repeats() {
        let numbers = Arc::new(TransactionNumbers::new());
        let at = Utc::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let numbers = numbers.clone();
                std::thread::spawn(move || {
                    (0..500).map(|_| numbers.allocate(at)).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for number in handle.join().unwrap() {
                assert!(seen.insert(number));
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn completed_records_are_settled_on_creation() {
        let entry = LedgerEntry::new(
            UserId::new(),
            Money::from_units(5),
            TransactionType::Deposit,
            "top up",
        );
        let now = Utc::now();
        let pending = TransactionRecord::from_entry(
            entry.clone(),
            "n1".into(),
            Money::from_units(5),
            TransactionStatus::Pending,
            now,
        );
        assert!(pending.settled_at.is_none());

        let done = TransactionRecord::from_entry(
            entry,
            "n2".into(),
            Money::from_units(5),
            TransactionStatus::Completed,
            now,
        );
        assert_eq!(done.settled_at, Some(now));
        assert!(done.is_completed());
    }

    #[test]
    fn types_serialize_snake_case() {
        let json = serde_json::to_string(&TransactionType::OrderRefund).unwrap();
        assert_eq!(json, "\"order_refund\"");
    }
}
