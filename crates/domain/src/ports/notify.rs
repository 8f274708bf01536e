//! Outbound domain notifications for the fan-out notifier.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use common::{SellerId, UserId};
use serde::{Deserialize, Serialize};

/// Named events the fan-out notifier understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "need.created")]
    NeedCreated,
    #[serde(rename = "need.cancelled")]
    NeedCancelled,
    #[serde(rename = "need.expired")]
    NeedExpired,
    #[serde(rename = "offer.submitted")]
    OfferSubmitted,
    #[serde(rename = "offer.accepted")]
    OfferAccepted,
    #[serde(rename = "offer.rejected")]
    OfferRejected,
    #[serde(rename = "offer.expired")]
    OfferExpired,
    #[serde(rename = "order.created")]
    OrderCreated,
    #[serde(rename = "order.assigned")]
    OrderAssigned,
    #[serde(rename = "order.processing")]
    OrderProcessing,
    #[serde(rename = "order.completed")]
    OrderCompleted,
    #[serde(rename = "order.cancelled")]
    OrderCancelled,
    #[serde(rename = "withdrawal.requested")]
    WithdrawalRequested,
    #[serde(rename = "withdrawal.completed")]
    WithdrawalCompleted,
    #[serde(rename = "withdrawal.rejected")]
    WithdrawalRejected,
    #[serde(rename = "wallet.credited")]
    WalletCredited,
    #[serde(rename = "wallet.debited")]
    WalletDebited,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NeedCreated => "need.created",
            NotificationKind::NeedCancelled => "need.cancelled",
            NotificationKind::NeedExpired => "need.expired",
            NotificationKind::OfferSubmitted => "offer.submitted",
            NotificationKind::OfferAccepted => "offer.accepted",
            NotificationKind::OfferRejected => "offer.rejected",
            NotificationKind::OfferExpired => "offer.expired",
            NotificationKind::OrderCreated => "order.created",
            NotificationKind::OrderAssigned => "order.assigned",
            NotificationKind::OrderProcessing => "order.processing",
            NotificationKind::OrderCompleted => "order.completed",
            NotificationKind::OrderCancelled => "order.cancelled",
            NotificationKind::WithdrawalRequested => "withdrawal.requested",
            NotificationKind::WithdrawalCompleted => "withdrawal.completed",
            NotificationKind::WithdrawalRejected => "withdrawal.rejected",
            NotificationKind::WalletCredited => "wallet.credited",
            NotificationKind::WalletDebited => "wallet.debited",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical addressee of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Recipient {
    User(UserId),
    Seller(SellerId),
    Admin,
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recipient::User(id) => write!(f, "user:{id}"),
            Recipient::Seller(id) => write!(f, "seller:{id}"),
            Recipient::Admin => f.write_str("admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipients: Vec<Recipient>,
    /// Entity ids relevant to the event.
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            recipients: Vec::new(),
            payload: serde_json::Value::Null,
            occurred_at,
        }
    }

    pub fn to(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    pub fn to_all(mut self, recipients: impl IntoIterator<Item = Recipient>) -> Self {
        self.recipients.extend(recipients);
        self
    }

    pub fn with(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_addressed_to(&self, recipient: Recipient) -> bool {
        self.recipients.contains(&recipient)
    }
}

/// Hands notifications to the notifier.
///
/// Must return promptly and never fail: notifications are published only
/// after the operation committed, and delivery problems stay on the
/// notifier's side.
pub trait Publisher: Send + Sync {
    fn publish(&self, notification: Notification);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn publish(&self, _notification: Notification) {}
}

/// Keeps every published notification for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.kind == kind)
            .collect()
    }

    pub fn clear(&self) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, notification: Notification) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}
