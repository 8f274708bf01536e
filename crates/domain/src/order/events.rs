//! Order domain events.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, Role, SellerId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{OrderSource, PaymentMethod, PaymentStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderPlaced(OrderPlacedData),

    /// The seller took the order.
    OrderAssigned(OrderAssignedData),

    OrderProcessingStarted(OrderProcessingStartedData),

    /// Fulfilled; the seller's share was credited in the same commit.
    OrderCompleted(OrderCompletedData),

    OrderCancelled(OrderCancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderAssigned(_) => "OrderAssigned",
            OrderEvent::OrderProcessingStarted(_) => "OrderProcessingStarted",
            OrderEvent::OrderCompleted(_) => "OrderCompleted",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub seller_id: SellerId,
    pub product_id: ProductId,
    /// Delivery target, such as the phone number to top up.
    pub mobile: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub total_amount: Money,
    pub commission: Money,
    pub seller_amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// The wallet debit, when paid from the wallet.
    pub payment_transaction_id: Option<TransactionId>,
    pub source: OrderSource,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAssignedData {
    pub order_id: OrderId,
    pub seller_id: SellerId,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProcessingStartedData {
    pub order_id: OrderId,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedData {
    pub order_id: OrderId,
    pub payout_transaction_id: TransactionId,
    pub commission_transaction_id: Option<TransactionId>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub order_id: OrderId,
    pub cancelled_by: UserId,
    pub role: Role,
    pub reason: String,
    pub refund_transaction_id: Option<TransactionId>,
    pub cancelled_at: DateTime<Utc>,
}
