//! Need domain events. Offers live inside the need's stream.

use chrono::{DateTime, Utc};
use common::{Money, NeedId, OfferId, OrderId, ProductId, SellerId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum NeedEvent {
    NeedCreated(NeedCreatedData),

    OfferSubmitted(OfferSubmittedData),

    /// A seller re-bid on their pending offer.
    OfferRevised(OfferRevisedData),

    OfferExpired(OfferExpiredData),

    /// One offer won; every other pending offer was rejected with it.
    OfferAccepted(OfferAcceptedData),

    NeedExpired(NeedExpiredData),

    NeedCancelled(NeedCancelledData),
}

impl DomainEvent for NeedEvent {
    fn event_type(&self) -> &'static str {
        match self {
            NeedEvent::NeedCreated(_) => "NeedCreated",
            NeedEvent::OfferSubmitted(_) => "OfferSubmitted",
            NeedEvent::OfferRevised(_) => "OfferRevised",
            NeedEvent::OfferExpired(_) => "OfferExpired",
            NeedEvent::OfferAccepted(_) => "OfferAccepted",
            NeedEvent::NeedExpired(_) => "NeedExpired",
            NeedEvent::NeedCancelled(_) => "NeedCancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeedCreatedData {
    pub need_id: NeedId,
    pub customer_id: UserId,
    pub product_id: ProductId,
    /// Operator or category tag, e.g. the mobile network.
    pub operator: String,
    pub mobile: String,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferSubmittedData {
    pub need_id: NeedId,
    pub offer_id: OfferId,
    pub seller_id: SellerId,
    pub price: Money,
    pub submitted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRevisedData {
    pub need_id: NeedId,
    pub offer_id: OfferId,
    pub price: Money,
    pub revised_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferExpiredData {
    pub need_id: NeedId,
    pub offer_id: OfferId,
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferAcceptedData {
    pub need_id: NeedId,
    pub offer_id: OfferId,
    pub order_id: OrderId,
    pub rejected_offers: Vec<OfferId>,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeedExpiredData {
    pub need_id: NeedId,
    pub expired_offers: Vec<OfferId>,
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeedCancelledData {
    pub need_id: NeedId,
    pub reason: String,
    pub rejected_offers: Vec<OfferId>,
    pub cancelled_at: DateTime<Utc>,
}
