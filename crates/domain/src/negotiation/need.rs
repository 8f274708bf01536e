//! Need aggregate with its offers.
//!
//! A need and every offer made against it share one stream, so accepting
//! an offer and rejecting the others is a single conditional append.

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, Money, NeedId, OfferId, OrderId, ProductId, SellerId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::policy::MAX_QUANTITY;

use super::{
    CreateNeed, NeedError, NeedEvent, NeedStatus, OfferStatus,
    events::{
        NeedCancelledData, NeedCreatedData, NeedExpiredData, OfferAcceptedData, OfferExpiredData,
        OfferRevisedData, OfferSubmittedData,
    },
};

/// One seller's bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: OfferId,
    pub seller_id: SellerId,
    pub price: Money,
    pub status: OfferStatus,
    pub submitted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Number of re-bids folded into this offer.
    pub revisions: u32,
}

impl Offer {
    /// Stored as pending but past its expiry.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Pending && now >= self.expires_at
    }

    /// Pending and still within its lifetime.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Pending && now < self.expires_at
    }

    /// Status as a reader at `now` should see it.
    pub fn effective_status(&self, now: DateTime<Utc>) -> OfferStatus {
        if self.is_lapsed(now) {
            OfferStatus::Expired
        } else {
            self.status
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Need {
    id: Option<NeedId>,
    #[serde(default)]
    version: Version,
    customer_id: Option<UserId>,
    product_id: ProductId,
    operator: String,
    mobile: String,
    quantity: u32,
    status: NeedStatus,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    accepted_offer_id: Option<OfferId>,
    accepted_order_id: Option<OrderId>,
    cancellation_reason: Option<String>,
    /// In submission order.
    offers: Vec<Offer>,
}

impl Aggregate for Need {
    type Event = NeedEvent;
    type Error = NeedError;

    fn aggregate_type() -> &'static str {
        "Need"
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
            NeedEvent::NeedCreated(data) => {
                self.id = Some(data.need_id);
                self.customer_id = Some(data.customer_id);
                self.product_id = data.product_id;
                self.operator = data.operator;
                self.mobile = data.mobile;
                self.quantity = data.quantity;
                self.status = NeedStatus::Active;
                self.created_at = data.created_at;
                self.expires_at = data.expires_at;
            }
            NeedEvent::OfferSubmitted(data) => self.offers.push(Offer {
                offer_id: data.offer_id,
                seller_id: data.seller_id,
                price: data.price,
                status: OfferStatus::Pending,
                submitted_at: data.submitted_at,
                expires_at: data.expires_at,
                revisions: 0,
            }),
            NeedEvent::OfferRevised(data) => {
                if let Some(offer) = self.offer_mut(data.offer_id) {
                    offer.price = data.price;
                    offer.submitted_at = data.revised_at;
                    offer.expires_at = data.expires_at;
                    offer.revisions += 1;
                }
            }
            NeedEvent::OfferExpired(data) => {
                self.set_offer_status(&[data.offer_id], OfferStatus::Expired);
            }
            NeedEvent::OfferAccepted(data) => {
                self.set_offer_status(&[data.offer_id], OfferStatus::Accepted);
                self.set_offer_status(&data.rejected_offers, OfferStatus::Rejected);
                self.status = NeedStatus::Accepted;
                self.accepted_offer_id = Some(data.offer_id);
                self.accepted_order_id = Some(data.order_id);
                self.closed_at = Some(data.accepted_at);
            }
            NeedEvent::NeedExpired(data) => {
                self.set_offer_status(&data.expired_offers, OfferStatus::Expired);
                self.status = NeedStatus::Expired;
                self.closed_at = Some(data.expired_at);
            }
            NeedEvent::NeedCancelled(data) => {
                self.set_offer_status(&data.rejected_offers, OfferStatus::Rejected);
                self.status = NeedStatus::Cancelled;
                self.cancellation_reason = Some(data.reason);
                self.closed_at = Some(data.cancelled_at);
            }
        }
    }
}

// Query methods
impl Need {
    pub fn need_id(&self) -> Option<NeedId> {
        self.id
    }

    pub fn customer_id(&self) -> Option<UserId> {
        self.customer_id
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn mobile(&self) -> &str {
        &self.mobile
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Stored status. See [`Need::effective_status`] for the lazily
    /// expired view.
    pub fn status(&self) -> NeedStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn accepted_offer_id(&self) -> Option<OfferId> {
        self.accepted_offer_id
    }

    pub fn accepted_order_id(&self) -> Option<OrderId> {
        self.accepted_order_id
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn offer(&self, offer_id: OfferId) -> Option<&Offer> {
        self.offers.iter().find(|o| o.offer_id == offer_id)
    }

    /// The seller's offer that is still stored as pending, if any.
    pub fn pending_offer_of(&self, seller_id: SellerId) -> Option<&Offer> {
        self.offers
            .iter()
            .find(|o| o.seller_id == seller_id && o.status == OfferStatus::Pending)
    }

    pub fn pending_offers(&self) -> impl Iterator<Item = &Offer> {
        self.offers
            .iter()
            .filter(|o| o.status == OfferStatus::Pending)
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.customer_id == Some(user_id)
    }

    /// Active in storage but past `expires_at`.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == NeedStatus::Active && now >= self.expires_at
    }

    pub fn effective_status(&self, now: DateTime<Utc>) -> NeedStatus {
        if self.is_lapsed(now) {
            NeedStatus::Expired
        } else {
            self.status
        }
    }
}

// Command methods
impl Need {
    pub fn create(
        &self,
        need_id: NeedId,
        customer_id: UserId,
        cmd: &CreateNeed,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Vec<NeedEvent>, NeedError> {
        if self.id.is_some() {
            return Err(NeedError::AlreadyCreated);
        }

        if cmd.quantity < 1 || cmd.quantity > MAX_QUANTITY {
            return Err(NeedError::InvalidQuantity {
                quantity: cmd.quantity,
            });
        }

        Ok(vec![NeedEvent::NeedCreated(NeedCreatedData {
            need_id,
            customer_id,
            product_id: cmd.product_id.clone(),
            operator: cmd.operator.clone(),
            mobile: cmd.mobile.clone(),
            quantity: cmd.quantity,
            created_at: now,
            expires_at: now + ttl,
        })])
    }

    /// Records a bid. A seller with a pending offer revises it instead of
    /// adding a second one; if that offer already lapsed it is closed as
    /// expired and a fresh offer opened.
    pub fn submit_offer(
        &self,
        offer_id: OfferId,
        seller_id: SellerId,
        price: Money,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Vec<NeedEvent>, NeedError> {
        let need_id = self.ensure_open(now)?;

        if !price.is_positive() || !price.is_within_limit() {
            return Err(NeedError::InvalidPrice { price });
        }
        if !price
            .checked_mul(self.quantity)
            .is_some_and(|total| total.is_within_limit())
        {
            return Err(NeedError::TotalOutOfRange {
                price,
                quantity: self.quantity,
            });
        }

        let expires_at = now + ttl;
        let mut events = Vec::new();

        if let Some(existing) = self.pending_offer_of(seller_id) {
            if !existing.is_lapsed(now) {
                return Ok(vec![NeedEvent::OfferRevised(OfferRevisedData {
                    need_id,
                    offer_id: existing.offer_id,
                    price,
                    revised_at: now,
                    expires_at,
                })]);
            }

            events.push(NeedEvent::OfferExpired(OfferExpiredData {
                need_id,
                offer_id: existing.offer_id,
                expired_at: now,
            }));
        }

        events.push(NeedEvent::OfferSubmitted(OfferSubmittedData {
            need_id,
            offer_id,
            seller_id,
            price,
            submitted_at: now,
            expires_at,
        }));
        Ok(events)
    }

    /// Checks that `customer_id` may accept `offer_id` at `now` and returns
    /// the offer.
    pub fn acceptable_offer(
        &self,
        customer_id: UserId,
        offer_id: OfferId,
        now: DateTime<Utc>,
    ) -> Result<&Offer, NeedError> {
        if !self.is_owned_by(customer_id) {
            return Err(NeedError::NotOwner);
        }

        match self.status {
            NeedStatus::Active if self.is_lapsed(now) => return Err(NeedError::NeedExpired),
            NeedStatus::Active => {}
            NeedStatus::Accepted => return Err(NeedError::OfferNotAvailable(offer_id)),
            status => return Err(NeedError::NeedNotAvailable { status }),
        }

        match self.offer(offer_id) {
            Some(offer) if offer.is_open(now) => Ok(offer),
            _ => Err(NeedError::OfferNotAvailable(offer_id)),
        }
    }

    /// Accepts one offer and rejects every other pending one.
    pub fn accept_offer(
        &self,
        customer_id: UserId,
        offer_id: OfferId,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Vec<NeedEvent>, NeedError> {
        self.acceptable_offer(customer_id, offer_id, now)?;
        let need_id = self.id.ok_or(NeedError::NotOwner)?;

        let rejected_offers = self
            .pending_offers()
            .filter(|o| o.offer_id != offer_id)
            .map(|o| o.offer_id)
            .collect();

        Ok(vec![NeedEvent::OfferAccepted(OfferAcceptedData {
            need_id,
            offer_id,
            order_id,
            rejected_offers,
            accepted_at: now,
        })])
    }

    pub fn cancel(
        &self,
        customer_id: UserId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<NeedEvent>, NeedError> {
        if !self.is_owned_by(customer_id) {
            return Err(NeedError::NotOwner);
        }
        let need_id = self.ensure_open(now)?;

        Ok(vec![NeedEvent::NeedCancelled(NeedCancelledData {
            need_id,
            reason: reason.into(),
            rejected_offers: self.pending_offers().map(|o| o.offer_id).collect(),
            cancelled_at: now,
        })])
    }

    /// Persists whatever has lapsed by `now`. Returns no events when
    /// nothing has, or when the need is already closed.
    pub fn expire(&self, now: DateTime<Utc>) -> Result<Vec<NeedEvent>, NeedError> {
        let Some(need_id) = self.id else {
            return Ok(Vec::new());
        };
        if self.status.is_terminal() {
            return Ok(Vec::new());
        }

        if self.is_lapsed(now) {
            return Ok(vec![NeedEvent::NeedExpired(NeedExpiredData {
                need_id,
                expired_offers: self.pending_offers().map(|o| o.offer_id).collect(),
                expired_at: now,
            })]);
        }

        Ok(self
            .pending_offers()
            .filter(|o| o.is_lapsed(now))
            .map(|o| {
                NeedEvent::OfferExpired(OfferExpiredData {
                    need_id,
                    offer_id: o.offer_id,
                    expired_at: now,
                })
            })
            .collect())
    }

    /// The need id, if the need still takes offers at `now`.
    pub fn ensure_open(&self, now: DateTime<Utc>) -> Result<NeedId, NeedError> {
        let need_id = match self.id {
            Some(id) => id,
            None => return Err(NeedError::NeedNotAvailable { status: self.status }),
        };

        if self.status != NeedStatus::Active {
            return Err(NeedError::NeedNotAvailable {
                status: self.status,
            });
        }
        if self.is_lapsed(now) {
            return Err(NeedError::NeedExpired);
        }
        Ok(need_id)
    }
}

// Apply helpers
impl Need {
    fn offer_mut(&mut self, offer_id: OfferId) -> Option<&mut Offer> {
        self.offers.iter_mut().find(|o| o.offer_id == offer_id)
    }

    fn set_offer_status(&mut self, offer_ids: &[OfferId], status: OfferStatus) {
        for offer in self
            .offers
            .iter_mut()
            .filter(|o| offer_ids.contains(&o.offer_id))
        {
            offer.status = status;
        }
    }
}
