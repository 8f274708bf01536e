//! Open needs read model: active needs and their pending offers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, Money, NeedId, OfferId, ProductId, SellerId, UserId};
use domain::NeedEvent;
use event_store::{EventEnvelope, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenOffer {
    pub offer_id: OfferId,
    pub seller_id: SellerId,
    pub price: Money,
    pub expires_at: DateTime<Utc>,
}

/// A need still open for offers, as a seller dashboard lists it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenNeedSummary {
    pub need_id: NeedId,
    pub customer_id: UserId,
    pub product_id: ProductId,
    pub operator: String,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub offers: Vec<OpenOffer>,
}

impl OpenNeedSummary {
    pub fn offer_count(&self) -> usize {
        self.offers.len()
    }

    pub fn best_price(&self) -> Option<Money> {
        self.offers.iter().map(|o| o.price).min()
    }

    /// True when the need or one of its offers has lapsed at `now`.
    pub fn has_lapsed_state(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at || self.offers.iter().any(|o| now >= o.expires_at)
    }
}

#[derive(Debug, Default)]
struct State {
    needs: HashMap<NeedId, OpenNeedSummary>,
    position: ProjectionPosition,
}

/// Active needs keyed by id. A need leaves the view on acceptance,
/// expiry or cancellation; an offer leaves it when it expires.
#[derive(Clone, Default)]
pub struct OpenNeedsView {
    state: Arc<RwLock<State>>,
}

impl OpenNeedsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, need_id: NeedId) -> Option<OpenNeedSummary> {
        self.state.read().await.needs.get(&need_id).cloned()
    }

    /// Open needs, soonest expiry first. Lapsed ones the sweeper has not
    /// reached yet are left out.
    pub async fn open_at(&self, now: DateTime<Utc>) -> Vec<OpenNeedSummary> {
        let mut needs: Vec<_> = self
            .state
            .read()
            .await
            .needs
            .values()
            .filter(|n| now < n.expires_at)
            .cloned()
            .collect();
        needs.sort_by_key(|n| n.expires_at);
        needs
    }

    pub async fn for_product(&self, product_id: &ProductId, now: DateTime<Utc>) -> Vec<OpenNeedSummary> {
        self.open_at(now)
            .await
            .into_iter()
            .filter(|n| &n.product_id == product_id)
            .collect()
    }

    /// Needs whose expiry, or one of whose offers' expiry, has passed.
    pub async fn due_for_expiry(&self, now: DateTime<Utc>) -> Vec<NeedId> {
        self.state
            .read()
            .await
            .needs
            .values()
            .filter(|n| n.has_lapsed_state(now))
            .map(|n| n.need_id)
            .collect()
    }
}

impl ReadModel for OpenNeedsView {
    fn name(&self) -> &'static str {
        "OpenNeedsView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.needs.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Projection for OpenNeedsView {
    fn name(&self) -> &'static str {
        "OpenNeedsView"
    }

    fn source(&self) -> &'static str {
        "Need"
    }

    async fn apply(&self, event: &EventEnvelope) -> Result<()> {
        let need_event: NeedEvent = event.decode()?;
        let mut state = self.state.write().await;

        match need_event {
            NeedEvent::NeedCreated(data) => {
                state.needs.insert(
                    data.need_id,
                    OpenNeedSummary {
                        need_id: data.need_id,
                        customer_id: data.customer_id,
                        product_id: data.product_id,
                        operator: data.operator,
                        quantity: data.quantity,
                        created_at: data.created_at,
                        expires_at: data.expires_at,
                        offers: Vec::new(),
                    },
                );
            }
            NeedEvent::OfferSubmitted(data) => {
                if let Some(need) = state.needs.get_mut(&data.need_id) {
                    need.offers.push(OpenOffer {
                        offer_id: data.offer_id,
                        seller_id: data.seller_id,
                        price: data.price,
                        expires_at: data.expires_at,
                    });
                }
            }
            NeedEvent::OfferRevised(data) => {
                if let Some(offer) = state
                    .needs
                    .get_mut(&data.need_id)
                    .and_then(|n| n.offers.iter_mut().find(|o| o.offer_id == data.offer_id))
                {
                    offer.price = data.price;
                    offer.expires_at = data.expires_at;
                }
            }
            NeedEvent::OfferExpired(data) => {
                if let Some(need) = state.needs.get_mut(&data.need_id) {
                    need.offers.retain(|o| o.offer_id != data.offer_id);
                }
            }
            NeedEvent::OfferAccepted(data) => {
                state.needs.remove(&data.need_id);
            }
            NeedEvent::NeedExpired(data) => {
                state.needs.remove(&data.need_id);
            }
            NeedEvent::NeedCancelled(data) => {
                state.needs.remove(&data.need_id);
            }
        }

        Ok(())
    }

    async fn last_applied(&self, aggregate_id: AggregateId) -> Option<Version> {
        self.state.read().await.position.last_applied(aggregate_id)
    }

    async fn mark_applied(&self, event: &EventEnvelope) {
        self.state.write().await.position.record(event);
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = State::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::negotiation::{NeedCreatedData, OfferAcceptedData, OfferSubmittedData};

    fn envelope(need_id: NeedId, version: i64, event: &NeedEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(need_id)
            .aggregate_type("Need")
            .event_type(domain::DomainEvent::event_type(event))
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    fn created(need_id: NeedId, now: DateTime<Utc>) -> NeedEvent {
        NeedEvent::NeedCreated(NeedCreatedData {
            need_id,
            customer_id: UserId::new(),
            product_id: ProductId::from("airtime-50"),
            operator: "airtel".into(),
            mobile: "0733000000".into(),
            quantity: 1,
            created_at: now,
            expires_at: now + Duration::minutes(30),
        })
    }

    fn offer(need_id: NeedId, units: i64, expires_at: DateTime<Utc>) -> NeedEvent {
        NeedEvent::OfferSubmitted(OfferSubmittedData {
            need_id,
            offer_id: OfferId::new(),
            seller_id: SellerId::new(),
            price: Money::from_units(units),
            submitted_at: expires_at - Duration::minutes(30),
            expires_at,
        })
    }

    #[tokio::test]
    async fn tracks_offers_until_acceptance() {
        let view = OpenNeedsView::new();
        let need_id = NeedId::new();
        let now = Utc::now();

        view.apply(&envelope(need_id, 1, &created(need_id, now))).await.unwrap();
        view.apply(&envelope(need_id, 2, &offer(need_id, 60, now + Duration::minutes(30))))
            .await
            .unwrap();
        view.apply(&envelope(need_id, 3, &offer(need_id, 55, now + Duration::minutes(30))))
            .await
            .unwrap();

        let summary = view.get(need_id).await.unwrap();
        assert_eq!(summary.offer_count(), 2);
        assert_eq!(summary.best_price(), Some(Money::from_units(55)));
        assert_eq!(view.for_product(&ProductId::from("airtime-50"), now).await.len(), 1);

        let accepted = NeedEvent::OfferAccepted(OfferAcceptedData {
            need_id,
            offer_id: summary.offers[1].offer_id,
            order_id: common::OrderId::new(),
            rejected_offers: vec![summary.offers[0].offer_id],
            accepted_at: now,
        });
        view.apply(&envelope(need_id, 4, &accepted)).await.unwrap();
        assert!(view.get(need_id).await.is_none());
    }

    #[tokio::test]
    async fn lapsed_needs_and_offers_are_due() {
        let view = OpenNeedsView::new();
        let now = Utc::now();

        let quiet = NeedId::new();
        view.apply(&envelope(quiet, 1, &created(quiet, now))).await.unwrap();

        let stale_offer = NeedId::new();
        view.apply(&envelope(stale_offer, 1, &created(stale_offer, now)))
            .await
            .unwrap();
        view.apply(&envelope(stale_offer, 2, &offer(stale_offer, 10, now + Duration::minutes(5))))
            .await
            .unwrap();

        let later = now + Duration::minutes(10);
        assert_eq!(view.due_for_expiry(later).await, vec![stale_offer]);

        let after_expiry = now + Duration::minutes(30);
        let mut due = view.due_for_expiry(after_expiry).await;
        due.sort();
        let mut expected = vec![quiet, stale_offer];
        expected.sort();
        assert_eq!(due, expected);
        assert!(view.open_at(after_expiry).await.is_empty());
    }
}
