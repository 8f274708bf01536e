//! Negotiation engine: broadcasting needs, collecting offers and the
//! exactly-once acceptance.

use common::{AggregateId, Caller, NeedId, OfferId, OrderId, Role};
use event_store::EventStore;
use serde_json::json;

use crate::access::{ensure_active, ensure_role, seller_profile};
use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::ledger::TransactionRecord;
use crate::order::{Order, OrderEngine, OrderSource, PlaceOrder, PlacedOrder};
use crate::policy::{MAX_QUANTITY, MarketPolicy};
use crate::ports::{MarketPorts, Notification, NotificationKind, Recipient};
use crate::retry::with_conflict_retry;
use crate::unit_of_work::UnitOfWork;

use super::{
    AcceptOffer, CancelNeed, CreateNeed, Need, NeedError, NeedEvent, Offer, OfferStatus,
    SubmitOffer,
};

/// Outcome of a successful acceptance.
#[derive(Debug, Clone)]
pub struct AcceptedOffer {
    pub need: Need,
    pub order: Order,
    pub payment: Option<TransactionRecord>,
}

/// What one expiry pass persisted for a need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryReport {
    pub need_expired: bool,
    pub expired_offers: Vec<OfferId>,
}

impl ExpiryReport {
    pub fn is_empty(&self) -> bool {
        !self.need_expired && self.expired_offers.is_empty()
    }
}

/// Owns need and offer status transitions.
pub struct NegotiationEngine<S> {
    needs: CommandHandler<S, Need>,
    orders: OrderEngine<S>,
    ports: MarketPorts,
    policy: MarketPolicy,
}

impl<S: Clone> Clone for NegotiationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            needs: self.needs.clone(),
            orders: self.orders.clone(),
            ports: self.ports.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S: EventStore + Clone> NegotiationEngine<S> {
    pub fn new(
        store: S,
        orders: OrderEngine<S>,
        ports: MarketPorts,
        policy: MarketPolicy,
    ) -> Self {
        Self {
            needs: CommandHandler::new(store),
            orders,
            ports,
            policy,
        }
    }

    fn store(&self) -> &S {
        self.needs.store()
    }

    /// Opens a need and tells every eligible seller about it.
    ///
    /// The broadcast happens after commit; a presence lookup failure is
    /// logged and leaves the need in place.
    #[tracing::instrument(skip(self))]
    pub async fn create_need(&self, caller: &Caller, cmd: CreateNeed) -> Result<Need, DomainError> {
        ensure_role(caller, Role::Customer)?;
        if cmd.quantity < 1 || cmd.quantity > MAX_QUANTITY {
            return Err(NeedError::InvalidQuantity {
                quantity: cmd.quantity,
            }
            .into());
        }
        if cmd.mobile.trim().is_empty() {
            return Err(DomainError::validation("mobile", "is required"));
        }

        let product = self.ports.catalog.resolve_product(&cmd.product_id).await?;
        if !product.is_available() {
            return Err(NeedError::ProductUnavailable(cmd.product_id.clone()).into());
        }

        let need_id = NeedId::new();
        let at = self.ports.clock.now();
        let result = self
            .needs
            .execute(need_id.into(), at, |need| {
                need.create(need_id, caller.user_id, &cmd, at, self.policy.need_ttl)
            })
            .await?;
        let need = result.aggregate;

        metrics::counter!("needs_created_total").increment(1);

        match self
            .ports
            .presence
            .list_eligible_sellers(need.product_id())
            .await
        {
            Ok(sellers) => {
                tracing::info!(%need_id, notified = sellers.len(), "need created");
                self.ports.publish_all(sellers.into_iter().map(|seller_id| {
                    Notification::new(NotificationKind::NeedCreated, at)
                        .to(Recipient::Seller(seller_id))
                        .with(need_payload(&need))
                }));
            }
            Err(e) => {
                tracing::warn!(%need_id, error = %e, "need created but sellers could not be listed");
            }
        }

        Ok(need)
    }

    /// Records or refreshes the calling seller's offer.
    #[tracing::instrument(skip(self, cmd), fields(need_id = %cmd.need_id))]
    pub async fn submit_offer(&self, caller: &Caller, cmd: SubmitOffer) -> Result<Offer, DomainError> {
        let seller = seller_profile(&self.ports, caller).await?;
        if !seller.approved {
            return Err(NeedError::SellerNotApproved.into());
        }
        if !self.ports.presence.is_online(seller.seller_id).await? {
            return Err(NeedError::SellerOffline.into());
        }

        let need_id = cmd.need_id;
        let need = self.existing(need_id).await?;
        need.ensure_open(self.ports.clock.now())?;

        let listed = self
            .ports
            .catalog
            .get_listing(need.product_id(), seller.seller_id)
            .await?;
        if !listed.is_some_and(|l| l.active) {
            return Err(NeedError::NotListed {
                product_id: need.product_id().clone(),
            }
            .into());
        }

        let seller_id = seller.seller_id;
        let price = cmd.price;
        let result = with_conflict_retry(
            "submit_offer",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                self.needs
                    .execute(need_id.into(), at, |need| {
                        need.submit_offer(OfferId::new(), seller_id, price, at, self.policy.offer_ttl)
                    })
                    .await
            },
        )
        .await?;

        let need = result.aggregate;
        let offer = need
            .pending_offer_of(seller_id)
            .cloned()
            .ok_or_else(|| DomainError::Infrastructure("submitted offer not found".into()))?;

        let revision = if offer.revisions > 0 { "revised" } else { "new" };
        metrics::counter!("offers_submitted_total", "kind" => revision).increment(1);
        tracing::info!(offer_id = %offer.offer_id, price = %offer.price, revision, "offer submitted");

        if let Some(customer_id) = need.customer_id() {
            self.ports.publisher.publish(
                Notification::new(NotificationKind::OfferSubmitted, offer.submitted_at)
                    .to(Recipient::User(customer_id))
                    .with(offer_payload(need_id, &offer)),
            );
        }

        Ok(offer)
    }

    /// Accepts one offer: the order, the wallet debit and every need and
    /// offer transition commit together or not at all. Of several racing
    /// acceptances on one need exactly one wins; the rest re-run against
    /// the winner's state and fail with `OfferNotAvailable`.
    #[tracing::instrument(skip(self, cmd), fields(need_id = %cmd.need_id, offer_id = %cmd.offer_id))]
    pub async fn accept_offer(
        &self,
        caller: &Caller,
        cmd: AcceptOffer,
    ) -> Result<AcceptedOffer, DomainError> {
        ensure_role(caller, Role::Customer)?;
        let need_id = cmd.need_id;
        self.existing(need_id).await?;

        let customer_id = caller.user_id;
        let cmd = &cmd;
        let accepted = with_conflict_retry(
            "accept_offer",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                let mut uow = UnitOfWork::new(at);
                let stream = AggregateId::from(need_id);

                let mut need = self.needs.load_in(&uow, stream).await?;
                let offer = need
                    .acceptable_offer(customer_id, cmd.offer_id, at)?
                    .clone();

                let order_id = OrderId::new();
                let placed = self
                    .orders
                    .stage_place(
                        &mut uow,
                        PlaceOrder {
                            order_id,
                            customer_id,
                            seller_id: offer.seller_id,
                            product_id: need.product_id().clone(),
                            mobile: need.mobile().to_string(),
                            unit_price: offer.price,
                            quantity: need.quantity(),
                            payment_method: cmd.payment_method,
                            source: OrderSource::Negotiated {
                                need_id,
                                offer_id: offer.offer_id,
                            },
                        },
                        at,
                    )
                    .await?;

                let events = need.accept_offer(customer_id, cmd.offer_id, order_id, at)?;
                uow.stage(&mut need, stream, events)?;
                uow.commit(self.store()).await?;

                Ok(AcceptedOffer {
                    need,
                    order: placed.order,
                    payment: placed.payment,
                })
            },
        )
        .await?;

        metrics::counter!("offers_accepted_total").increment(1);
        tracing::info!(
            order_id = ?accepted.order.order_id(),
            total = %accepted.order.total_amount(),
            "offer accepted"
        );

        self.orders.announce_placed(&PlacedOrder {
            order: accepted.order.clone(),
            payment: accepted.payment.clone(),
        });
        self.announce_offer_outcomes(&accepted.need);

        Ok(accepted)
    }

    /// Withdraws an open need; pending offers are rejected with it.
    #[tracing::instrument(skip(self, cmd), fields(need_id = %cmd.need_id))]
    pub async fn cancel_need(&self, caller: &Caller, cmd: CancelNeed) -> Result<Need, DomainError> {
        ensure_role(caller, Role::Customer)?;
        let need_id = cmd.need_id;
        self.existing(need_id).await?;

        let customer_id = caller.user_id;
        let reason = cmd.reason.as_str();
        let result = with_conflict_retry(
            "cancel_need",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                self.needs
                    .execute(need_id.into(), at, |need| need.cancel(customer_id, reason, at))
                    .await
            },
        )
        .await?;

        let need = result.aggregate;
        tracing::info!(%need_id, "need cancelled");

        let at = need.closed_at().unwrap_or_else(|| self.ports.clock.now());
        self.ports.publisher.publish(
            Notification::new(NotificationKind::NeedCancelled, at)
                .to(Recipient::User(customer_id))
                .with(need_payload(&need)),
        );
        self.announce_offer_outcomes(&need);
        Ok(need)
    }

    /// Persists any lapse of the need or its offers. Safe to call at any
    /// time; a closed or unknown need yields an empty report.
    #[tracing::instrument(skip(self))]
    pub async fn expire_stale(&self, need_id: NeedId) -> Result<ExpiryReport, DomainError> {
        let result = with_conflict_retry(
            "expire_stale",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                self.needs
                    .execute(need_id.into(), at, |need| need.expire(at))
                    .await
            },
        )
        .await?;

        let mut report = ExpiryReport::default();
        let mut at = None;
        for event in &result.events {
            match event {
                NeedEvent::NeedExpired(data) => {
                    report.need_expired = true;
                    report.expired_offers.extend(data.expired_offers.iter().copied());
                    at = Some(data.expired_at);
                }
                NeedEvent::OfferExpired(data) => {
                    report.expired_offers.push(data.offer_id);
                    at = Some(data.expired_at);
                }
                _ => {}
            }
        }

        let Some(at) = at else {
            return Ok(report);
        };

        let need = &result.aggregate;
        tracing::info!(
            %need_id,
            need_expired = report.need_expired,
            offers = report.expired_offers.len(),
            "expired stale negotiation state"
        );

        if report.need_expired {
            if let Some(customer_id) = need.customer_id() {
                self.ports.publisher.publish(
                    Notification::new(NotificationKind::NeedExpired, at)
                        .to(Recipient::User(customer_id))
                        .with(need_payload(need)),
                );
            }
        }
        self.ports.publish_all(
            report
                .expired_offers
                .iter()
                .filter_map(|id| need.offer(*id))
                .map(|offer| {
                    Notification::new(NotificationKind::OfferExpired, at)
                        .to(Recipient::Seller(offer.seller_id))
                        .with(offer_payload(need_id, offer))
                }),
        );

        Ok(report)
    }

    /// Loads a need for its owner, any seller, or an admin.
    #[tracing::instrument(skip(self))]
    pub async fn get_need(&self, caller: &Caller, need_id: NeedId) -> Result<Need, DomainError> {
        ensure_active(caller)?;
        let need = self.existing(need_id).await?;
        let visible = match caller.role {
            Role::Admin | Role::Seller => true,
            Role::Customer => need.is_owned_by(caller.user_id),
        };
        if !visible {
            return Err(NeedError::NotOwner.into());
        }
        Ok(need)
    }

    /// Marks the calling seller online or offline for future broadcasts.
    #[tracing::instrument(skip(self))]
    pub async fn set_presence(&self, caller: &Caller, online: bool) -> Result<(), DomainError> {
        let seller = seller_profile(&self.ports, caller).await?;
        self.ports
            .presence
            .set_online(seller.seller_id, online)
            .await?;
        tracing::info!(seller_id = %seller.seller_id, online, "seller presence changed");
        Ok(())
    }

    async fn existing(&self, need_id: NeedId) -> Result<Need, DomainError> {
        self.needs
            .load_existing(need_id.into())
            .await?
            .ok_or_else(|| DomainError::not_found("need", need_id))
    }

    /// Tells the winning seller and every rejected seller how a closed
    /// need ended for them.
    fn announce_offer_outcomes(&self, need: &Need) {
        let Some(need_id) = need.need_id() else {
            return;
        };
        let at = need.closed_at().unwrap_or_else(|| self.ports.clock.now());

        self.ports.publish_all(need.offers().iter().filter_map(|offer| {
            let kind = match offer.status {
                OfferStatus::Accepted => NotificationKind::OfferAccepted,
                OfferStatus::Rejected => NotificationKind::OfferRejected,
                _ => return None,
            };
            let mut payload = offer_payload(need_id, offer);
            payload["order_id"] = json!(need.accepted_order_id());
            Some(
                Notification::new(kind, at)
                    .to(Recipient::Seller(offer.seller_id))
                    .with(payload),
            )
        }));
    }
}

fn need_payload(need: &Need) -> serde_json::Value {
    json!({
        "need_id": need.need_id(),
        "product_id": need.product_id(),
        "operator": need.operator(),
        "quantity": need.quantity(),
        "status": need.status(),
        "expires_at": need.expires_at(),
    })
}

fn offer_payload(need_id: NeedId, offer: &Offer) -> serde_json::Value {
    json!({
        "need_id": need_id,
        "offer_id": offer.offer_id,
        "seller_id": offer.seller_id,
        "price": offer.price,
        "status": offer.status,
        "expires_at": offer.expires_at,
    })
}
