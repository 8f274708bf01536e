//! Order engine: placement, fulfillment and cancellation.

use chrono::{DateTime, Utc};
use common::{AggregateId, Caller, OrderId, Role, split};
use event_store::EventStore;
use serde_json::json;

use crate::access::{ensure_active, ensure_role, seller_profile};
use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::ledger::{Ledger, LedgerEntry, TransactionLink, TransactionRecord, TransactionType};
use crate::policy::{MAX_QUANTITY, MarketPolicy};
use crate::ports::{MarketPorts, Notification, NotificationKind, Recipient};
use crate::retry::with_conflict_retry;
use crate::unit_of_work::UnitOfWork;

use super::{
    CancelOrder, CreateDirectOrder, Order, OrderActor, OrderError, OrderPlacedData, OrderSource,
    PaymentMethod, PaymentStatus, PlaceOrder,
};

/// An order staged or committed together with its wallet debit.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub payment: Option<TransactionRecord>,
}

/// Owns order status transitions.
///
/// Every transition that moves money stages the ledger change in the same
/// unit of work as the order event.
pub struct OrderEngine<S> {
    orders: CommandHandler<S, Order>,
    ledger: Ledger<S>,
    ports: MarketPorts,
    policy: MarketPolicy,
}

impl<S: Clone> Clone for OrderEngine<S> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            ledger: self.ledger.clone(),
            ports: self.ports.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S: EventStore + Clone> OrderEngine<S> {
    pub fn new(store: S, ledger: Ledger<S>, ports: MarketPorts, policy: MarketPolicy) -> Self {
        Self {
            orders: CommandHandler::new(store),
            ledger,
            ports,
            policy,
        }
    }

    fn store(&self) -> &S {
        self.orders.store()
    }

    /// Stages a new order and, for wallet payment, the customer's debit.
    ///
    /// Fails with `InsufficientFunds` before anything is staged when the
    /// wallet cannot cover the total.
    pub async fn stage_place(
        &self,
        uow: &mut UnitOfWork,
        cmd: PlaceOrder,
        at: DateTime<Utc>,
    ) -> Result<PlacedOrder, DomainError> {
        if cmd.quantity == 0 || cmd.quantity > MAX_QUANTITY {
            return Err(OrderError::InvalidQuantity {
                quantity: cmd.quantity,
            }
            .into());
        }
        if !cmd.unit_price.is_positive() || !cmd.unit_price.is_within_limit() {
            return Err(OrderError::InvalidPrice {
                price: cmd.unit_price,
            }
            .into());
        }

        let total = cmd.total_amount()?;
        let parts = split(total, self.policy.commission_rate);

        let payment = match cmd.payment_method {
            PaymentMethod::Wallet => {
                let entry = LedgerEntry::new(
                    cmd.customer_id,
                    total,
                    TransactionType::OrderPayment,
                    format!("Payment for order {}", cmd.order_id),
                )
                .linked(TransactionLink::Order(cmd.order_id));
                Some(self.ledger.stage_debit(uow, entry, at).await?)
            }
            PaymentMethod::Gateway => None,
        };

        let stream = AggregateId::from(cmd.order_id);
        let mut order = self.orders.load_in(uow, stream).await?;
        let events = order.place(OrderPlacedData {
            order_id: cmd.order_id,
            customer_id: cmd.customer_id,
            seller_id: cmd.seller_id,
            product_id: cmd.product_id,
            mobile: cmd.mobile,
            unit_price: cmd.unit_price,
            quantity: cmd.quantity,
            total_amount: total,
            commission: parts.commission,
            seller_amount: parts.seller_amount,
            payment_method: cmd.payment_method,
            payment_status: if payment.is_some() {
                PaymentStatus::Paid
            } else {
                PaymentStatus::Pending
            },
            payment_transaction_id: payment.as_ref().map(|r| r.transaction_id),
            source: cmd.source,
            placed_at: at,
        })?;
        uow.stage(&mut order, stream, events)?;

        Ok(PlacedOrder { order, payment })
    }

    /// Publishes `order.created` and the wallet debit of a committed order.
    pub fn announce_placed(&self, placed: &PlacedOrder) {
        let order = &placed.order;
        let source = match order.source() {
            Some(OrderSource::Negotiated { .. }) => "negotiated",
            _ => "direct",
        };
        metrics::counter!("orders_created_total", "source" => source).increment(1);

        if let Some(payment) = &placed.payment {
            self.ledger
                .publish_wallet_changes(std::slice::from_ref(payment));
        }
        self.publish(order, NotificationKind::OrderCreated, order.placed_at());
    }

    #[tracing::instrument(skip(self, cmd), fields(listing_id = %cmd.listing_id))]
    pub async fn create_direct_order(
        &self,
        caller: &Caller,
        cmd: CreateDirectOrder,
    ) -> Result<Order, DomainError> {
        ensure_role(caller, Role::Customer)?;
        if cmd.quantity == 0 || cmd.quantity > MAX_QUANTITY {
            return Err(OrderError::InvalidQuantity {
                quantity: cmd.quantity,
            }
            .into());
        }
        if cmd.mobile.trim().is_empty() {
            return Err(DomainError::validation("mobile", "is required"));
        }

        let listing = self
            .ports
            .catalog
            .listing(cmd.listing_id)
            .await?
            .ok_or_else(|| DomainError::not_found("listing", cmd.listing_id))?;
        if !listing.active {
            return Err(OrderError::ListingUnavailable(cmd.listing_id).into());
        }
        match self.ports.sellers.seller(listing.seller_id).await? {
            Some(profile) if profile.approved => {}
            _ => return Err(OrderError::ListingUnavailable(cmd.listing_id).into()),
        }

        let customer_id = caller.user_id;
        let listing = &listing;
        let cmd = &cmd;
        let placed = with_conflict_retry(
            "create_direct_order",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                let mut uow = UnitOfWork::new(at);
                let placed = self
                    .stage_place(
                        &mut uow,
                        PlaceOrder {
                            order_id: OrderId::new(),
                            customer_id,
                            seller_id: listing.seller_id,
                            product_id: listing.product_id.clone(),
                            mobile: cmd.mobile.clone(),
                            unit_price: listing.price,
                            quantity: cmd.quantity,
                            payment_method: cmd.payment_method,
                            source: OrderSource::Direct {
                                listing_id: listing.listing_id,
                            },
                        },
                        at,
                    )
                    .await?;
                uow.commit(self.store()).await?;
                Ok(placed)
            },
        )
        .await?;

        tracing::info!(
            order_id = ?placed.order.order_id(),
            total = %placed.order.total_amount(),
            "direct order placed"
        );
        self.announce_placed(&placed);
        Ok(placed.order)
    }

    /// Seller takes a pending order.
    #[tracing::instrument(skip(self))]
    pub async fn accept_order(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<Order, DomainError> {
        let seller = seller_profile(&self.ports, caller).await?;
        self.existing(order_id).await?;

        let seller_id = seller.seller_id;
        let result = with_conflict_retry(
            "accept_order",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                self.orders
                    .execute(order_id.into(), at, |order| order.accept(seller_id, at))
                    .await
            },
        )
        .await?;

        let order = result.aggregate;
        tracing::info!(%order_id, "order assigned");
        self.publish(&order, NotificationKind::OrderAssigned, order.assigned_at());
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn start_processing(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<Order, DomainError> {
        let seller = seller_profile(&self.ports, caller).await?;
        self.existing(order_id).await?;

        let seller_id = seller.seller_id;
        let result = with_conflict_retry(
            "start_processing",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                self.orders
                    .execute(order_id.into(), at, |order| {
                        order.start_processing(seller_id, at)
                    })
                    .await
            },
        )
        .await?;

        let order = result.aggregate;
        self.publish(&order, NotificationKind::OrderProcessing, order.processing_at());
        Ok(order)
    }

    /// Completes an order and credits the seller's share, plus the
    /// platform's commission on the order's own commission stream, in the
    /// same commit.
    #[tracing::instrument(skip(self))]
    pub async fn complete_order(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<Order, DomainError> {
        let seller = seller_profile(&self.ports, caller).await?;
        self.existing(order_id).await?;

        let seller = &seller;
        let (order, payout, commission) = with_conflict_retry(
            "complete_order",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                let mut uow = UnitOfWork::new(at);
                let stream = AggregateId::from(order_id);
                let mut order = self.orders.load_in(&uow, stream).await?;
                order.ensure_completable(seller.seller_id)?;

                let payout = self
                    .ledger
                    .stage_seller_earnings(&mut uow, seller, order_id, order.seller_amount(), at)
                    .await?;

                let commission = if order.commission().is_positive() {
                    Some(
                        self.ledger
                            .stage_commission(&mut uow, order_id, order.commission(), at)
                            .await?,
                    )
                } else {
                    None
                };

                let events = order.complete(
                    seller.seller_id,
                    payout.transaction_id,
                    commission.as_ref().map(|r| r.transaction_id),
                    at,
                )?;
                uow.stage(&mut order, stream, events)?;
                uow.commit(self.store()).await?;
                Ok((order, payout, commission))
            },
        )
        .await?;

        metrics::counter!("orders_completed_total").increment(1);
        tracing::info!(%order_id, seller_amount = %order.seller_amount(), "order completed");

        self.ledger
            .observe_account_changes(std::slice::from_ref(&payout));
        self.ledger
            .observe_account_changes(commission.as_slice());
        self.publish(&order, NotificationKind::OrderCompleted, order.completed_at());
        Ok(order)
    }

    /// Cancels an order, refunding a wallet payment in the same commit.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn cancel_order(
        &self,
        caller: &Caller,
        cmd: CancelOrder,
    ) -> Result<Order, DomainError> {
        let actor = self.actor_for(caller).await?;
        let order_id = cmd.order_id;
        self.existing(order_id).await?;

        let actor = &actor;
        let reason = cmd.reason.as_str();
        let (order, refund) = with_conflict_retry(
            "cancel_order",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                let mut uow = UnitOfWork::new(at);
                let stream = AggregateId::from(order_id);
                let mut order = self.orders.load_in(&uow, stream).await?;
                order.ensure_cancellable(actor)?;

                let refund = match (order.refund_due(), order.customer_id()) {
                    (true, Some(customer_id)) => {
                        let entry = LedgerEntry::new(
                            customer_id,
                            order.total_amount(),
                            TransactionType::OrderRefund,
                            format!("Refund for order {order_id}"),
                        )
                        .linked(TransactionLink::Order(order_id));
                        Some(self.ledger.stage_credit(&mut uow, entry, at).await?)
                    }
                    _ => None,
                };

                let events = order.cancel(
                    actor,
                    reason,
                    refund.as_ref().map(|r| r.transaction_id),
                    at,
                )?;
                uow.stage(&mut order, stream, events)?;
                uow.commit(self.store()).await?;
                Ok((order, refund))
            },
        )
        .await?;

        metrics::counter!("orders_cancelled_total", "role" => actor.role().as_str()).increment(1);
        tracing::info!(%order_id, refunded = refund.is_some(), "order cancelled");

        if let Some(refund) = &refund {
            self.ledger
                .publish_wallet_changes(std::slice::from_ref(refund));
        }
        self.publish(&order, NotificationKind::OrderCancelled, order.cancelled_at());
        Ok(order)
    }

    /// Loads an order visible to `caller`: its customer, its seller or an
    /// admin.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, caller: &Caller, order_id: OrderId) -> Result<Order, DomainError> {
        let actor = self.actor_for(caller).await?;
        let order = self.existing(order_id).await?;
        if !order.is_party(&actor) {
            return Err(OrderError::NotOrderParty.into());
        }
        Ok(order)
    }

    async fn existing(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.orders
            .load_existing(order_id.into())
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))
    }

    async fn actor_for(&self, caller: &Caller) -> Result<OrderActor, DomainError> {
        ensure_active(caller)?;
        Ok(match caller.role {
            Role::Admin => OrderActor::Admin(caller.user_id),
            Role::Customer => OrderActor::Customer(caller.user_id),
            Role::Seller => {
                let profile = seller_profile(&self.ports, caller).await?;
                OrderActor::Seller {
                    seller_id: profile.seller_id,
                    user_id: caller.user_id,
                }
            }
        })
    }

    fn publish(&self, order: &Order, kind: NotificationKind, at: Option<DateTime<Utc>>) {
        let mut notification =
            Notification::new(kind, at.unwrap_or_else(|| self.ports.clock.now())).with(json!({
                "order_id": order.order_id(),
                "status": order.status(),
                "total_amount": order.total_amount(),
                "seller_amount": order.seller_amount(),
            }));
        if let Some(customer_id) = order.customer_id() {
            notification = notification.to(Recipient::User(customer_id));
        }
        if let Some(seller_id) = order.seller_id() {
            notification = notification.to(Recipient::Seller(seller_id));
        }
        self.ports.publisher.publish(notification);
    }
}
