//! Order board read model: every order, indexed by customer and seller.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, Money, OrderId, ProductId, SellerId, UserId};
use domain::{OrderEvent, OrderSource, OrderStatus, PaymentMethod, PaymentStatus};
use event_store::{EventEnvelope, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub total_amount: Money,
    pub seller_amount: Money,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub source: OrderSource,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    orders: HashMap<OrderId, OrderSummary>,
    by_customer: HashMap<UserId, Vec<OrderId>>,
    by_seller: HashMap<SellerId, Vec<OrderId>>,
    position: ProjectionPosition,
}

impl State {
    fn collect(&self, ids: Option<&Vec<OrderId>>) -> Vec<OrderSummary> {
        let mut orders: Vec<_> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.orders.get(id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }

    fn touch(&mut self, order_id: OrderId, status: OrderStatus, at: DateTime<Utc>) {
        if let Some(order) = self.orders.get_mut(&order_id) {
            order.status = status;
            order.updated_at = at;
        }
    }
}

#[derive(Clone, Default)]
pub struct OrderBoardView {
    state: Arc<RwLock<State>>,
}

impl OrderBoardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, order_id: OrderId) -> Option<OrderSummary> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    /// A customer's orders, newest first.
    pub async fn for_customer(&self, customer_id: UserId) -> Vec<OrderSummary> {
        let state = self.state.read().await;
        state.collect(state.by_customer.get(&customer_id))
    }

    /// A seller's orders, newest first.
    pub async fn for_seller(&self, seller_id: SellerId) -> Vec<OrderSummary> {
        let state = self.state.read().await;
        state.collect(state.by_seller.get(&seller_id))
    }

    /// Every order on the board, newest first.
    pub async fn all(&self) -> Vec<OrderSummary> {
        let mut orders: Vec<_> = self.state.read().await.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }

    pub async fn with_status(&self, status: OrderStatus) -> Vec<OrderSummary> {
        let mut orders: Vec<_> = self
            .state
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }
}

impl ReadModel for OrderBoardView {
    fn name(&self) -> &'static str {
        "OrderBoardView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.orders.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Projection for OrderBoardView {
    fn name(&self) -> &'static str {
        "OrderBoardView"
    }

    fn source(&self) -> &'static str {
        "Order"
    }

    async fn apply(&self, event: &EventEnvelope) -> Result<()> {
        let order_event: OrderEvent = event.decode()?;
        let mut state = self.state.write().await;

        match order_event {
            OrderEvent::OrderPlaced(data) => {
                state
                    .by_customer
                    .entry(data.customer_id)
                    .or_default()
                    .push(data.order_id);
                state
                    .by_seller
                    .entry(data.seller_id)
                    .or_default()
                    .push(data.order_id);
                state.orders.insert(
                    data.order_id,
                    OrderSummary {
                        order_id: data.order_id,
                        customer_id: data.customer_id,
                        seller_id: data.seller_id,
                        product_id: data.product_id,
                        quantity: data.quantity,
                        total_amount: data.total_amount,
                        seller_amount: data.seller_amount,
                        status: OrderStatus::Pending,
                        payment_method: data.payment_method,
                        payment_status: data.payment_status,
                        source: data.source,
                        placed_at: data.placed_at,
                        updated_at: data.placed_at,
                    },
                );
            }
            OrderEvent::OrderAssigned(data) => {
                state.touch(data.order_id, OrderStatus::Assigned, data.assigned_at);
            }
            OrderEvent::OrderProcessingStarted(data) => {
                state.touch(data.order_id, OrderStatus::Processing, data.started_at);
            }
            OrderEvent::OrderCompleted(data) => {
                state.touch(data.order_id, OrderStatus::Completed, data.completed_at);
            }
            OrderEvent::OrderCancelled(data) => {
                state.touch(data.order_id, OrderStatus::Cancelled, data.cancelled_at);
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
