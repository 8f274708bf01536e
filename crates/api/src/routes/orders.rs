//! Order endpoints: direct purchase, fulfilment steps and the order board.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, Role, SellerId, UserId};
use domain::{
    CancelOrder, CreateDirectOrder, Order, OrderSource, OrderStatus, PaymentMethod, PaymentStatus,
};
use event_store::EventStore;
use projections::OrderSummary;
use serde::{Deserialize, Serialize};

use super::{ensure_active, parse_id};
use crate::error::ApiError;
use crate::extract::Identity;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub listing_id: String,
    pub mobile: String,
    pub quantity: u32,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Deserialize)]
pub struct OrderBoardQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Deserialize, Default)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: Option<OrderId>,
    pub customer_id: Option<UserId>,
    pub seller_id: Option<SellerId>,
    pub product_id: ProductId,
    pub mobile: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub commission_cents: i64,
    pub seller_amount_cents: i64,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub source: Option<OrderSource>,
    pub placed_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub processing_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id(),
            customer_id: order.customer_id(),
            seller_id: order.seller_id(),
            product_id: order.product_id().clone(),
            mobile: order.mobile().to_string(),
            quantity: order.quantity(),
            unit_price_cents: order.unit_price().cents(),
            total_cents: order.total_amount().cents(),
            commission_cents: order.commission().cents(),
            seller_amount_cents: order.seller_amount().cents(),
            status: order.status(),
            payment_method: order.payment_method(),
            payment_status: order.payment_status(),
            source: order.source(),
            placed_at: order.placed_at(),
            assigned_at: order.assigned_at(),
            processing_at: order.processing_at(),
            completed_at: order.completed_at(),
            cancelled_at: order.cancelled_at(),
            cancellation_reason: order.cancellation_reason().map(str::to_string),
        }
    }
}

// -- Handlers --

/// POST /orders: buy straight from a seller's listing.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let listing_id = parse_id("listing_id", &req.listing_id)?;
    let cmd = CreateDirectOrder::new(
        listing_id,
        req.mobile,
        req.quantity,
        req.payment_method.unwrap_or(PaymentMethod::Wallet),
    );
    let order = state.market.orders.create_direct_order(&caller, cmd).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders: the caller's side of the order board, newest first.
///
/// Customers see what they bought, sellers what they were assigned and
/// admins everything.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Query(query): Query<OrderBoardQuery>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    ensure_active(&caller)?;
    // Resolve the seller first so an unknown seller fails before catch-up.
    let seller_id = match caller.role {
        Role::Seller => Some(state.seller_for(&caller).await?.seller_id),
        _ => None,
    };

    state.refresh().await?;
    let orders = match (caller.role, seller_id) {
        (Role::Seller, Some(seller_id)) => state.order_board.for_seller(seller_id).await,
        (Role::Admin, _) => state.order_board.all().await,
        _ => state.order_board.for_customer(caller.user_id).await,
    };

    let orders = match query.status {
        Some(status) => orders.into_iter().filter(|o| o.status == status).collect(),
        None => orders,
    };
    Ok(Json(orders))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order_id", &id)?;
    let order = state.market.orders.get_order(&caller, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/accept: the seller takes a pending direct order.
#[tracing::instrument(skip(state))]
pub async fn accept<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order_id", &id)?;
    let order = state.market.orders.accept_order(&caller, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/processing
#[tracing::instrument(skip(state))]
pub async fn start_processing<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order_id", &id)?;
    let order = state
        .market
        .orders
        .start_processing(&caller, order_id)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/complete: delivery done; pays the seller.
#[tracing::instrument(skip(state))]
pub async fn complete<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order_id", &id)?;
    let order = state.market.orders.complete_order(&caller, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order_id", &id)?;
    let reason = req.reason.unwrap_or_else(|| "cancelled".to_string());
    let order = state
        .market
        .orders
        .cancel_order(&caller, CancelOrder::new(order_id, reason))
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}
