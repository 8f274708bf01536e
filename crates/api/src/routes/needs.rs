//! Need and offer endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, NeedId, OfferId, OrderId, ProductId, Role, SellerId, UserId};
use domain::{
    AcceptOffer, CancelNeed, CreateNeed, DomainError, Need, NeedStatus, Offer, OfferStatus,
    PaymentMethod, SubmitOffer, TransactionRecord,
};
use event_store::EventStore;
use projections::OpenNeedSummary;
use serde::{Deserialize, Serialize};

use super::orders::OrderResponse;
use super::{ensure_active, parse_id};
use crate::error::ApiError;
use crate::extract::Identity;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateNeedRequest {
    pub product_id: String,
    pub operator: String,
    pub mobile: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct OpenNeedsQuery {
    pub product_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SubmitOfferRequest {
    pub price_cents: i64,
}

#[derive(Deserialize)]
pub struct AcceptOfferRequest {
    pub offer_id: String,
    #[serde(default = "default_payment_method")]
    pub payment_method: PaymentMethod,
}

#[derive(Deserialize, Default)]
pub struct CancelNeedRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::Wallet
}

// -- Response types --

#[derive(Serialize)]
pub struct NeedResponse {
    pub need_id: Option<NeedId>,
    pub customer_id: Option<UserId>,
    pub product_id: ProductId,
    pub operator: String,
    pub mobile: String,
    pub quantity: u32,
    pub status: NeedStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub accepted_offer_id: Option<OfferId>,
    pub accepted_order_id: Option<OrderId>,
    pub cancellation_reason: Option<String>,
    pub offers: Vec<OfferResponse>,
}

impl From<&Need> for NeedResponse {
    fn from(need: &Need) -> Self {
        Self {
            need_id: need.need_id(),
            customer_id: need.customer_id(),
            product_id: need.product_id().clone(),
            operator: need.operator().to_string(),
            mobile: need.mobile().to_string(),
            quantity: need.quantity(),
            status: need.status(),
            created_at: need.created_at(),
            expires_at: need.expires_at(),
            closed_at: need.closed_at(),
            accepted_offer_id: need.accepted_offer_id(),
            accepted_order_id: need.accepted_order_id(),
            cancellation_reason: need.cancellation_reason().map(str::to_string),
            offers: need.offers().iter().map(OfferResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct OfferResponse {
    pub offer_id: OfferId,
    pub seller_id: SellerId,
    pub price_cents: i64,
    pub status: OfferStatus,
    pub submitted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revisions: u32,
}

impl From<&Offer> for OfferResponse {
    fn from(offer: &Offer) -> Self {
        Self {
            offer_id: offer.offer_id,
            seller_id: offer.seller_id,
            price_cents: offer.price.cents(),
            status: offer.status,
            submitted_at: offer.submitted_at,
            expires_at: offer.expires_at,
            revisions: offer.revisions,
        }
    }
}

#[derive(Serialize)]
pub struct AcceptedOfferResponse {
    pub need: NeedResponse,
    pub order: OrderResponse,
    pub payment: Option<TransactionRecord>,
}

// -- Handlers --

/// POST /needs: a customer asks sellers for a product.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Json(req): Json<CreateNeedRequest>,
) -> Result<(StatusCode, Json<NeedResponse>), ApiError> {
    let cmd = CreateNeed::new(req.product_id, req.operator, req.mobile, req.quantity);
    let need = state.market.negotiation.create_need(&caller, cmd).await?;
    Ok((StatusCode::CREATED, Json(NeedResponse::from(&need))))
}

/// GET /needs: open needs for the seller dashboard, soonest expiry first.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Query(query): Query<OpenNeedsQuery>,
) -> Result<Json<Vec<OpenNeedSummary>>, ApiError> {
    ensure_active(&caller)?;
    if caller.role == Role::Customer {
        return Err(DomainError::forbidden("open needs are listed for sellers").into());
    }

    state.refresh().await?;
    let now = state.market.ports().clock.now();
    let needs = match query.product_id {
        Some(product_id) => {
            state
                .open_needs
                .for_product(&ProductId::from(product_id), now)
                .await
        }
        None => state.open_needs.open_at(now).await,
    };
    Ok(Json(needs))
}

/// GET /needs/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<NeedResponse>, ApiError> {
    let need_id: NeedId = parse_id("need_id", &id)?;
    let need = state.market.negotiation.get_need(&caller, need_id).await?;
    Ok(Json(NeedResponse::from(&need)))
}

/// POST /needs/{id}/offers: a seller bids, or re-bids, on a need.
#[tracing::instrument(skip(state, req))]
pub async fn submit_offer<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    Json(req): Json<SubmitOfferRequest>,
) -> Result<(StatusCode, Json<OfferResponse>), ApiError> {
    let need_id: NeedId = parse_id("need_id", &id)?;
    let cmd = SubmitOffer::new(need_id, Money::from_cents(req.price_cents));
    let offer = state.market.negotiation.submit_offer(&caller, cmd).await?;
    Ok((StatusCode::CREATED, Json(OfferResponse::from(&offer))))
}

/// POST /needs/{id}/accept: the customer picks an offer, creating the order.
#[tracing::instrument(skip(state, req))]
pub async fn accept<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    Json(req): Json<AcceptOfferRequest>,
) -> Result<(StatusCode, Json<AcceptedOfferResponse>), ApiError> {
    let need_id: NeedId = parse_id("need_id", &id)?;
    let offer_id: OfferId = parse_id("offer_id", &req.offer_id)?;

    let accepted = state
        .market
        .negotiation
        .accept_offer(
            &caller,
            AcceptOffer::new(need_id, offer_id, req.payment_method),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AcceptedOfferResponse {
            need: NeedResponse::from(&accepted.need),
            order: OrderResponse::from(&accepted.order),
            payment: accepted.payment,
        }),
    ))
}

/// POST /needs/{id}/cancel
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    Json(req): Json<CancelNeedRequest>,
) -> Result<Json<NeedResponse>, ApiError> {
    let need_id: NeedId = parse_id("need_id", &id)?;
    let reason = req
        .reason
        .unwrap_or_else(|| "cancelled by customer".to_string());
    let need = state
        .market
        .negotiation
        .cancel_need(&caller, CancelNeed::new(need_id, reason))
        .await?;
    Ok(Json(NeedResponse::from(&need)))
}
