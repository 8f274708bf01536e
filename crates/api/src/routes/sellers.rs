//! The calling seller's presence and balances.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::SellerId;
use domain::TransactionRecord;
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::Identity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PresenceRequest {
    pub online: bool,
}

#[derive(Serialize)]
pub struct PresenceResponse {
    pub seller_id: SellerId,
    pub online: bool,
}

#[derive(Serialize)]
pub struct SellerAccountResponse {
    pub seller_id: SellerId,
    pub store_name: String,
    pub available_balance_cents: i64,
    pub pending_withdrawals_cents: i64,
    pub total_earnings_cents: i64,
    pub completed_orders: u64,
    /// Newest first.
    pub transactions: Vec<TransactionRecord>,
}

/// PUT /sellers/me/presence: go online to hear about new needs.
#[tracing::instrument(skip(state, req))]
pub async fn set_presence<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Json(req): Json<PresenceRequest>,
) -> Result<Json<PresenceResponse>, ApiError> {
    let seller = state.seller_for(&caller).await?;
    state
        .market
        .negotiation
        .set_presence(&caller, req.online)
        .await?;
    Ok(Json(PresenceResponse {
        seller_id: seller.seller_id,
        online: req.online,
    }))
}

/// GET /sellers/me/account
#[tracing::instrument(skip(state))]
pub async fn account<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
) -> Result<Json<SellerAccountResponse>, ApiError> {
    let seller = state.seller_for(&caller).await?;
    let account = state.market.ledger.seller_account(seller.seller_id).await?;

    Ok(Json(SellerAccountResponse {
        seller_id: seller.seller_id,
        store_name: seller.store_name,
        available_balance_cents: account.available_balance().cents(),
        pending_withdrawals_cents: account.pending_withdrawals().cents(),
        total_earnings_cents: account.total_earnings().cents(),
        completed_orders: account.completed_orders(),
        transactions: account.transactions().iter().rev().cloned().collect(),
    }))
}
