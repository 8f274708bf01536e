//! The caller's own wallet.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::{Money, UserId};
use domain::TransactionRecord;
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::ensure_active;
use crate::error::ApiError;
use crate::extract::Identity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DepositRequest {
    pub amount_cents: i64,
    /// Gateway reference of the incoming payment.
    pub reference: String,
}

#[derive(Serialize)]
pub struct WalletResponse {
    pub user_id: UserId,
    pub balance_cents: i64,
    pub transaction_count: usize,
}

/// GET /wallet
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
) -> Result<Json<WalletResponse>, ApiError> {
    ensure_active(&caller)?;
    let wallet = state.market.ledger.wallet(caller.user_id).await?;
    Ok(Json(WalletResponse {
        user_id: caller.user_id,
        balance_cents: wallet.balance().cents(),
        transaction_count: wallet.transactions().len(),
    }))
}

/// GET /wallet/transactions: newest first.
#[tracing::instrument(skip(state))]
pub async fn transactions<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
) -> Result<Json<Vec<TransactionRecord>>, ApiError> {
    ensure_active(&caller)?;
    let history = state.market.ledger.transactions(caller.user_id).await?;
    Ok(Json(history))
}

/// POST /wallet/deposits: records a pending top-up awaiting settlement.
#[tracing::instrument(skip(state, req))]
pub async fn deposit<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Json(req): Json<DepositRequest>,
) -> Result<(StatusCode, Json<TransactionRecord>), ApiError> {
    let record = state
        .market
        .ledger
        .record_deposit(&caller, Money::from_cents(req.amount_cents), &req.reference)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}
