//! Seller payout requests.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, SellerId, TransactionId, UserId, WithdrawalId};
use domain::{PayoutMethod, RequestWithdrawal, Withdrawal, WithdrawalStatus};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::error::ApiError;
use crate::extract::Identity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WithdrawalRequest {
    pub amount_cents: i64,
    pub method: PayoutMethod,
    pub account: String,
}

#[derive(Serialize)]
pub struct WithdrawalResponse {
    pub withdrawal_id: Option<WithdrawalId>,
    pub seller_id: Option<SellerId>,
    pub amount_cents: i64,
    pub method: Option<PayoutMethod>,
    pub account: String,
    pub status: WithdrawalStatus,
    pub requested_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<UserId>,
    pub rejection_reason: Option<String>,
    pub transaction_id: Option<TransactionId>,
}

impl From<&Withdrawal> for WithdrawalResponse {
    fn from(w: &Withdrawal) -> Self {
        Self {
            withdrawal_id: w.withdrawal_id(),
            seller_id: w.seller_id(),
            amount_cents: w.amount().cents(),
            method: w.method(),
            account: w.account().to_string(),
            status: w.status(),
            requested_at: w.requested_at(),
            resolved_at: w.resolved_at(),
            resolved_by: w.resolved_by(),
            rejection_reason: w.rejection_reason().map(str::to_string),
            transaction_id: w.transaction_id(),
        }
    }
}

/// POST /withdrawals: reserves the amount until an admin decides.
#[tracing::instrument(skip(state, req))]
pub async fn request<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Json(req): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalResponse>), ApiError> {
    let cmd = RequestWithdrawal::new(Money::from_cents(req.amount_cents), req.method, req.account);
    let withdrawal = state
        .market
        .withdrawals
        .request_withdrawal(&caller, cmd)
        .await?;
    Ok((StatusCode::CREATED, Json(WithdrawalResponse::from(&withdrawal))))
}

/// GET /withdrawals/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let withdrawal_id: WithdrawalId = parse_id("withdrawal_id", &id)?;
    let withdrawal = state
        .market
        .withdrawals
        .get_withdrawal(&caller, withdrawal_id)
        .await?;
    Ok(Json(WithdrawalResponse::from(&withdrawal)))
}
