//! Admin decisions on deposits and withdrawals.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{TransactionId, UserId, WithdrawalId};
use domain::{DomainError, SettlementOutcome, TransactionRecord};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::parse_id;
use super::withdrawals::WithdrawalResponse;
use crate::error::ApiError;
use crate::extract::Identity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SettleDepositRequest {
    pub outcome: SettlementOutcome,
}

#[derive(Serialize)]
pub struct CommissionsResponse {
    pub total_cents: i64,
    pub commissions: Vec<TransactionRecord>,
}

#[derive(Deserialize, Default)]
pub struct RejectWithdrawalRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /admin/deposits/{user_id}/{transaction_id}/settle
#[tracing::instrument(skip(state, req))]
pub async fn settle_deposit<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path((user_id, transaction_id)): Path<(String, String)>,
    Json(req): Json<SettleDepositRequest>,
) -> Result<Json<TransactionRecord>, ApiError> {
    let user_id: UserId = parse_id("user_id", &user_id)?;
    let transaction_id: TransactionId = parse_id("transaction_id", &transaction_id)?;
    let record = state
        .market
        .ledger
        .settle_deposit(&caller, user_id, transaction_id, req.outcome)
        .await?;
    Ok(Json(record))
}

/// GET /admin/commissions: platform commission recognized per order.
#[tracing::instrument(skip(state))]
pub async fn commissions<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
) -> Result<Json<CommissionsResponse>, ApiError> {
    if !caller.is_admin() {
        return Err(DomainError::forbidden("only admins see platform revenue").into());
    }
    let commissions = state.market.ledger.platform_commissions().await?;
    let total_cents = commissions.iter().map(|r| r.amount.cents()).sum();
    Ok(Json(CommissionsResponse {
        total_cents,
        commissions,
    }))
}

/// POST /admin/withdrawals/{id}/approve
#[tracing::instrument(skip(state))]
pub async fn approve_withdrawal<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let withdrawal_id: WithdrawalId = parse_id("withdrawal_id", &id)?;
    let withdrawal = state
        .market
        .withdrawals
        .approve(&caller, withdrawal_id)
        .await?;
    Ok(Json(WithdrawalResponse::from(&withdrawal)))
}

/// POST /admin/withdrawals/{id}/reject: returns the reserved funds.
#[tracing::instrument(skip(state, req))]
pub async fn reject_withdrawal<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    Json(req): Json<RejectWithdrawalRequest>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let withdrawal_id: WithdrawalId = parse_id("withdrawal_id", &id)?;
    let withdrawal = state
        .market
        .withdrawals
        .reject(&caller, withdrawal_id, req.reason)
        .await?;
    Ok(Json(WithdrawalResponse::from(&withdrawal)))
}
