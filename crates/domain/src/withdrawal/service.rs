//! Withdrawal engine: seller payout requests and admin decisions.

use common::{AggregateId, Caller, Role, WithdrawalId};
use event_store::EventStore;
use serde_json::json;

use crate::access::{ensure_active, ensure_role, seller_profile};
use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::ledger::Ledger;
use crate::policy::MarketPolicy;
use crate::ports::{MarketPorts, Notification, NotificationKind, Recipient};
use crate::retry::with_conflict_retry;
use crate::unit_of_work::UnitOfWork;

use super::{RequestWithdrawal, Withdrawal, WithdrawalDecision, WithdrawalError};

/// Owns withdrawal streams.
///
/// A request reserves the amount on the seller account in the same commit
/// that records the withdrawal, so concurrent requests can never reserve
/// more than the available balance. A decision either settles or releases
/// that reservation.
pub struct WithdrawalEngine<S> {
    withdrawals: CommandHandler<S, Withdrawal>,
    ledger: Ledger<S>,
    ports: MarketPorts,
    policy: MarketPolicy,
}

impl<S: Clone> Clone for WithdrawalEngine<S> {
    fn clone(&self) -> Self {
        Self {
            withdrawals: self.withdrawals.clone(),
            ledger: self.ledger.clone(),
            ports: self.ports.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S: EventStore + Clone> WithdrawalEngine<S> {
    pub fn new(store: S, ledger: Ledger<S>, ports: MarketPorts, policy: MarketPolicy) -> Self {
        Self {
            withdrawals: CommandHandler::new(store),
            ledger,
            ports,
            policy,
        }
    }

    fn store(&self) -> &S {
        self.withdrawals.store()
    }

    #[tracing::instrument(skip(self, cmd), fields(amount = %cmd.amount))]
    pub async fn request_withdrawal(
        &self,
        caller: &Caller,
        cmd: RequestWithdrawal,
    ) -> Result<Withdrawal, DomainError> {
        let seller = seller_profile(&self.ports, caller).await?;
        if !seller.approved {
            return Err(WithdrawalError::SellerNotApproved.into());
        }

        let withdrawal_id = WithdrawalId::new();
        let seller = &seller;
        let cmd = &cmd;
        let withdrawal = with_conflict_retry(
            "request_withdrawal",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                let mut uow = UnitOfWork::new(at);
                let stream = AggregateId::from(withdrawal_id);
                let mut withdrawal = self.withdrawals.load_in(&uow, stream).await?;
                let events = withdrawal.request(
                    withdrawal_id,
                    seller.seller_id,
                    seller.user_id,
                    cmd.amount,
                    cmd.method,
                    &cmd.account,
                    self.policy.min_withdrawal,
                    at,
                )?;

                self.ledger
                    .stage_reserve(&mut uow, seller, withdrawal_id, cmd.amount, at)
                    .await?;
                uow.stage(&mut withdrawal, stream, events)?;
                uow.commit(self.store()).await?;
                Ok(withdrawal)
            },
        )
        .await?;

        metrics::counter!("withdrawals_requested_total").increment(1);
        tracing::info!(%withdrawal_id, seller_id = %seller.seller_id, "withdrawal requested");
        self.publish(
            &withdrawal,
            NotificationKind::WithdrawalRequested,
            [Recipient::Admin, Recipient::Seller(seller.seller_id)],
        );
        Ok(withdrawal)
    }

    /// Applies an admin decision to a pending withdrawal.
    ///
    /// Approval pays the reservation out as a negative payout record and
    /// completes the withdrawal. Rejection returns the reservation to the
    /// seller's available balance.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(
        &self,
        caller: &Caller,
        withdrawal_id: WithdrawalId,
        decision: WithdrawalDecision,
    ) -> Result<Withdrawal, DomainError> {
        ensure_role(caller, Role::Admin)?;
        self.existing(withdrawal_id).await?;

        let admin_id = caller.user_id;
        let decision = &decision;
        let (withdrawal, payout) = with_conflict_retry(
            "resolve_withdrawal",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                let mut uow = UnitOfWork::new(at);
                let stream = AggregateId::from(withdrawal_id);
                let mut withdrawal = self.withdrawals.load_in(&uow, stream).await?;
                withdrawal.ensure_pending()?;
                let seller_id = withdrawal
                    .seller_id()
                    .ok_or_else(|| DomainError::not_found("withdrawal", withdrawal_id))?;

                let (events, payout) = match decision {
                    WithdrawalDecision::Approve => {
                        let payout = self
                            .ledger
                            .stage_settle_reservation(&mut uow, seller_id, withdrawal_id, at)
                            .await?;
                        let events = withdrawal.approve(admin_id, payout.transaction_id, at)?;
                        (events, Some(payout))
                    }
                    WithdrawalDecision::Reject { reason } => {
                        self.ledger
                            .stage_release(&mut uow, seller_id, withdrawal_id, at)
                            .await?;
                        (withdrawal.reject(admin_id, reason.clone(), at)?, None)
                    }
                };

                uow.stage(&mut withdrawal, stream, events)?;
                uow.commit(self.store()).await?;
                Ok((withdrawal, payout))
            },
        )
        .await?;

        metrics::counter!("withdrawals_resolved_total", "decision" => decision.as_str())
            .increment(1);
        tracing::info!(%withdrawal_id, status = %withdrawal.status(), "withdrawal resolved");

        if let Some(payout) = &payout {
            self.ledger
                .observe_account_changes(std::slice::from_ref(payout));
        }
        let kind = match decision {
            WithdrawalDecision::Approve => NotificationKind::WithdrawalCompleted,
            WithdrawalDecision::Reject { .. } => NotificationKind::WithdrawalRejected,
        };
        if let Some(seller_id) = withdrawal.seller_id() {
            self.publish(&withdrawal, kind, [Recipient::Seller(seller_id)]);
        }
        Ok(withdrawal)
    }

    pub async fn approve(
        &self,
        caller: &Caller,
        withdrawal_id: WithdrawalId,
    ) -> Result<Withdrawal, DomainError> {
        self.resolve(caller, withdrawal_id, WithdrawalDecision::Approve)
            .await
    }

    pub async fn reject(
        &self,
        caller: &Caller,
        withdrawal_id: WithdrawalId,
        reason: Option<String>,
    ) -> Result<Withdrawal, DomainError> {
        self.resolve(caller, withdrawal_id, WithdrawalDecision::Reject { reason })
            .await
    }

    /// Visible to the requesting seller and to admins.
    #[tracing::instrument(skip(self))]
    pub async fn get_withdrawal(
        &self,
        caller: &Caller,
        withdrawal_id: WithdrawalId,
    ) -> Result<Withdrawal, DomainError> {
        ensure_active(caller)?;
        let withdrawal = self.existing(withdrawal_id).await?;
        if caller.is_admin() {
            return Ok(withdrawal);
        }

        let seller = seller_profile(&self.ports, caller).await?;
        if withdrawal.seller_id() != Some(seller.seller_id) {
            return Err(DomainError::forbidden("withdrawal belongs to another seller"));
        }
        Ok(withdrawal)
    }

    async fn existing(&self, withdrawal_id: WithdrawalId) -> Result<Withdrawal, DomainError> {
        self.withdrawals
            .load_existing(withdrawal_id.into())
            .await?
            .ok_or_else(|| DomainError::not_found("withdrawal", withdrawal_id))
    }

    fn publish(
        &self,
        withdrawal: &Withdrawal,
        kind: NotificationKind,
        recipients: impl IntoIterator<Item = Recipient>,
    ) {
        let at = withdrawal
            .resolved_at()
            .or(withdrawal.requested_at())
            .unwrap_or_else(|| self.ports.clock.now());
        self.ports.publisher.publish(
            Notification::new(kind, at)
                .to_all(recipients)
                .with(json!({
                    "withdrawal_id": withdrawal.withdrawal_id(),
                    "status": withdrawal.status(),
                    "amount": withdrawal.amount(),
                    "method": withdrawal.method(),
                    "transaction_id": withdrawal.transaction_id(),
                })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{InMemoryPorts, SellerProfile};
    use crate::withdrawal::{PayoutMethod, WithdrawalStatus};
    use chrono::Utc;
    use common::{Money, OrderId, SellerId, UserId};
    use event_store::InMemoryEventStore;

    struct Harness {
        engine: WithdrawalEngine<InMemoryEventStore>,
        ledger: Ledger<InMemoryEventStore>,
        ports: InMemoryPorts,
        seller: SellerProfile,
        caller: Caller,
    }

    async fn harness(earned_units: i64) -> Harness {
        let store = InMemoryEventStore::new();
        let ports = InMemoryPorts::new();
        let policy = MarketPolicy::default();
        let ledger = Ledger::new(store.clone(), ports.ports(), policy.clone());
        let engine = WithdrawalEngine::new(store.clone(), ledger.clone(), ports.ports(), policy);

        let user_id = UserId::new();
        let seller = SellerProfile {
            seller_id: SellerId::new(),
            user_id,
            store_name: "Topup Hub".into(),
            approved: true,
        };
        ports.sellers.register(seller.clone());

        let at = Utc::now();
        let mut uow = UnitOfWork::new(at);
        ledger
            .stage_seller_earnings(
                &mut uow,
                &seller,
                OrderId::new(),
                Money::from_units(earned_units),
                at,
            )
            .await
            .unwrap();
        uow.commit(&store).await.unwrap();

        Harness {
            engine,
            ledger,
            ports,
            seller,
            caller: Caller::seller(user_id),
        }
    }

    fn request(units: i64) -> RequestWithdrawal {
        RequestWithdrawal::new(
            Money::from_units(units),
            PayoutMethod::BankTransfer,
            "KE-0001",
        )
    }

    #[tokio::test]
    async fn request_reserves_the_amount() {
        let h = harness(1500).await;
        let withdrawal = h
            .engine
            .request_withdrawal(&h.caller, request(1000))
            .await
            .unwrap();
        assert_eq!(withdrawal.status(), WithdrawalStatus::Pending);

        let account = h.ledger.seller_account(h.seller.seller_id).await.unwrap();
        assert_eq!(account.available_balance(), Money::from_units(500));
        assert_eq!(account.pending_withdrawals(), Money::from_units(1000));
        assert_eq!(
            h.ports
                .publisher
                .of_kind(NotificationKind::WithdrawalRequested)
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn request_beyond_available_is_refused() {
        let h = harness(500).await;
        let err = h
            .engine
            .request_withdrawal(&h.caller, request(600))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InsufficientFunds);
    }

    #[tokio::test]
    async fn rejection_restores_the_available_balance() {
        let h = harness(1500).await;
        let withdrawal = h
            .engine
            .request_withdrawal(&h.caller, request(1000))
            .await
            .unwrap();
        let id = withdrawal.withdrawal_id().unwrap();
        let admin = Caller::admin(UserId::new());

        let rejected = h
            .engine
            .reject(&admin, id, Some("documents missing".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status(), WithdrawalStatus::Rejected);

        let account = h.ledger.seller_account(h.seller.seller_id).await.unwrap();
        assert_eq!(account.available_balance(), Money::from_units(1500));
        assert!(account.pending_withdrawals().is_zero());

        let again = h.engine.approve(&admin, id).await.unwrap_err();
        assert_eq!(again.kind(), crate::error::ErrorKind::StateConflict);
    }

    #[tokio::test]
    async fn only_admins_decide_and_only_owners_read() {
        let h = harness(1500).await;
        let withdrawal = h
            .engine
            .request_withdrawal(&h.caller, request(200))
            .await
            .unwrap();
        let id = withdrawal.withdrawal_id().unwrap();

        let denied = h.engine.approve(&h.caller, id).await;
        assert!(matches!(denied, Err(DomainError::Forbidden(_))));

        assert!(h.engine.get_withdrawal(&h.caller, id).await.is_ok());
        let stranger = Caller::customer(UserId::new());
        assert!(h.engine.get_withdrawal(&stranger, id).await.is_err());
    }
}
