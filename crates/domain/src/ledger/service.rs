//! Ledger service: the single entry point for balance changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{AggregateId, Caller, Money, OrderId, SellerId, TransactionId, UserId, WithdrawalId};
use event_store::EventStore;
use serde_json::json;

use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::policy::MarketPolicy;
use crate::ports::{MarketPorts, Notification, NotificationKind, Recipient, SellerProfile};
use crate::retry::with_conflict_retry;
use crate::unit_of_work::UnitOfWork;

use super::{
    LedgerEntry, LedgerError, PlatformCommission, PlatformCommissionEvent, SellerAccount,
    SettlementOutcome, TransactionLink, TransactionNumbers, TransactionRecord, TransactionStatus,
    TransactionType, Wallet, commission_stream,
};

/// Owns wallet, seller-account and platform commission streams.
///
/// The `stage_*` methods add balance changes to a caller's unit of work so
/// they commit together with the caller's own events. `debit`, `credit`
/// and the deposit operations run their own unit of work.
pub struct Ledger<S> {
    wallets: CommandHandler<S, Wallet>,
    accounts: CommandHandler<S, SellerAccount>,
    commissions: CommandHandler<S, PlatformCommission>,
    numbers: Arc<TransactionNumbers>,
    ports: MarketPorts,
    policy: MarketPolicy,
}

impl<S: Clone> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            wallets: self.wallets.clone(),
            accounts: self.accounts.clone(),
            commissions: self.commissions.clone(),
            numbers: self.numbers.clone(),
            ports: self.ports.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S: EventStore + Clone> Ledger<S> {
    pub fn new(store: S, ports: MarketPorts, policy: MarketPolicy) -> Self {
        Self {
            wallets: CommandHandler::new(store.clone()),
            accounts: CommandHandler::new(store.clone()),
            commissions: CommandHandler::new(store),
            numbers: Arc::new(TransactionNumbers::new()),
            ports,
            policy,
        }
    }

    fn store(&self) -> &S {
        self.wallets.store()
    }

    /// Stages a completed debit of `entry.amount` from the user's wallet.
    pub async fn stage_debit(
        &self,
        uow: &mut UnitOfWork,
        entry: LedgerEntry,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, DomainError> {
        let amount = -entry.amount;
        self.stage_wallet(uow, entry, amount, TransactionStatus::Completed, at)
            .await
    }

    /// Stages a completed credit of `entry.amount` to the user's wallet.
    pub async fn stage_credit(
        &self,
        uow: &mut UnitOfWork,
        entry: LedgerEntry,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, DomainError> {
        let amount = entry.amount;
        self.stage_wallet(uow, entry, amount, TransactionStatus::Completed, at)
            .await
    }

    async fn stage_wallet(
        &self,
        uow: &mut UnitOfWork,
        entry: LedgerEntry,
        amount: Money,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, DomainError> {
        if !entry.amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount {
                amount: entry.amount,
            }
            .into());
        }
        if !entry.amount.is_within_limit() {
            return Err(LedgerError::AmountOutOfRange {
                amount: entry.amount,
            }
            .into());
        }

        let stream = AggregateId::from(entry.user_id);
        let mut wallet = self.wallets.load_in(uow, stream).await?;
        let record =
            TransactionRecord::from_entry(entry, self.numbers.allocate(at), amount, status, at);
        let events = wallet.record(record.clone())?;
        uow.stage(&mut wallet, stream, events)?;
        Ok(record)
    }

    /// Debits a wallet in its own unit of work.
    #[tracing::instrument(skip(self), fields(user_id = %entry.user_id))]
    pub async fn debit(&self, entry: LedgerEntry) -> Result<TransactionRecord, DomainError> {
        let record = with_conflict_retry(
            "ledger_debit",
            self.policy.conflict_retry_attempts,
            || {
                let entry = entry.clone();
                async move {
                    let at = self.ports.clock.now();
                    let mut uow = UnitOfWork::new(at);
                    let record = self.stage_debit(&mut uow, entry, at).await?;
                    uow.commit(self.store()).await?;
                    Ok(record)
                }
            },
        )
        .await?;

        self.publish_wallet_changes(std::slice::from_ref(&record));
        Ok(record)
    }

    /// Credits a wallet in its own unit of work.
    #[tracing::instrument(skip(self), fields(user_id = %entry.user_id))]
    pub async fn credit(&self, entry: LedgerEntry) -> Result<TransactionRecord, DomainError> {
        let record = with_conflict_retry(
            "ledger_credit",
            self.policy.conflict_retry_attempts,
            || {
                let entry = entry.clone();
                async move {
                    let at = self.ports.clock.now();
                    let mut uow = UnitOfWork::new(at);
                    let record = self.stage_credit(&mut uow, entry, at).await?;
                    uow.commit(self.store()).await?;
                    Ok(record)
                }
            },
        )
        .await?;

        self.publish_wallet_changes(std::slice::from_ref(&record));
        Ok(record)
    }

    /// Records a gateway deposit awaiting confirmation. The balance does
    /// not move until [`Ledger::settle_deposit`] completes it.
    #[tracing::instrument(skip(self))]
    pub async fn record_deposit(
        &self,
        caller: &Caller,
        amount: Money,
        reference: &str,
    ) -> Result<TransactionRecord, DomainError> {
        if caller.blocked {
            return Err(DomainError::forbidden("blocked users cannot deposit"));
        }
        if !amount.is_positive() {
            return Err(DomainError::validation("amount", "must be positive"));
        }
        if !amount.is_within_limit() {
            return Err(LedgerError::AmountOutOfRange { amount }.into());
        }

        let user_id = caller.user_id;
        let record = with_conflict_retry(
            "record_deposit",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                let mut uow = UnitOfWork::new(at);
                let entry = LedgerEntry::new(
                    user_id,
                    amount,
                    TransactionType::Deposit,
                    format!("Deposit {reference}"),
                );
                let record = self
                    .stage_wallet(&mut uow, entry, amount, TransactionStatus::Pending, at)
                    .await?;
                uow.commit(self.store()).await?;
                Ok(record)
            },
        )
        .await?;

        tracing::info!(number = %record.number, %amount, "deposit recorded as pending");
        Ok(record)
    }

    /// Completes or fails a pending deposit. Admin only.
    #[tracing::instrument(skip(self))]
    pub async fn settle_deposit(
        &self,
        caller: &Caller,
        user_id: UserId,
        transaction_id: TransactionId,
        outcome: SettlementOutcome,
    ) -> Result<TransactionRecord, DomainError> {
        if !caller.is_admin() || caller.blocked {
            return Err(DomainError::forbidden("only admins settle deposits"));
        }

        let result = with_conflict_retry(
            "settle_deposit",
            self.policy.conflict_retry_attempts,
            || async move {
                let at = self.ports.clock.now();
                self.wallets
                    .execute(user_id.into(), at, |wallet| {
                        wallet.settle(transaction_id, outcome, at)
                    })
                    .await
            },
        )
        .await?;

        let record = result
            .aggregate
            .transaction(transaction_id)
            .cloned()
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;

        tracing::info!(number = %record.number, status = %record.status, "deposit settled");
        if record.is_completed() {
            self.publish_wallet_changes(std::slice::from_ref(&record));
        }
        Ok(record)
    }

    /// Stages the seller's share of a completed order.
    pub async fn stage_seller_earnings(
        &self,
        uow: &mut UnitOfWork,
        seller: &SellerProfile,
        order_id: OrderId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, DomainError> {
        let stream = AggregateId::from(seller.seller_id);
        let mut account = self.accounts.load_in(uow, stream).await?;

        let entry = LedgerEntry::new(
            seller.user_id,
            amount,
            TransactionType::Payout,
            format!("Earnings for order {order_id}"),
        )
        .linked(TransactionLink::Order(order_id));
        let record = TransactionRecord::from_entry(
            entry,
            self.numbers.allocate(at),
            amount,
            TransactionStatus::Completed,
            at,
        );

        let events = account.credit_earnings(seller.seller_id, order_id, record.clone())?;
        uow.stage(&mut account, stream, events)?;
        Ok(record)
    }

    /// Stages the platform's commission on a completed order. The record
    /// belongs to the platform user but lives on the order's own
    /// commission stream.
    pub async fn stage_commission(
        &self,
        uow: &mut UnitOfWork,
        order_id: OrderId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, DomainError> {
        let stream = commission_stream(order_id);
        let mut commission = self.commissions.load_in(uow, stream).await?;

        let entry = LedgerEntry::new(
            self.policy.platform_user_id,
            amount,
            TransactionType::Commission,
            format!("Commission on order {order_id}"),
        )
        .linked(TransactionLink::Order(order_id));
        let record = TransactionRecord::from_entry(
            entry,
            self.numbers.allocate(at),
            amount,
            TransactionStatus::Completed,
            at,
        );

        let events = commission.recognize(order_id, record.clone())?;
        uow.stage(&mut commission, stream, events)?;
        Ok(record)
    }

    /// Stages moving `amount` from available to pending withdrawals.
    pub async fn stage_reserve(
        &self,
        uow: &mut UnitOfWork,
        seller: &SellerProfile,
        withdrawal_id: WithdrawalId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let stream = AggregateId::from(seller.seller_id);
        let mut account = self.accounts.load_in(uow, stream).await?;
        let events = account.reserve(seller.seller_id, seller.user_id, withdrawal_id, amount, at)?;
        uow.stage(&mut account, stream, events)?;
        Ok(())
    }

    /// Stages returning a withdrawal's reservation to the available
    /// balance. Returns the amount released.
    pub async fn stage_release(
        &self,
        uow: &mut UnitOfWork,
        seller_id: SellerId,
        withdrawal_id: WithdrawalId,
        at: DateTime<Utc>,
    ) -> Result<Money, DomainError> {
        let stream = AggregateId::from(seller_id);
        let mut account = self.accounts.load_in(uow, stream).await?;
        let amount = account
            .reservation(withdrawal_id)
            .ok_or(LedgerError::ReservationNotFound(withdrawal_id))?;
        let events = account.release(withdrawal_id, at)?;
        uow.stage(&mut account, stream, events)?;
        Ok(amount)
    }

    /// Stages paying a reservation out of the platform as a negative
    /// payout against the seller's user.
    pub async fn stage_settle_reservation(
        &self,
        uow: &mut UnitOfWork,
        seller_id: SellerId,
        withdrawal_id: WithdrawalId,
        at: DateTime<Utc>,
    ) -> Result<TransactionRecord, DomainError> {
        let stream = AggregateId::from(seller_id);
        let mut account = self.accounts.load_in(uow, stream).await?;
        let (amount, user_id) = match (account.reservation(withdrawal_id), account.user_id()) {
            (Some(amount), Some(user_id)) => (amount, user_id),
            _ => return Err(LedgerError::ReservationNotFound(withdrawal_id).into()),
        };

        let entry = LedgerEntry::new(
            user_id,
            amount,
            TransactionType::Payout,
            format!("Withdrawal {withdrawal_id}"),
        )
        .linked(TransactionLink::Withdrawal(withdrawal_id));
        let record = TransactionRecord::from_entry(
            entry,
            self.numbers.allocate(at),
            -amount,
            TransactionStatus::Completed,
            at,
        );

        let events = account.settle_reservation(withdrawal_id, record.clone())?;
        uow.stage(&mut account, stream, events)?;
        Ok(record)
    }

    /// Counts committed wallet records and tells their owners.
    pub fn publish_wallet_changes(&self, records: &[TransactionRecord]) {
        for record in records {
            observe(record);
        }
        self.ports
            .publish_all(records.iter().filter(|r| r.is_completed()).map(wallet_notification));
    }

    /// Counts committed seller-account records.
    pub fn observe_account_changes(&self, records: &[TransactionRecord]) {
        for record in records {
            observe(record);
        }
    }

    pub async fn wallet(&self, user_id: UserId) -> Result<Wallet, DomainError> {
        self.wallets.load(user_id.into()).await
    }

    pub async fn balance(&self, user_id: UserId) -> Result<Money, DomainError> {
        Ok(self.wallet(user_id).await?.balance())
    }

    pub async fn seller_account(&self, seller_id: SellerId) -> Result<SellerAccount, DomainError> {
        self.accounts.load(seller_id.into()).await
    }

    /// Commission recognized on one order, if it has completed.
    pub async fn order_commission(
        &self,
        order_id: OrderId,
    ) -> Result<Option<TransactionRecord>, DomainError> {
        let commission = self.commissions.load(commission_stream(order_id)).await?;
        Ok(commission.record().cloned())
    }

    /// Every commission the platform has recognized, oldest first.
    pub async fn platform_commissions(&self) -> Result<Vec<TransactionRecord>, DomainError> {
        let events = self
            .store()
            .get_events_by_type("PlatformCommissionRecognized")
            .await?;
        events
            .iter()
            .map(|envelope| -> Result<TransactionRecord, DomainError> {
                match envelope.decode()? {
                    PlatformCommissionEvent::CommissionRecognized(data) => Ok(data.record),
                }
            })
            .collect()
    }

    /// Total commission recognized across all orders.
    pub async fn platform_revenue(&self) -> Result<Money, DomainError> {
        Ok(self
            .platform_commissions()
            .await?
            .iter()
            .map(|r| r.amount)
            .sum())
    }

    /// Wallet history for a user, newest first.
    pub async fn transactions(&self, user_id: UserId) -> Result<Vec<TransactionRecord>, DomainError> {
        let wallet = self.wallet(user_id).await?;
        Ok(wallet.transactions().iter().rev().cloned().collect())
    }
}

fn observe(record: &TransactionRecord) {
    let tx_type = record.tx_type.as_str();
    if record.amount.is_negative() {
        metrics::counter!("ledger_debits_total", "type" => tx_type).increment(1);
    } else {
        metrics::counter!("ledger_credits_total", "type" => tx_type).increment(1);
    }
}

fn wallet_notification(record: &TransactionRecord) -> Notification {
    let kind = if record.amount.is_negative() {
        NotificationKind::WalletDebited
    } else {
        NotificationKind::WalletCredited
    };

    Notification::new(kind, record.settled_at.unwrap_or(record.created_at))
        .to(Recipient::User(record.user_id))
        .with(json!({
            "transaction_id": record.transaction_id,
            "number": record.number,
            "type": record.tx_type,
            "amount": record.amount,
            "link": record.link,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::InMemoryPorts;
    use event_store::InMemoryEventStore;

    fn ledger() -> (Ledger<InMemoryEventStore>, InMemoryPorts) {
        let ports = InMemoryPorts::new();
        let ledger = Ledger::new(
            InMemoryEventStore::new(),
            ports.ports(),
            MarketPolicy::default(),
        );
        (ledger, ports)
    }

    fn entry(user_id: UserId, units: i64, tx_type: TransactionType) -> LedgerEntry {
        LedgerEntry::new(user_id, Money::from_units(units), tx_type, "test")
    }

    #[tokio::test]
    async fn credit_then_debit_moves_balance() {
        let (ledger, ports) = ledger();
        let user = UserId::new();

        ledger
            .credit(entry(user, 100, TransactionType::Deposit))
            .await
            .unwrap();
        let debit = ledger
            .debit(entry(user, 40, TransactionType::OrderPayment))
            .await
            .unwrap();

        assert_eq!(debit.amount, Money::from_units(-40));
        assert_eq!(ledger.balance(user).await.unwrap(), Money::from_units(60));
        assert_eq!(ports.publisher.of_kind(NotificationKind::WalletDebited).len(), 1);
        assert_eq!(ports.publisher.of_kind(NotificationKind::WalletCredited).len(), 1);
    }

    #[tokio::test]
    async fn overdraft_fails_without_a_record() {
        let (ledger, _) = ledger();
        let user = UserId::new();
        ledger
            .credit(entry(user, 10, TransactionType::Deposit))
            .await
            .unwrap();

        let err = ledger
            .debit(entry(user, 11, TransactionType::OrderPayment))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::InsufficientFunds);
        assert_eq!(ledger.transactions(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn zero_amounts_are_rejected() {
        let (ledger, _) = ledger();
        let err = ledger
            .credit(entry(UserId::new(), 0, TransactionType::Deposit))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn deposits_beyond_the_limit_are_rejected() {
        let (ledger, _) = ledger();
        let user = UserId::new();
        let err = ledger
            .record_deposit(&Caller::customer(user), Money::from_cents(i64::MAX), "gw-big")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert!(ledger.transactions(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commissions_land_on_per_order_streams() {
        let (ledger, _) = ledger();
        let at = Utc::now();
        let first = OrderId::new();
        let second = OrderId::new();

        // Two units staged from the same empty state both commit.
        let mut a = UnitOfWork::new(at);
        let mut b = UnitOfWork::new(at);
        ledger
            .stage_commission(&mut a, first, Money::from_cents(22_50), at)
            .await
            .unwrap();
        ledger
            .stage_commission(&mut b, second, Money::from_cents(10_00), at)
            .await
            .unwrap();
        a.commit(ledger.store()).await.unwrap();
        b.commit(ledger.store()).await.unwrap();

        let platform = MarketPolicy::default().platform_user_id;
        let recorded = ledger.order_commission(first).await.unwrap().unwrap();
        assert_eq!(recorded.user_id, platform);
        assert_eq!(recorded.tx_type, TransactionType::Commission);
        assert_eq!(ledger.platform_commissions().await.unwrap().len(), 2);
        assert_eq!(
            ledger.platform_revenue().await.unwrap(),
            Money::from_cents(32_50)
        );
        assert!(ledger.balance(platform).await.unwrap().is_zero());

        let mut again = UnitOfWork::new(at);
        let err = ledger
            .stage_commission(&mut again, first, Money::from_cents(1), at)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::StateConflict);
    }

    #[tokio::test]
    async fn deposits_wait_for_admin_settlement() {
        let (ledger, _) = ledger();
        let user = UserId::new();
        let customer = Caller::customer(user);

        let pending = ledger
            .record_deposit(&customer, Money::from_units(250), "gw-1")
            .await
            .unwrap();
        assert_eq!(pending.status, TransactionStatus::Pending);
        assert!(ledger.balance(user).await.unwrap().is_zero());

        let denied = ledger
            .settle_deposit(&customer, user, pending.transaction_id, SettlementOutcome::Completed)
            .await;
        assert!(matches!(denied, Err(DomainError::Forbidden(_))));

        let admin = Caller::admin(UserId::new());
        let settled = ledger
            .settle_deposit(&admin, user, pending.transaction_id, SettlementOutcome::Completed)
            .await
            .unwrap();
        assert_eq!(settled.status, TransactionStatus::Completed);
        assert_eq!(ledger.balance(user).await.unwrap(), Money::from_units(250));
    }

    #[tokio::test]
    async fn staged_changes_vanish_when_the_unit_is_dropped() {
        let (ledger, _) = ledger();
        let user = UserId::new();
        let at = Utc::now();
        {
            let mut uow = UnitOfWork::new(at);
            ledger
                .stage_credit(&mut uow, entry(user, 5, TransactionType::Deposit), at)
                .await
                .unwrap();
        }
        assert!(ledger.balance(user).await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn two_stages_on_one_wallet_share_the_unit() {
        let (ledger, _) = ledger();
        let user = UserId::new();
        let at = Utc::now();

        let mut uow = UnitOfWork::new(at);
        ledger
            .stage_credit(&mut uow, entry(user, 30, TransactionType::Deposit), at)
            .await
            .unwrap();
        // The debit sees the staged credit.
        ledger
            .stage_debit(&mut uow, entry(user, 20, TransactionType::OrderPayment), at)
            .await
            .unwrap();
        uow.commit(ledger.store()).await.unwrap();

        assert_eq!(ledger.balance(user).await.unwrap(), Money::from_units(10));
    }

    #[tokio::test]
    async fn seller_reservation_round_trip() {
        let (ledger, _) = ledger();
        let seller = SellerProfile {
            seller_id: SellerId::new(),
            user_id: UserId::new(),
            store_name: "s".into(),
            approved: true,
        };
        let at = Utc::now();

        let mut uow = UnitOfWork::new(at);
        ledger
            .stage_seller_earnings(&mut uow, &seller, OrderId::new(), Money::from_units(1500), at)
            .await
            .unwrap();
        uow.commit(ledger.store()).await.unwrap();

        let withdrawal = WithdrawalId::new();
        let mut uow = UnitOfWork::new(at);
        ledger
            .stage_reserve(&mut uow, &seller, withdrawal, Money::from_units(1000), at)
            .await
            .unwrap();
        uow.commit(ledger.store()).await.unwrap();

        let mut uow = UnitOfWork::new(at);
        let payout = ledger
            .stage_settle_reservation(&mut uow, seller.seller_id, withdrawal, at)
            .await
            .unwrap();
        uow.commit(ledger.store()).await.unwrap();

        assert_eq!(payout.amount, Money::from_units(-1000));
        assert_eq!(payout.user_id, seller.user_id);
        let account = ledger.seller_account(seller.seller_id).await.unwrap();
        assert_eq!(account.available_balance(), Money::from_units(500));
        assert!(account.pending_withdrawals().is_zero());
        assert_eq!(account.total_earnings(), Money::from_units(1500));
    }
}
