//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, OrderId, ProductId, SellerId, TransactionId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::policy::MAX_QUANTITY;

use super::{
    OrderActor, OrderError, OrderEvent, OrderSource, OrderStatus, PaymentMethod, PaymentStatus,
    events::{
        OrderAssignedData, OrderCancelledData, OrderCompletedData, OrderPlacedData,
        OrderProcessingStartedData,
    },
};

/// Order aggregate root.
///
/// Prices and the commission split are fixed when the order is placed and
/// never re-read from the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<OrderId>,

    #[serde(default)]
    version: Version,

    customer_id: Option<UserId>,
    seller_id: Option<SellerId>,
    product_id: ProductId,
    mobile: String,
    unit_price: Money,
    quantity: u32,

    /// Always `commission + seller_amount`.
    total_amount: Money,
    commission: Money,
    seller_amount: Money,

    payment_method: Option<PaymentMethod>,
    payment_status: PaymentStatus,
    payment_transaction_id: Option<TransactionId>,
    source: Option<OrderSource>,

    status: OrderStatus,
    placed_at: Option<DateTime<Utc>>,
    assigned_at: Option<DateTime<Utc>>,
    processing_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<UserId>,
    cancellation_reason: Option<String>,
    payout_transaction_id: Option<TransactionId>,
    refund_transaction_id: Option<TransactionId>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.map(Into::into)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_placed(data),
            OrderEvent::OrderAssigned(data) => {
                self.status = OrderStatus::Assigned;
                self.assigned_at = Some(data.assigned_at);
            }
            OrderEvent::OrderProcessingStarted(data) => {
                self.status = OrderStatus::Processing;
                self.processing_at = Some(data.started_at);
            }
            OrderEvent::OrderCompleted(data) => {
                self.status = OrderStatus::Completed;
                self.completed_at = Some(data.completed_at);
                self.payout_transaction_id = Some(data.payout_transaction_id);
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.cancelled_at = Some(data.cancelled_at);
                self.cancelled_by = Some(data.cancelled_by);
                self.cancellation_reason = Some(data.reason);
                self.refund_transaction_id = data.refund_transaction_id;
            }
        }
    }
}

// Query methods
impl Order {
    pub fn order_id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn customer_id(&self) -> Option<UserId> {
        self.customer_id
    }

    pub fn seller_id(&self) -> Option<SellerId> {
        self.seller_id
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn mobile(&self) -> &str {
        &self.mobile
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn commission(&self) -> Money {
        self.commission
    }

    pub fn seller_amount(&self) -> Money {
        self.seller_amount
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_transaction_id(&self) -> Option<TransactionId> {
        self.payment_transaction_id
    }

    pub fn source(&self) -> Option<OrderSource> {
        self.source
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.assigned_at
    }

    pub fn processing_at(&self) -> Option<DateTime<Utc>> {
        self.processing_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancelled_by(&self) -> Option<UserId> {
        self.cancelled_by
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn payout_transaction_id(&self) -> Option<TransactionId> {
        self.payout_transaction_id
    }

    pub fn refund_transaction_id(&self) -> Option<TransactionId> {
        self.refund_transaction_id
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when cancelling must give the customer their money back.
    pub fn refund_due(&self) -> bool {
        self.payment_method == Some(PaymentMethod::Wallet)
            && self.payment_status == PaymentStatus::Paid
    }

    /// Customers and sellers of the order, and every admin.
    pub fn is_party(&self, actor: &OrderActor) -> bool {
        match actor {
            OrderActor::Customer(user_id) => self.customer_id == Some(*user_id),
            OrderActor::Seller { seller_id, .. } => self.seller_id == Some(*seller_id),
            OrderActor::Admin(_) => true,
        }
    }
}

// Command methods
impl Order {
    pub fn place(&self, data: OrderPlacedData) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }

        if data.quantity == 0 || data.quantity > MAX_QUANTITY {
            return Err(OrderError::InvalidQuantity {
                quantity: data.quantity,
            });
        }

        if !data.unit_price.is_positive() || !data.unit_price.is_within_limit() {
            return Err(OrderError::InvalidPrice {
                price: data.unit_price,
            });
        }

        if !data.total_amount.is_within_limit()
            || data.commission.checked_add(data.seller_amount) != Some(data.total_amount)
        {
            return Err(OrderError::TotalOutOfRange {
                unit_price: data.unit_price,
                quantity: data.quantity,
            });
        }

        Ok(vec![OrderEvent::OrderPlaced(data)])
    }

    pub fn accept(
        &self,
        seller_id: SellerId,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let order_id = self.ensure_seller(seller_id)?;
        self.ensure(self.status.can_accept(), "accept")?;

        Ok(vec![OrderEvent::OrderAssigned(OrderAssignedData {
            order_id,
            seller_id,
            assigned_at: at,
        })])
    }

    pub fn start_processing(
        &self,
        seller_id: SellerId,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let order_id = self.ensure_seller(seller_id)?;
        self.ensure(self.status.can_start_processing(), "start processing")?;

        Ok(vec![OrderEvent::OrderProcessingStarted(
            OrderProcessingStartedData {
                order_id,
                started_at: at,
            },
        )])
    }

    /// Checks completion preconditions before any ledger work is staged.
    pub fn ensure_completable(&self, seller_id: SellerId) -> Result<OrderId, OrderError> {
        let order_id = self.ensure_seller(seller_id)?;
        self.ensure(self.status.can_complete(), "complete")?;
        Ok(order_id)
    }

    pub fn complete(
        &self,
        seller_id: SellerId,
        payout_transaction_id: TransactionId,
        commission_transaction_id: Option<TransactionId>,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let order_id = self.ensure_completable(seller_id)?;

        Ok(vec![OrderEvent::OrderCompleted(OrderCompletedData {
            order_id,
            payout_transaction_id,
            commission_transaction_id,
            completed_at: at,
        })])
    }

    /// Checks cancellation preconditions before any refund is staged.
    pub fn ensure_cancellable(&self, actor: &OrderActor) -> Result<OrderId, OrderError> {
        let order_id = self.id.ok_or(OrderError::NotOrderParty)?;
        if !self.is_party(actor) {
            return Err(OrderError::NotOrderParty);
        }

        self.ensure(self.status.can_cancel(), "cancel")?;

        if matches!(actor, OrderActor::Customer(_)) && !self.status.customer_can_cancel() {
            return Err(OrderError::CustomerCannotCancel {
                status: self.status,
            });
        }

        Ok(order_id)
    }

    pub fn cancel(
        &self,
        actor: &OrderActor,
        reason: impl Into<String>,
        refund_transaction_id: Option<TransactionId>,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let order_id = self.ensure_cancellable(actor)?;

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelledData {
            order_id,
            cancelled_by: actor.user_id(),
            role: actor.role(),
            reason: reason.into(),
            refund_transaction_id,
            cancelled_at: at,
        })])
    }

    fn ensure_seller(&self, seller_id: SellerId) -> Result<OrderId, OrderError> {
        match self.id {
            Some(order_id) if self.seller_id == Some(seller_id) => Ok(order_id),
            _ => Err(OrderError::NotOrderSeller),
        }
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), OrderError> {
        if allowed {
            Ok(())
        } else {
            Err(OrderError::InvalidState {
                status: self.status,
                action,
            })
        }
    }
}

// Apply helpers
impl Order {
    fn apply_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.customer_id = Some(data.customer_id);
        self.seller_id = Some(data.seller_id);
        self.product_id = data.product_id;
        self.mobile = data.mobile;
        self.unit_price = data.unit_price;
        self.quantity = data.quantity;
        self.total_amount = data.total_amount;
        self.commission = data.commission;
        self.seller_amount = data.seller_amount;
        self.payment_method = Some(data.payment_method);
        self.payment_status = data.payment_status;
        self.payment_transaction_id = data.payment_transaction_id;
        self.source = Some(data.source);
        self.status = OrderStatus::Pending;
        self.placed_at = Some(data.placed_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CommissionRate, ListingId, split};

    fn placed(method: PaymentMethod) -> (Order, UserId, SellerId) {
        let customer = UserId::new();
        let seller = SellerId::new();
        let total = Money::from_units(450);
        let parts = split(total, CommissionRate::DEFAULT);
        let paid = method == PaymentMethod::Wallet;

        let mut order = Order::default();
        let events = order
            .place(OrderPlacedData {
                order_id: OrderId::new(),
                customer_id: customer,
                seller_id: seller,
                product_id: ProductId::new("SKU-1"),
                mobile: "0700000000".into(),
                unit_price: total,
                quantity: 1,
                total_amount: total,
                commission: parts.commission,
                seller_amount: parts.seller_amount,
                payment_method: method,
                payment_status: if paid {
                    PaymentStatus::Paid
                } else {
                    PaymentStatus::Pending
                },
                payment_transaction_id: paid.then(TransactionId::new),
                source: OrderSource::Direct {
                    listing_id: ListingId::new(),
                },
                placed_at: Utc::now(),
            })
            .unwrap();
        order.apply_events(events);
        (order, customer, seller)
    }

    fn seller_actor(seller_id: SellerId) -> OrderActor {
        OrderActor::Seller {
            seller_id,
            user_id: UserId::new(),
        }
    }

    #[test]
    fn placing_fixes_the_split() {
        let (order, customer, _) = placed(PaymentMethod::Wallet);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.customer_id(), Some(customer));
        assert_eq!(order.commission(), Money::from_cents(22_50));
        assert_eq!(order.seller_amount(), Money::from_cents(427_50));
        assert_eq!(
            order.commission() + order.seller_amount(),
            order.total_amount()
        );
        assert!(order.refund_due());
    }

    #[test]
    fn placing_twice_fails() {
        let (order, _, _) = placed(PaymentMethod::Gateway);
        let again = order.place(OrderPlacedData {
            order_id: OrderId::new(),
            customer_id: UserId::new(),
            seller_id: SellerId::new(),
            product_id: ProductId::new("x"),
            mobile: String::new(),
            unit_price: Money::from_units(1),
            quantity: 1,
            total_amount: Money::from_units(1),
            commission: Money::zero(),
            seller_amount: Money::from_units(1),
            payment_method: PaymentMethod::Gateway,
            payment_status: PaymentStatus::Pending,
            payment_transaction_id: None,
            source: OrderSource::Direct {
                listing_id: ListingId::new(),
            },
            placed_at: Utc::now(),
        });
        assert!(matches!(again, Err(OrderError::AlreadyPlaced)));
    }

    #[test]
    fn placement_outside_the_money_limits_is_rejected() {
        let data = |unit_price: Money, quantity: u32, total: Money| OrderPlacedData {
            order_id: OrderId::new(),
            customer_id: UserId::new(),
            seller_id: SellerId::new(),
            product_id: ProductId::new("x"),
            mobile: String::new(),
            unit_price,
            quantity,
            total_amount: total,
            commission: Money::zero(),
            seller_amount: total,
            payment_method: PaymentMethod::Gateway,
            payment_status: PaymentStatus::Pending,
            payment_transaction_id: None,
            source: OrderSource::Direct {
                listing_id: ListingId::new(),
            },
            placed_at: Utc::now(),
        };
        let order = Order::default();

        let too_many = order.place(data(
            Money::from_units(1),
            MAX_QUANTITY + 1,
            Money::from_units(1),
        ));
        assert!(matches!(too_many, Err(OrderError::InvalidQuantity { .. })));

        let too_dear = Money::from_cents(i64::MAX);
        let too_dear = order.place(data(too_dear, 1, too_dear));
        assert!(matches!(too_dear, Err(OrderError::InvalidPrice { .. })));

        let huge_total = Money::from_cents(Money::MAX.cents() + 1);
        let over = order.place(data(Money::MAX, 2, huge_total));
        assert!(matches!(over, Err(OrderError::TotalOutOfRange { .. })));
    }

    #[test]
    fn happy_path_through_processing() {
        let (mut order, _, seller) = placed(PaymentMethod::Gateway);
        let now = Utc::now();

        order.apply_events(order.accept(seller, now).unwrap());
        assert_eq!(order.status(), OrderStatus::Assigned);
        assert_eq!(order.assigned_at(), Some(now));

        order.apply_events(order.start_processing(seller, now).unwrap());
        assert_eq!(order.status(), OrderStatus::Processing);

        let payout = TransactionId::new();
        order.apply_events(order.complete(seller, payout, None, now).unwrap());
        assert_eq!(order.status(), OrderStatus::Completed);
        assert_eq!(order.payout_transaction_id(), Some(payout));
    }

    #[test]
    fn only_the_order_seller_may_act() {
        let (order, _, _) = placed(PaymentMethod::Gateway);
        let result = order.accept(SellerId::new(), Utc::now());
        assert!(matches!(result, Err(OrderError::NotOrderSeller)));
    }

    #[test]
    fn completion_requires_assignment() {
        let (order, _, seller) = placed(PaymentMethod::Gateway);
        let result = order.complete(seller, TransactionId::new(), None, Utc::now());
        assert!(matches!(
            result,
            Err(OrderError::InvalidState {
                status: OrderStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn customer_may_cancel_only_while_pending() {
        let (mut order, customer, seller) = placed(PaymentMethod::Wallet);
        let customer = OrderActor::Customer(customer);
        assert!(order.ensure_cancellable(&customer).is_ok());

        order.apply_events(order.accept(seller, Utc::now()).unwrap());
        let denied = order.cancel(&customer, "changed my mind", None, Utc::now());
        assert!(matches!(
            denied,
            Err(OrderError::CustomerCannotCancel { .. })
        ));

        let events = order
            .cancel(&seller_actor(seller), "out of stock", None, Utc::now())
            .unwrap();
        order.apply_events(events);
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.cancellation_reason(), Some("out of stock"));
    }

    #[test]
    fn strangers_cannot_cancel() {
        let (order, _, _) = placed(PaymentMethod::Gateway);
        let stranger = OrderActor::Customer(UserId::new());
        assert!(matches!(
            order.ensure_cancellable(&stranger),
            Err(OrderError::NotOrderParty)
        ));
        assert!(order.ensure_cancellable(&OrderActor::Admin(UserId::new())).is_ok());
    }

    #[test]
    fn terminal_orders_reject_every_action() {
        let (mut order, _, seller) = placed(PaymentMethod::Gateway);
        let admin = OrderActor::Admin(UserId::new());
        order.apply_events(order.cancel(&admin, "fraud", None, Utc::now()).unwrap());

        assert!(matches!(
            order.accept(seller, Utc::now()),
            Err(OrderError::InvalidState { .. })
        ));
        assert!(matches!(
            order.cancel(&admin, "again", None, Utc::now()),
            Err(OrderError::InvalidState { .. })
        ));
    }

    #[test]
    fn gateway_orders_are_not_refunded() {
        let (order, _, _) = placed(PaymentMethod::Gateway);
        assert!(!order.refund_due());
    }
}
