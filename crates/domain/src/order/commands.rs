//! Order commands.

use common::{ListingId, Money, OrderId, ProductId, SellerId, UserId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderSource, PaymentMethod};

/// Buy from a seller's standing listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDirectOrder {
    pub listing_id: ListingId,
    pub mobile: String,
    pub quantity: u32,
    pub payment_method: PaymentMethod,
}

impl CreateDirectOrder {
    pub fn new(
        listing_id: ListingId,
        mobile: impl Into<String>,
        quantity: u32,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            listing_id,
            mobile: mobile.into(),
            quantity,
            payment_method,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub reason: String,
}

impl CancelOrder {
    pub fn new(order_id: OrderId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            reason: reason.into(),
        }
    }
}

/// Terms of a new order, however it was reached.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub mobile: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub payment_method: PaymentMethod,
    pub source: OrderSource,
}

impl PlaceOrder {
    /// `unit_price × quantity`, refused when it leaves the money range.
    pub fn total_amount(&self) -> Result<Money, OrderError> {
        self.unit_price
            .checked_mul(self.quantity)
            .filter(Money::is_within_limit)
            .ok_or(OrderError::TotalOutOfRange {
                unit_price: self.unit_price,
                quantity: self.quantity,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(unit_price: Money, quantity: u32) -> PlaceOrder {
        PlaceOrder {
            order_id: OrderId::new(),
            customer_id: UserId::new(),
            seller_id: SellerId::new(),
            product_id: ProductId::new("SKU"),
            mobile: "0700000000".into(),
            unit_price,
            quantity,
            payment_method: PaymentMethod::Wallet,
            source: OrderSource::Direct {
                listing_id: ListingId::new(),
            },
        }
    }

    #[test]
    fn total_is_price_times_quantity() {
        let total = terms(Money::from_units(120), 2).total_amount().unwrap();
        assert_eq!(total, Money::from_units(240));
    }

    #[test]
    fn totals_that_overflow_are_refused() {
        let wraps = terms(Money::from_cents(5_000_000_000), 4_000_000_000).total_amount();
        assert!(matches!(
            wraps,
            Err(OrderError::TotalOutOfRange {
                quantity: 4_000_000_000,
                ..
            })
        ));

        let over_limit = terms(Money::MAX, 2).total_amount();
        assert!(matches!(over_limit, Err(OrderError::TotalOutOfRange { .. })));
    }
}
