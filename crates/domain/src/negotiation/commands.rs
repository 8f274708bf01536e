//! Negotiation commands.

use common::{Money, NeedId, OfferId, ProductId};
use serde::{Deserialize, Serialize};

use crate::order::PaymentMethod;

/// Broadcast a request for a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNeed {
    pub product_id: ProductId,
    pub operator: String,
    pub mobile: String,
    pub quantity: u32,
}

impl CreateNeed {
    pub fn new(
        product_id: impl Into<ProductId>,
        operator: impl Into<String>,
        mobile: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            operator: operator.into(),
            mobile: mobile.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitOffer {
    pub need_id: NeedId,
    /// Unit price.
    pub price: Money,
}

impl SubmitOffer {
    pub fn new(need_id: NeedId, price: Money) -> Self {
        Self { need_id, price }
    }
}

#[derive(Debug, Clone)]
pub struct AcceptOffer {
    pub need_id: NeedId,
    pub offer_id: OfferId,
    pub payment_method: PaymentMethod,
}

impl AcceptOffer {
    pub fn new(need_id: NeedId, offer_id: OfferId, payment_method: PaymentMethod) -> Self {
        Self {
            need_id,
            offer_id,
            payment_method,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelNeed {
    pub need_id: NeedId,
    pub reason: String,
}

impl CancelNeed {
    pub fn new(need_id: NeedId, reason: impl Into<String>) -> Self {
        Self {
            need_id,
            reason: reason.into(),
        }
    }
}
