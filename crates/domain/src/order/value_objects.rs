//! Value objects carried by orders.

use common::{ListingId, NeedId, OfferId, SellerId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Paid from the customer's platform wallet at order time.
    Wallet,
    /// Paid through the external gateway rail.
    Gateway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

/// How an order came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OrderSource {
    /// Bought from a seller's standing listing.
    Direct { listing_id: ListingId },
    /// Created by accepting an offer on a need.
    Negotiated { need_id: NeedId, offer_id: OfferId },
}

/// Who is acting on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderActor {
    Customer(UserId),
    Seller { seller_id: SellerId, user_id: UserId },
    Admin(UserId),
}

impl OrderActor {
    pub fn user_id(&self) -> UserId {
        match self {
            OrderActor::Customer(user_id) | OrderActor::Admin(user_id) => *user_id,
            OrderActor::Seller { user_id, .. } => *user_id,
        }
    }

    pub fn role(&self) -> common::Role {
        match self {
            OrderActor::Customer(_) => common::Role::Customer,
            OrderActor::Seller { .. } => common::Role::Seller,
            OrderActor::Admin(_) => common::Role::Admin,
        }
    }
}
