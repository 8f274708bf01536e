//! Needs, offers and the negotiation engine.

mod commands;
mod engine;
mod events;
mod need;
mod state;

pub use commands::{AcceptOffer, CancelNeed, CreateNeed, SubmitOffer};
pub use engine::{AcceptedOffer, ExpiryReport, NegotiationEngine};
pub use events::{
    NeedCancelledData, NeedCreatedData, NeedEvent, NeedExpiredData, OfferAcceptedData,
    OfferExpiredData, OfferRevisedData, OfferSubmittedData,
};
pub use need::{Need, Offer};
pub use state::{NeedStatus, OfferStatus};

use common::{Money, OfferId, ProductId};
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum NeedError {
    #[error("Need already created")]
    AlreadyCreated,

    #[error("Invalid quantity: {quantity} (must be between 1 and 10000)")]
    InvalidQuantity { quantity: u32 },

    #[error("Product {0} cannot be requested")]
    ProductUnavailable(ProductId),

    #[error("Invalid price: {price} (must be greater than 0 and at most 10000000000.00)")]
    InvalidPrice { price: Money },

    #[error("Offer of {price} for {quantity} units exceeds the order limit")]
    TotalOutOfRange { price: Money, quantity: u32 },

    #[error("Seller is not approved")]
    SellerNotApproved,

    #[error("Seller must be online to make offers")]
    SellerOffline,

    #[error("Seller does not list product {product_id}")]
    NotListed { product_id: ProductId },

    #[error("Need has expired")]
    NeedExpired,

    #[error("Need is {status}")]
    NeedNotAvailable { status: NeedStatus },

    #[error("Offer {0} is no longer available")]
    OfferNotAvailable(OfferId),

    #[error("Need belongs to another customer")]
    NotOwner,
}

impl NeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NeedError::InvalidQuantity { .. }
            | NeedError::ProductUnavailable(_)
            | NeedError::InvalidPrice { .. }
            | NeedError::TotalOutOfRange { .. } => ErrorKind::Validation,
            NeedError::SellerNotApproved | NeedError::NotListed { .. } | NeedError::NotOwner => {
                ErrorKind::Forbidden
            }
            NeedError::AlreadyCreated
            | NeedError::SellerOffline
            | NeedError::NeedExpired
            | NeedError::NeedNotAvailable { .. }
            | NeedError::OfferNotAvailable(_) => ErrorKind::StateConflict,
        }
    }
}
