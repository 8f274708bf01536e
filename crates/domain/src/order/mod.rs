//! Orders: the unit of fulfillment and its state machine.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use commands::{CancelOrder, CreateDirectOrder, PlaceOrder};
pub use events::{
    OrderAssignedData, OrderCancelledData, OrderCompletedData, OrderEvent, OrderPlacedData,
    OrderProcessingStartedData,
};
pub use service::{OrderEngine, PlacedOrder};
pub use state::OrderStatus;
pub use value_objects::{OrderActor, OrderSource, PaymentMethod, PaymentStatus};

use common::{ListingId, Money};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Invalid quantity: {quantity} (must be between 1 and 10000)")]
    InvalidQuantity { quantity: u32 },

    #[error("Invalid price: {price} (must be greater than 0 and at most 10000000000.00)")]
    InvalidPrice { price: Money },

    #[error("Order total of {quantity} x {unit_price} exceeds 10000000000.00")]
    TotalOutOfRange { unit_price: Money, quantity: u32 },

    /// The order's status does not allow the action.
    #[error("Invalid state transition: cannot {action} a {status} order")]
    InvalidState {
        status: OrderStatus,
        action: &'static str,
    },

    #[error("Listing {0} is not available")]
    ListingUnavailable(ListingId),

    #[error("Caller is not the seller of this order")]
    NotOrderSeller,

    #[error("Caller is not a party to this order")]
    NotOrderParty,

    #[error("Customers cannot cancel an order that is already {status}")]
    CustomerCannotCancel { status: OrderStatus },
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::InvalidQuantity { .. }
            | OrderError::InvalidPrice { .. }
            | OrderError::TotalOutOfRange { .. } => ErrorKind::Validation,
            OrderError::AlreadyPlaced
            | OrderError::InvalidState { .. }
            | OrderError::ListingUnavailable(_) => ErrorKind::StateConflict,
            OrderError::NotOrderSeller
            | OrderError::NotOrderParty
            | OrderError::CustomerCannotCancel { .. } => ErrorKind::Forbidden,
        }
    }
}
