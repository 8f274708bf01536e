//! Shared kernel for the marketplace workspace.
//!
//! Everything here is plain data: identifiers, the [`Money`] amount type,
//! the commission split used by both negotiated and direct orders, and the
//! resolved caller identity handed to every operation.

pub mod commission;
pub mod identity;
pub mod ids;
pub mod money;

pub use commission::{CommissionRate, CommissionSplit, split};
pub use identity::{Caller, Role};
pub use ids::{
    AggregateId, ListingId, NeedId, OfferId, OrderId, ProductId, SellerId, TransactionId, UserId,
    WithdrawalId,
};
pub use money::Money;
