//! Fan-out notifier.
//!
//! Engines hand finished notifications to [`FanOut`], which queues them on
//! an unbounded channel and returns at once. A background task expands
//! each notification into one delivery per recipient and pushes it
//! through a [`Transport`], retrying a bounded number of times. Delivery
//! failures are logged and counted; they never reach the operation that
//! produced the notification.

pub mod dispatcher;
pub mod error;
pub mod transport;

pub use dispatcher::{DeliveryPolicy, FanOut, deliver_with_retry};
pub use error::FanoutError;
pub use transport::{Delivery, InMemoryTransport, LogTransport, Transport};
