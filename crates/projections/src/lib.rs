//! Read models fed from the event log.
//!
//! - [`Projection`] trait for folding events into a read model
//! - [`ProjectionProcessor`] for catching projections up with the store
//! - [`OpenNeedsView`]: active needs and their pending offers; drives the
//!   expiry sweeper and the seller dashboard
//! - [`OrderBoardView`]: order summaries per customer and per seller

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{OpenNeedSummary, OpenNeedsView, OrderBoardView, OrderSummary};
