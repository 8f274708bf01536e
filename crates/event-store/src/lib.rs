//! Event persistence for the marketplace.
//!
//! Every aggregate is a stream of events keyed by [`AggregateId`]. Appends
//! carry an expected [`Version`] per stream, and [`EventStore::append_batch`]
//! commits several streams at once: all version checks pass and all events
//! land, or nothing is written.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream, StreamAppend};
