use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected version of the aggregate for optimistic concurrency control.
    /// If None, no version check is performed.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the aggregate to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the aggregate to not exist (new aggregate).
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Events for one stream inside an atomic batch.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub aggregate_id: AggregateId,
    pub events: Vec<EventEnvelope>,
    pub options: AppendOptions,
}

impl StreamAppend {
    pub fn new(aggregate_id: AggregateId, events: Vec<EventEnvelope>, options: AppendOptions) -> Self {
        Self {
            aggregate_id,
            events,
            options,
        }
    }

    /// The version the stream will be at once this append lands.
    pub fn last_version(&self) -> Version {
        self.events
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial())
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for event store implementations.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Commits events for several streams atomically.
    ///
    /// Every stream's expected version is checked before anything is
    /// written; a single mismatch fails the whole batch with
    /// `ConcurrencyConflict` and leaves the store untouched.
    ///
    /// Returns the new version of each stream, in batch order.
    async fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>>;

    /// Retrieves all events for a specific aggregate, oldest first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events by type, in commit order.
    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>>;

    /// Streams all events in the store, in commit order.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Gets the current version of an aggregate, or None if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends events to a single stream.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let aggregate_id = events
            .first()
            .map(|e| e.aggregate_id)
            .ok_or_else(|| EventStoreError::InvalidAppend("empty event list".to_string()))?;

        let versions = self
            .append_batch(vec![StreamAppend::new(aggregate_id, events, options)])
            .await?;

        versions
            .into_iter()
            .next()
            .ok_or_else(|| EventStoreError::InvalidAppend("no version returned".to_string()))
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before any backend touches storage.
///
/// Each stream must be non-empty, hold events for its own aggregate only,
/// carry sequential versions, and appear at most once in the batch.
pub fn validate_batch(batch: &[StreamAppend]) -> Result<()> {
    if batch.is_empty() {
        return Err(EventStoreError::InvalidAppend("empty batch".to_string()));
    }

    let mut seen = HashSet::new();
    for stream in batch {
        if !seen.insert(stream.aggregate_id) {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {} appears twice in one batch",
                stream.aggregate_id
            )));
        }

        let Some(first) = stream.events.first() else {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {} has no events",
                stream.aggregate_id
            )));
        };

        let mut expected = first.version;
        for (i, event) in stream.events.iter().enumerate() {
            if event.aggregate_id != stream.aggregate_id {
                return Err(EventStoreError::InvalidAppend(
                    "all events must be for the same aggregate".to_string(),
                ));
            }
            if event.aggregate_type != first.aggregate_type {
                return Err(EventStoreError::InvalidAppend(
                    "all events must have the same aggregate type".to_string(),
                ));
            }
            if i > 0 {
                expected = expected.next();
                if event.version != expected {
                    return Err(EventStoreError::InvalidAppend(format!(
                        "event versions must be sequential: expected {expected}, got {}",
                        event.version
                    )));
                }
            }
        }

        if let Some(expected_version) = stream.options.expected_version
            && first.version != expected_version.next()
        {
            return Err(EventStoreError::InvalidAppend(format!(
                "first event version {} does not follow expected version {expected_version}",
                first.version
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Test")
            .event_type("Tested")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn accepts_well_formed_batch() {
        let a = AggregateId::new();
        let b = AggregateId::new();
        let batch = vec![
            StreamAppend::new(a, vec![event(a, 1), event(a, 2)], AppendOptions::expect_new()),
            StreamAppend::new(b, vec![event(b, 4)], AppendOptions::expect_version(Version::new(3))),
        ];
        assert!(validate_batch(&batch).is_ok());
        assert_eq!(batch[0].last_version(), Version::new(2));
    }

    #[test]
    fn rejects_duplicate_streams() {
        let a = AggregateId::new();
        let batch = vec![
            StreamAppend::new(a, vec![event(a, 1)], AppendOptions::new()),
            StreamAppend::new(a, vec![event(a, 2)], AppendOptions::new()),
        ];
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn rejects_gaps_in_versions() {
        let a = AggregateId::new();
        let batch = vec![StreamAppend::new(
            a,
            vec![event(a, 1), event(a, 3)],
            AppendOptions::new(),
        )];
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn rejects_foreign_events() {
        let a = AggregateId::new();
        let b = AggregateId::new();
        let batch = vec![StreamAppend::new(a, vec![event(b, 1)], AppendOptions::new())];
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn rejects_empty_batch() {
        assert!(validate_batch(&[]).is_err());
    }
}
