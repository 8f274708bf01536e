use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{EventStore, EventStream, StreamAppend, validate_batch},
};

#[derive(Default)]
struct MemoryLog {
    /// Every event in commit order.
    events: Vec<EventEnvelope>,
    versions: HashMap<AggregateId, Version>,
}

impl MemoryLog {
    fn version_of(&self, aggregate_id: AggregateId) -> Version {
        self.versions
            .get(&aggregate_id)
            .copied()
            .unwrap_or(Version::initial())
    }
}

/// In-memory event store.
///
/// One lock guards the whole log, so a batch is checked and applied as a
/// single step and readers never observe half of a commit.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<MemoryLog>>,
    fail_next: Arc<AtomicBool>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }

    /// Makes the next `append_batch` fail with `Unavailable` after its
    /// version checks pass, without writing anything.
    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Clears all events.
    pub async fn clear(&self) {
        let mut log = self.log.write().await;
        log.events.clear();
        log.versions.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>> {
        validate_batch(&batch)?;

        let mut log = self.log.write().await;

        for stream in &batch {
            let current = log.version_of(stream.aggregate_id);

            if let Some(expected) = stream.options.expected_version
                && current != expected
            {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: stream.aggregate_id,
                    expected,
                    actual: current,
                });
            }

            // Unique (aggregate, version) constraint
            if let Some(first) = stream.events.first()
                && first.version != current.next()
            {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: stream.aggregate_id,
                    expected: first.version,
                    actual: current,
                });
            }
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EventStoreError::Unavailable(
                "injected commit failure".to_string(),
            ));
        }

        let mut versions = Vec::with_capacity(batch.len());
        for stream in batch {
            let last = stream.last_version();
            log.versions.insert(stream.aggregate_id, last);
            log.events.extend(stream.events);
            versions.push(last);
        }

        tracing::debug!(streams = versions.len(), "committed batch");
        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.log.read().await.events.clone();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.log.read().await.versions.get(&aggregate_id).copied())
    }
}
