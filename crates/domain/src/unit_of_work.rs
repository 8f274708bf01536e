//! Multi-aggregate commit boundary.
//!
//! Operations that touch several aggregates stage each aggregate's new
//! events here and commit them with one [`EventStore::append_batch`] call.
//! Every staged stream carries the version it was loaded at, so a
//! concurrent writer on any of them turns the whole commit into a
//! `ConcurrencyConflict` and nothing is written. Dropping an uncommitted
//! unit of work discards it.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, StreamAppend, Version};
use uuid::Uuid;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

#[derive(Debug)]
struct StagedStream {
    aggregate_id: AggregateId,
    base_version: Version,
    envelopes: Vec<EventEnvelope>,
}

/// Events staged for one atomic commit.
#[derive(Debug)]
pub struct UnitOfWork {
    commit_id: Uuid,
    recorded_at: DateTime<Utc>,
    streams: Vec<StagedStream>,
}

impl UnitOfWork {
    pub fn new(recorded_at: DateTime<Utc>) -> Self {
        Self {
            commit_id: Uuid::new_v4(),
            recorded_at,
            streams: Vec::new(),
        }
    }

    pub fn commit_id(&self) -> Uuid {
        self.commit_id
    }

    pub fn is_empty(&self) -> bool {
        self.streams.iter().all(|s| s.envelopes.is_empty())
    }

    /// Number of events staged across all streams.
    pub fn event_count(&self) -> usize {
        self.streams.iter().map(|s| s.envelopes.len()).sum()
    }

    /// Events already staged for `aggregate_id`, oldest first.
    pub fn staged(&self, aggregate_id: AggregateId) -> &[EventEnvelope] {
        self.streams
            .iter()
            .find(|s| s.aggregate_id == aggregate_id)
            .map(|s| s.envelopes.as_slice())
            .unwrap_or(&[])
    }

    /// Stages `events` for `aggregate` and applies them to it.
    ///
    /// `aggregate` must be the state the events were decided against: loaded
    /// from the store, plus anything this unit already staged for the same
    /// stream (see `CommandHandler::load_in`).
    pub fn stage<A: Aggregate>(
        &mut self,
        aggregate: &mut A,
        aggregate_id: AggregateId,
        events: Vec<A::Event>,
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let index = match self
            .streams
            .iter()
            .position(|s| s.aggregate_id == aggregate_id)
        {
            Some(index) => index,
            None => {
                self.streams.push(StagedStream {
                    aggregate_id,
                    base_version: aggregate.version(),
                    envelopes: Vec::new(),
                });
                self.streams.len() - 1
            }
        };

        let stream = &mut self.streams[index];
        let staged_head = stream
            .envelopes
            .last()
            .map(|e| e.version)
            .unwrap_or(stream.base_version);
        if staged_head != aggregate.version() {
            return Err(DomainError::Infrastructure(format!(
                "{} {aggregate_id} staged at version {} but decided at {}",
                A::aggregate_type(),
                staged_head,
                aggregate.version()
            )));
        }

        let mut version = aggregate.version();
        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .commit_id(self.commit_id)
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .recorded_at(self.recorded_at)
                .payload(&event)?
                .build()?;
            stream.envelopes.push(envelope);
            aggregate.apply(event);
            aggregate.set_version(version);
        }

        Ok(())
    }

    /// Commits every staged stream atomically.
    pub async fn commit<S: EventStore + ?Sized>(self, store: &S) -> Result<Vec<Version>, DomainError> {
        let batch: Vec<StreamAppend> = self
            .streams
            .into_iter()
            .filter(|s| !s.envelopes.is_empty())
            .map(|s| {
                StreamAppend::new(
                    s.aggregate_id,
                    s.envelopes,
                    AppendOptions::expect_version(s.base_version),
                )
            })
            .collect();

        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let versions = store.append_batch(batch).await?;
        tracing::debug!(commit_id = %self.commit_id, streams = versions.len(), "unit of work committed");
        Ok(versions)
    }
}
