//! Loading aggregates and running single-stream commands.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, EventStore, Version};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::unit_of_work::UnitOfWork;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

/// Rebuilds aggregates of type `A` from the store and persists their events.
pub struct CommandHandler<S, A> {
    store: S,
    _phantom: PhantomData<fn() -> A>,
}

impl<S: Clone, A> Clone for CommandHandler<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
    DomainError: From<A::Error>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate; a stream with no events yields the default state.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;
        let mut aggregate = A::default();
        fold_into(&mut aggregate, &events)?;
        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it has no events.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.exists().then_some(aggregate))
    }

    /// Loads an aggregate as `uow` would see it: stored events followed by
    /// whatever `uow` has already staged for the same stream.
    pub async fn load_in(
        &self,
        uow: &UnitOfWork,
        aggregate_id: AggregateId,
    ) -> Result<A, DomainError> {
        let mut aggregate = self.load(aggregate_id).await?;
        fold_into(&mut aggregate, uow.staged(aggregate_id))?;
        Ok(aggregate)
    }

    /// Runs `command_fn` against the current state and commits the events it
    /// returns with an expected-version guard.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        at: DateTime<Utc>,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            let new_version = aggregate.version();
            return Ok(CommandResult {
                aggregate,
                events,
                new_version,
            });
        }

        let mut uow = UnitOfWork::new(at);
        uow.stage(&mut aggregate, aggregate_id, events.clone())?;
        uow.commit(&self.store).await?;

        let new_version = aggregate.version();
        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }
}

fn fold_into<A: Aggregate>(aggregate: &mut A, events: &[EventEnvelope]) -> Result<(), DomainError> {
    for envelope in events {
        let event: A::Event = envelope.decode()?;
        aggregate.apply(event);
        aggregate.set_version(envelope.version);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DomainEvent;
    use event_store::InMemoryEventStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum NoteEvent {
        Written { id: AggregateId, text: String },
        Edited { text: String },
    }

    impl DomainEvent for NoteEvent {
        fn event_type(&self) -> &'static str {
            match self {
                NoteEvent::Written { .. } => "NoteWritten",
                NoteEvent::Edited { .. } => "NoteEdited",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Note {
        id: Option<AggregateId>,
        text: String,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    enum NoteError {
        #[error("note text cannot be empty")]
        Empty,
    }

    impl From<NoteError> for DomainError {
        fn from(e: NoteError) -> Self {
            DomainError::Validation {
                field: "text",
                message: e.to_string(),
            }
        }
    }

    impl Aggregate for Note {
        type Event = NoteEvent;
        type Error = NoteError;

        fn aggregate_type() -> &'static str {
            "Note"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                NoteEvent::Written { id, text } => {
                    self.id = Some(id);
                    self.text = text;
                }
                NoteEvent::Edited { text } => self.text = text,
            }
        }
    }

    fn write(id: AggregateId, text: &str) -> Result<Vec<NoteEvent>, NoteError> {
        if text.is_empty() {
            return Err(NoteError::Empty);
        }
        Ok(vec![NoteEvent::Written {
            id,
            text: text.to_string(),
        }])
    }

    #[tokio::test]
    async fn execute_creates_then_updates() {
        let handler: CommandHandler<_, Note> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        let created = handler
            .execute(id, Utc::now(), |_| write(id, "hello"))
            .await
            .unwrap();
        assert_eq!(created.new_version, Version::first());

        let edited = handler
            .execute(id, Utc::now(), |_| {
                Ok(vec![NoteEvent::Edited {
                    text: "bye".to_string(),
                }])
            })
            .await
            .unwrap();
        assert_eq!(edited.new_version, Version::new(2));
        assert_eq!(edited.aggregate.text, "bye");

        let loaded = handler.load(id).await.unwrap();
        assert_eq!(loaded.text, "bye");
        assert_eq!(loaded.version, Version::new(2));
    }

    #[tokio::test]
    async fn rejected_command_persists_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Note> = CommandHandler::new(store.clone());
        let id = AggregateId::new();

        let result = handler.execute(id, Utc::now(), |_| write(id, "")).await;

        assert!(matches!(result, Err(DomainError::Validation { .. })));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn load_existing_distinguishes_missing_streams() {
        let handler: CommandHandler<_, Note> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();
        assert!(handler.load_existing(id).await.unwrap().is_none());

        handler
            .execute(id, Utc::now(), |_| write(id, "x"))
            .await
            .unwrap();
        assert!(handler.load_existing(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn load_in_sees_staged_events() {
        let handler: CommandHandler<_, Note> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        let mut uow = UnitOfWork::new(Utc::now());
        let mut note = handler.load_in(&uow, id).await.unwrap();
        uow.stage(&mut note, id, write(id, "draft").unwrap()).unwrap();

        let seen = handler.load_in(&uow, id).await.unwrap();
        assert_eq!(seen.text, "draft");
        assert_eq!(seen.version, Version::first());
        assert!(handler.load_existing(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_command_returns_without_persisting() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Note> = CommandHandler::new(store.clone());

        let result = handler
            .execute(AggregateId::new(), Utc::now(), |_| Ok(vec![]))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.event_count().await, 0);
    }
}
