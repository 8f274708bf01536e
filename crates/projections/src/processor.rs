//! Feeds stored events to registered projections.

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Catches projections up with the event log.
///
/// Catch-up runs are serialized, so the sweeper and request handlers may
/// both call [`run_catch_up`](Self::run_catch_up) without an event being
/// folded twice. Skipping is decided per stream from each projection's
/// checkpoint, never from an event's offset in the log: a commit that
/// lands behind events already seen is still folded.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    catch_up: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams the whole log and shows each projection the events newer
    /// than its checkpoint. Returns how many events were folded.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _guard = self.catch_up.lock().await;
        let mut stream = self.store.stream_all_events().await?;
        let mut seen: u64 = 0;
        let mut folded: u64 = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            seen += 1;

            for projection in &self.projections {
                if deliver(projection.as_ref(), &event).await? {
                    folded += 1;
                }
            }
        }

        if folded > 0 {
            metrics::counter!("projections_events_processed").increment(folded);
            tracing::debug!(log_length = seen, folded, "projections caught up");
        }
        Ok(folded)
    }

    /// Resets every projection and replays the log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        {
            let _guard = self.catch_up.lock().await;
            for projection in &self.projections {
                projection.reset().await?;
            }
        }
        let folded = self.run_catch_up().await?;
        tracing::info!(projections = self.projections.len(), folded, "projections rebuilt");
        Ok(folded)
    }
}

async fn deliver(projection: &dyn Projection, event: &EventEnvelope) -> Result<bool> {
    if event.aggregate_type != projection.source() {
        return Ok(false);
    }
    let applied = projection.last_applied(event.aggregate_id).await;
    if applied.is_some_and(|v| v >= event.version) {
        return Ok(false);
    }
    projection.apply(event).await?;
    projection.mark_applied(event).await;
    Ok(true)
}
