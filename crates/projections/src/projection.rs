//! Projection trait and per-stream checkpoints.

use std::collections::HashMap;

use async_trait::async_trait;
use common::AggregateId;
use event_store::{EventEnvelope, Version};

use crate::Result;

/// Highest version a projection has folded, per aggregate stream.
///
/// A stream's events always commit in version order, even when commits of
/// different streams interleave out of log order. Checkpointing each stream
/// is therefore enough to skip events already folded and to pick up late
/// commits, wherever they land in the global log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    streams: HashMap<AggregateId, Version>,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn last_applied(&self, aggregate_id: AggregateId) -> Option<Version> {
        self.streams.get(&aggregate_id).copied()
    }

    pub fn has_applied(&self, event: &EventEnvelope) -> bool {
        self.last_applied(event.aggregate_id)
            .is_some_and(|v| v >= event.version)
    }

    pub fn record(&mut self, event: &EventEnvelope) {
        let version = self.streams.entry(event.aggregate_id).or_default();
        if event.version > *version {
            *version = event.version;
        }
    }

    /// Number of streams with at least one folded event.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({} streams)", self.streams.len())
    }
}

/// Folds one aggregate type's events into a read model.
///
/// The processor offers a projection every event of its
/// [`source`](Projection::source) type that is newer than the stream's
/// checkpoint. Each folded event is then recorded with
/// [`mark_applied`](Projection::mark_applied).
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Aggregate type this projection reads, e.g. `"Need"`.
    fn source(&self) -> &'static str;

    async fn apply(&self, event: &EventEnvelope) -> Result<()>;

    async fn last_applied(&self, aggregate_id: AggregateId) -> Option<Version>;

    async fn mark_applied(&self, event: &EventEnvelope);

    /// Drops all state and checkpoints.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Need")
            .event_type("Tested")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn checkpoints_are_kept_per_stream() {
        let a = AggregateId::new();
        let b = AggregateId::new();
        let mut pos = ProjectionPosition::zero();

        pos.record(&event(a, 1));
        pos.record(&event(a, 2));

        assert!(pos.has_applied(&event(a, 2)));
        assert!(!pos.has_applied(&event(a, 3)));
        assert!(!pos.has_applied(&event(b, 1)));
        assert_eq!(pos.last_applied(a), Some(Version::new(2)));
        assert_eq!(pos.stream_count(), 1);
    }

    #[test]
    fn recording_an_older_version_keeps_the_high_water_mark() {
        let a = AggregateId::new();
        let mut pos = ProjectionPosition::zero();
        pos.record(&event(a, 3));
        pos.record(&event(a, 1));
        assert_eq!(pos.last_applied(a), Some(Version::new(3)));
    }

    #[test]
    fn position_display() {
        let mut pos = ProjectionPosition::zero();
        pos.record(&event(AggregateId::new(), 1));
        assert_eq!(pos.to_string(), "position(1 streams)");
    }
}
