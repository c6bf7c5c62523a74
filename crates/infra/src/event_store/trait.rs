use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use galley_core::{AggregateId, ExpectedVersion};
use galley_events::{Event, EventEnvelope};
use std::sync::Arc;

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Built from a typed domain event with [`UncommittedEvent::from_typed`], which
/// serializes the payload and captures the metadata needed to decode it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream (assigned a sequence number).
///
/// Sequence numbers are per stream, start at 1 and never have gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    pub fn to_envelope(&self) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.event_type.clone(),
            self.payload.clone(),
        )
    }

    /// Decode the payload into the aggregate's event type.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, EventStoreError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            EventStoreError::Decode(format!(
                "{} #{} of {}: {e}",
                self.event_type, self.sequence_number, self.aggregate_id
            ))
        })
    }
}

/// Events for one stream inside a multi-stream append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAppend {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub expected_version: ExpectedVersion,
    pub events: Vec<UncommittedEvent>,
}

impl StreamAppend {
    /// Check that every event targets this stream.
    pub fn validate(&self) -> Result<(), EventStoreError> {
        for (idx, e) in self.events.iter().enumerate() {
            if e.aggregate_id != self.aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} batch contains a foreign aggregate_id (index {idx})",
                    self.aggregate_id
                )));
            }
            if e.aggregate_type != self.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream {} batch mixes '{}' and '{}' (index {idx})",
                    self.aggregate_id, self.aggregate_type, e.aggregate_type
                )));
            }
        }
        Ok(())
    }
}

/// Event store operation error.
///
/// These are infrastructure errors, as opposed to domain rejections.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("failed to decode event payload: {0}")]
    Decode(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Append-only event store.
///
/// Streams are keyed by aggregate id. An append may span several streams; it
/// either commits every stream's events or none of them, and each stream is
/// guarded by its own `ExpectedVersion`.
pub trait EventStore: Send + Sync {
    /// Atomically append to one or more streams.
    ///
    /// Implementations must:
    /// - reject a batch that names the same stream twice
    /// - check every stream's expected version before writing anything
    /// - assign sequence numbers starting at `current_version + 1` per stream
    fn append_streams(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for an aggregate, in sequence order.
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load every event of every stream of `aggregate_type`, ordered by stream
    /// then sequence.
    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Append to a single stream.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };
        let append = StreamAppend {
            aggregate_id: first.aggregate_id,
            aggregate_type: first.aggregate_type.clone(),
            expected_version,
            events,
        };
        self.append_streams(vec![append])
    }
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append_streams(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append_streams(batch)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(aggregate_id)
    }

    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_by_type(aggregate_type)
    }
}

impl UncommittedEvent {
    /// Wrap a typed domain event for appending.
    pub fn from_typed<E>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
