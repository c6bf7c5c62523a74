use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use galley_core::AggregateId;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend};

/// In-memory append-only event store.
///
/// Intended for tests/dev and embedding. A single write lock makes every
/// multi-stream append atomic.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<AggregateId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append_streams(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batch: Vec<StreamAppend> = batch.into_iter().filter(|a| !a.events.is_empty()).collect();
        if batch.is_empty() {
            return Ok(vec![]);
        }

        let mut seen = HashSet::new();
        for append in &batch {
            append.validate()?;
            if !seen.insert(append.aggregate_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} appears twice in one batch",
                    append.aggregate_id
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        // Check every stream before touching any of them.
        for append in &batch {
            let stream = streams.get(&append.aggregate_id).map(Vec::as_slice).unwrap_or(&[]);
            let current = Self::current_version(stream);
            if !append.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    append.aggregate_id, append.expected_version
                )));
            }
            if let Some(existing) = stream.first() {
                if existing.aggregate_type != append.aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{}', attempted append with '{}'",
                        existing.aggregate_type, append.aggregate_type
                    )));
                }
            }
        }

        let mut committed = Vec::new();
        for append in batch {
            let stream = streams.entry(append.aggregate_id).or_default();
            let mut next = Self::current_version(stream) + 1;
            for e in append.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                committed.push(stored);
            }
        }

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        let mut matching: Vec<StoredEvent> = streams
            .values()
            .filter(|s| s.first().is_some_and(|e| e.aggregate_type == aggregate_type))
            .flatten()
            .cloned()
            .collect();
        matching.sort_by_key(|e| (e.aggregate_id, e.sequence_number));
        Ok(matching)
    }
}
