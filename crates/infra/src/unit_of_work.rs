//! Unit of work over event-sourced aggregates.
//!
//! ```text
//! load streams (cached per unit of work)
//!   ↓
//! decide against current + staged state (pure `handle`)
//!   ↓
//! stage events, apply them to the cached aggregate
//!   ↓
//! commit: one atomic multi-stream append, each stream at its loaded version
//! ```
//!
//! A rejected command stages nothing. Dropping a unit of work without
//! committing discards everything it staged.

use std::any::Any;
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use galley_core::{AggregateId, DomainError, EventSourced, ExpectedVersion};
use galley_events::Event;

use crate::error::{ServiceError, ServiceResult};
use crate::event_store::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};

/// Rebuild an aggregate from its stored history.
pub fn rehydrate<A>(stream_id: AggregateId, history: &[StoredEvent]) -> ServiceResult<A>
where
    A: EventSourced,
    A::Event: DeserializeOwned,
{
    let mut aggregate = A::empty(stream_id);
    for (idx, stored) in history.iter().enumerate() {
        if stored.aggregate_id != stream_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {stream_id} returned an event of {}",
                stored.aggregate_id
            ))
            .into());
        }
        if stored.aggregate_type != A::AGGREGATE_TYPE {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "stream {stream_id} is '{}', expected '{}'",
                stored.aggregate_type,
                A::AGGREGATE_TYPE
            ))
            .into());
        }
        if stored.sequence_number != idx as u64 + 1 {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream {stream_id} has a gap at sequence {}",
                stored.sequence_number
            ))
            .into());
        }
        let event: A::Event = stored.decode()?;
        aggregate.apply(&event);
    }
    Ok(aggregate)
}

/// Load one aggregate outside of any unit of work.
pub fn load_aggregate<A, S>(store: &S, stream_id: AggregateId) -> ServiceResult<A>
where
    A: EventSourced,
    A::Event: DeserializeOwned,
    S: EventStore + ?Sized,
{
    let history = store.load_stream(stream_id)?;
    rehydrate(stream_id, &history)
}

/// Load every stream of an aggregate type.
pub fn load_all<A, S>(store: &S) -> ServiceResult<Vec<A>>
where
    A: EventSourced,
    A::Event: DeserializeOwned,
    S: EventStore + ?Sized,
{
    let events = store.load_by_type(A::AGGREGATE_TYPE)?;
    let mut aggregates = Vec::new();
    let mut start = 0;
    while start < events.len() {
        let stream_id = events[start].aggregate_id;
        let end = events[start..]
            .iter()
            .position(|e| e.aggregate_id != stream_id)
            .map_or(events.len(), |offset| start + offset);
        aggregates.push(rehydrate::<A>(stream_id, &events[start..end])?);
        start = end;
    }
    Ok(aggregates)
}

struct Staged {
    aggregate_type: &'static str,
    loaded_version: u64,
    state: Box<dyn Any + Send>,
    pending: Vec<UncommittedEvent>,
}

pub struct UnitOfWork<'s, S: ?Sized> {
    store: &'s S,
    streams: HashMap<AggregateId, Staged>,
    order: Vec<AggregateId>,
}

impl<'s, S> UnitOfWork<'s, S>
where
    S: EventStore + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            streams: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Current state of a stream, including anything staged in this unit of work.
    pub fn load<A>(&mut self, stream_id: AggregateId) -> ServiceResult<&A>
    where
        A: EventSourced + Send + 'static,
        A::Event: DeserializeOwned,
    {
        let staged = self.staged::<A>(stream_id)?;
        staged
            .state
            .downcast_ref::<A>()
            .ok_or_else(|| type_confusion::<A>(stream_id))
    }

    /// Decide `command` against the stream and stage the resulting events.
    pub fn handle<A>(&mut self, stream_id: AggregateId, command: &A::Command) -> ServiceResult<Vec<A::Event>>
    where
        A: EventSourced<Error = DomainError> + Send + 'static,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let staged = self.staged::<A>(stream_id)?;
        let aggregate = staged
            .state
            .downcast_mut::<A>()
            .ok_or_else(|| type_confusion::<A>(stream_id))?;

        let events = aggregate.handle(command)?;

        let mut uncommitted = Vec::with_capacity(events.len());
        for event in &events {
            uncommitted.push(UncommittedEvent::from_typed(
                stream_id,
                A::AGGREGATE_TYPE,
                Uuid::now_v7(),
                event,
            )?);
        }
        for event in &events {
            aggregate.apply(event);
        }
        staged.pending.extend(uncommitted);
        Ok(events)
    }

    pub fn has_changes(&self) -> bool {
        self.streams.values().any(|s| !s.pending.is_empty())
    }

    /// Append every staged event in one atomic multi-stream append.
    pub fn commit(mut self) -> ServiceResult<Vec<StoredEvent>> {
        let batch: Vec<StreamAppend> = self
            .order
            .iter()
            .filter_map(|id| self.streams.remove(id).map(|s| (*id, s)))
            .filter(|(_, s)| !s.pending.is_empty())
            .map(|(id, s)| StreamAppend {
                aggregate_id: id,
                aggregate_type: s.aggregate_type.to_string(),
                expected_version: ExpectedVersion::Exact(s.loaded_version),
                events: s.pending,
            })
            .collect();

        if batch.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.store.append_streams(batch)?)
    }

    fn staged<A>(&mut self, stream_id: AggregateId) -> ServiceResult<&mut Staged>
    where
        A: EventSourced + Send + 'static,
        A::Event: DeserializeOwned,
    {
        if !self.streams.contains_key(&stream_id) {
            let history = self.store.load_stream(stream_id)?;
            let aggregate: A = rehydrate(stream_id, &history)?;
            self.streams.insert(
                stream_id,
                Staged {
                    aggregate_type: A::AGGREGATE_TYPE,
                    loaded_version: history.last().map_or(0, |e| e.sequence_number),
                    state: Box::new(aggregate),
                    pending: Vec::new(),
                },
            );
            self.order.push(stream_id);
        }

        let staged = self
            .streams
            .get_mut(&stream_id)
            .ok_or_else(|| type_confusion::<A>(stream_id))?;
        if staged.aggregate_type != A::AGGREGATE_TYPE {
            return Err(type_confusion::<A>(stream_id));
        }
        Ok(staged)
    }
}

fn type_confusion<A: EventSourced>(stream_id: AggregateId) -> ServiceError {
    EventStoreError::AggregateTypeMismatch(format!(
        "stream {stream_id} is not a '{}' stream",
        A::AGGREGATE_TYPE
    ))
    .into()
}

/// Runs units of work, retrying on optimistic concurrency conflicts.
#[derive(Debug, Clone)]
pub struct Transactor<S> {
    store: S,
    max_conflict_retries: u32,
}

impl<S> Transactor<S>
where
    S: EventStore,
{
    pub fn new(store: S, max_conflict_retries: u32) -> Self {
        Self {
            store,
            max_conflict_retries,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run `work` in a fresh unit of work and commit it.
    ///
    /// On a version conflict the whole closure runs again against reloaded
    /// state. Domain rejections are returned immediately and nothing is
    /// committed.
    pub fn run<T>(
        &self,
        operation: &str,
        mut work: impl FnMut(&mut UnitOfWork<'_, S>) -> ServiceResult<T>,
    ) -> ServiceResult<(T, Vec<StoredEvent>)> {
        let mut attempt = 0;
        loop {
            let mut uow = UnitOfWork::new(&self.store);
            let value = work(&mut uow)?;
            match uow.commit() {
                Ok(committed) => return Ok((value, committed)),
                Err(err) if err.is_retryable() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::debug!(operation, attempt, error = %err, "retrying after version conflict");
                }
                Err(err) => return Err(err),
            }
        }
    }
}
