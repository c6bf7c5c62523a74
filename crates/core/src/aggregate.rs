//! Aggregate traits for event-sourced domain models.

use crate::error::{DomainError, DomainResult};
use crate::id::AggregateId;

/// Aggregate root marker + minimal interface.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Number of events applied to this instance (the stream revision).
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the stream to be at an exact version (`0` = stream must not exist yet).
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Aggregate execution semantics (pure, deterministic).
///
/// - **Decision logic**: `handle(&self, cmd)` returns events.
/// - **State mutation**: `apply(&mut self, event)` evolves state.
///
/// Aggregates must not perform IO. Rejections are returned from `handle` and
/// never leave partial state behind, because nothing is applied until the
/// decided events are committed.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Evolve in-memory state from a single event (+1 version per event).
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events to emit given the current state and a command.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

/// An aggregate that lives in exactly one event stream.
pub trait EventSourced: Aggregate {
    /// Stream type tag stored next to every event (e.g. `"purchasing.order"`).
    const AGGREGATE_TYPE: &'static str;

    /// Fresh instance for a stream with no history.
    fn empty(stream_id: AggregateId) -> Self;

    /// Rebuild an instance by folding events in order.
    fn rehydrate<'a>(
        stream_id: AggregateId,
        events: impl IntoIterator<Item = &'a Self::Event>,
    ) -> Self
    where
        Self: Sized,
        Self::Event: 'a,
    {
        let mut aggregate = Self::empty(stream_id);
        for event in events {
            aggregate.apply(event);
        }
        aggregate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Counter {
        id: AggregateId,
        total: i64,
        version: u64,
    }

    impl AggregateRoot for Counter {
        type Id = AggregateId;

        fn id(&self) -> &Self::Id {
            &self.id
        }

        fn version(&self) -> u64 {
            self.version
        }
    }

    impl Aggregate for Counter {
        type Command = i64;
        type Event = i64;
        type Error = DomainError;

        fn apply(&mut self, event: &i64) {
            self.total += event;
            self.version += 1;
        }

        fn handle(&self, command: &i64) -> Result<Vec<i64>, DomainError> {
            if self.total + command < 0 {
                return Err(DomainError::validation("counter would go negative"));
            }
            Ok(vec![*command])
        }
    }

    impl EventSourced for Counter {
        const AGGREGATE_TYPE: &'static str = "test.counter";

        fn empty(stream_id: AggregateId) -> Self {
            Self {
                id: stream_id,
                total: 0,
                version: 0,
            }
        }
    }

    #[test]
    fn expected_version_checks() {
        assert!(ExpectedVersion::Any.matches(7));
        assert!(ExpectedVersion::Exact(3).matches(3));
        assert!(ExpectedVersion::Exact(0).check(1).is_err());
    }

    #[test]
    fn rehydrate_folds_events_in_order() {
        let id = AggregateId::new();
        let counter = Counter::rehydrate(id, &[5, -2, 4]);
        assert_eq!(counter.total, 7);
        assert_eq!(counter.version(), 3);
        assert_eq!(counter.id(), &id);
    }

    #[test]
    fn handle_does_not_mutate() {
        let counter = Counter::rehydrate(AggregateId::new(), &[1]);
        assert!(counter.handle(&-2).is_err());
        assert_eq!(counter.handle(&3).unwrap(), vec![3]);
        assert_eq!(counter.total, 1);
    }
}
