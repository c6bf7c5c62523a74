//! Append-only event store boundary.
//!
//! Streams hold one aggregate each. Appends can span several streams and are
//! atomic across them, which is what lets a section allocation debit the
//! central ledger and credit the section in one step.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
