//! Event primitives shared by every event-sourced aggregate.
//!
//! Domain crates implement [`Event`] for their event enums; infrastructure wraps
//! committed events in an [`EventEnvelope`] carrying stream metadata.

pub mod envelope;
pub mod event;

pub use envelope::{EnvelopeDecodeError, EventEnvelope};
pub use event::Event;
