//! Disposable read models. Everything here can be rebuilt from the event store.

pub mod ttl_cache;

pub use ttl_cache::{FillTicket, TtlCache, DEFAULT_MAX_CAPACITY};
