//! Tracing and logging setup shared by every binary embedding the engine.

pub mod tracing;

pub use self::tracing::{init, init_with, LogFormat, LoggingConfig};
