//! Persistence and application services for the inventory engine.
//!
//! - `event_store`: append-only streams, in memory or in Postgres
//! - `unit_of_work`: load, decide, commit atomically across streams, retry on conflict
//! - `services`: the operations callers use, one facade per component
//! - `app`: wires everything over one store and one catalog

pub mod app;
pub mod config;
pub mod error;
pub mod event_store;
pub mod read_model;
pub mod services;
pub mod unit_of_work;

pub use app::{InventoryEngine, SharedStore};
pub use config::GalleyConfig;
pub use error::{ServiceError, ServiceResult};
