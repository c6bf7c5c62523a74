//! `galley-core`: shared kernel for the inventory ledger and cost engine.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error taxonomy, the guarded-default value and the aggregate
//! execution traits every stateful component is built on.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod guarded;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, EventSourced, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, StockShortfall};
pub use guarded::{GuardReason, Guarded};
pub use id::{
    AggregateId, BudgetId, ConsumptionId, EntryId, MaterialId, MovementId, PurchaseOrderId,
    RecipeId, SectionId, SupplierId, UserId,
};
