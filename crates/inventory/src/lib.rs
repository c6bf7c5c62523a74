//! Inventory domain: the per-material stock ledger and per-section holdings.
//!
//! Both are event-sourced aggregates. Balances are never stored; they are
//! folded from the append-only entry, movement and consumption events.

pub mod ledger;
pub mod level;
pub mod movement;
pub mod section;

pub use ledger::{
    LedgerCommand, LedgerEvent, MaterialLedger, RecordEntry, RecordMovement, StockEntry,
    StockMovement,
};
pub use level::StockLevel;
pub use movement::{MovementReference, MovementType};
pub use section::{
    AllocateStock, ConsumeStock, ConsumptionReason, ReleaseReservation, ReserveStock,
    SectionCommand, SectionConsumption, SectionEvent, SectionHolding, SectionStock,
    SetStockLevels,
};
