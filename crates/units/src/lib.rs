//! Measurement units and the conversions between them.
//!
//! Everything here is pure: no IO, no clocks. Quantities are `Decimal` and are
//! never rounded except by the display helpers in [`format`].

pub mod convert;
pub mod cost;
pub mod format;
pub mod unit;

pub use convert::{available_units, compatible, convert, PackInfo};
pub use cost::effective_unit_cost;
pub use format::{format_money, format_quantity, format_unit_cost, round_for_display, round_money};
pub use unit::{Unit, UnitCategory};
