//! Recipe cost roll-up.
//!
//! Costs are derived on demand from the catalog; nothing here is stored.

pub mod breakdown;
pub mod cost;

pub use breakdown::percentage_breakdown;
pub use cost::{calculate_cost, scale_recipe, CostBreakdownLine, RecipeCost};
