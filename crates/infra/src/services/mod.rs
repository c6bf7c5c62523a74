//! Application services: each operation loads the streams it touches, decides
//! against them and commits through one unit of work.

use std::sync::Arc;

use galley_catalog::Catalog;
use galley_core::MaterialId;
use galley_inventory::StockLevel;

use crate::error::ServiceError;
use crate::read_model::TtlCache;

pub mod budget_tracker;
pub mod purchase_orders;
pub mod recipe_costing;
pub mod section_inventory;
pub mod stock_ledger;

pub use budget_tracker::BudgetTracker;
pub use purchase_orders::{NewPurchaseOrder, PurchaseOrderWorkflow};
pub use recipe_costing::RecipeCosting;
pub use section_inventory::{RecordConsumption, SectionInventoryManager};
pub use stock_ledger::StockLedger;

pub type SharedCatalog = Arc<dyn Catalog>;

/// Stock levels shared by every service that writes to a ledger.
pub type StockLevelCache = Arc<TtlCache<MaterialId, StockLevel>>;

pub(crate) fn named(catalog: &dyn Catalog) -> impl Fn(ServiceError) -> ServiceError + '_ {
    move |err| err.with_material_names(|id| catalog.material(id).map(|m| m.name))
}
