use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_catalog::RawMaterial;
use galley_core::{AggregateRoot, DomainError, DomainResult, MaterialId};
use galley_units::Unit;

use crate::ledger::MaterialLedger;

/// Derived stock position of one material. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub material_id: MaterialId,
    pub material_name: String,
    /// Purchase unit all quantities below are expressed in.
    pub unit: Unit,
    pub total_received: Decimal,
    pub total_increased: Decimal,
    pub total_reduced: Decimal,
    pub available_units_quantity: Decimal,
    pub min_stock_level: Decimal,
    pub max_stock_level: Decimal,
    pub is_low_stock: bool,
    pub unit_cost: Decimal,
    pub inventory_value: Decimal,
    pub entry_count: usize,
    pub movement_count: usize,
    pub ledger_version: u64,
    pub computed_at: DateTime<Utc>,
}

impl StockLevel {
    pub fn derive(
        material: &RawMaterial,
        ledger: &MaterialLedger,
        computed_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let available = ledger.available();
        let inventory_value = available
            .checked_mul(material.unit_cost)
            .ok_or_else(|| DomainError::validation("inventory value overflows"))?;
        Ok(Self {
            material_id: material.id,
            material_name: material.name.clone(),
            unit: ledger.unit().unwrap_or(material.unit),
            total_received: ledger.total_received(),
            total_increased: ledger.total_increased(),
            total_reduced: ledger.total_reduced(),
            available_units_quantity: available,
            min_stock_level: material.min_stock_level,
            max_stock_level: material.max_stock_level,
            is_low_stock: available <= material.min_stock_level,
            unit_cost: material.unit_cost,
            inventory_value,
            entry_count: ledger.entries().len(),
            movement_count: ledger.movements().len(),
            ledger_version: ledger.version(),
            computed_at,
        })
    }
}
