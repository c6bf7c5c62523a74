//! Reorder suggestions derived from current stock levels.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_catalog::{MaterialCategory, RawMaterial};
use galley_core::{DomainError, DomainResult, MaterialId, SupplierId};
use galley_inventory::StockLevel;
use galley_units::Unit;

use crate::order::NewOrderLine;

/// Ordering is most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReorderUrgency {
    High,
    Medium,
    Low,
}

impl ReorderUrgency {
    /// HIGH when nothing is left, MEDIUM at or below half the minimum.
    pub fn classify(available: Decimal, min_stock_level: Decimal) -> Self {
        if available <= Decimal::ZERO {
            Self::High
        } else if available <= min_stock_level / Decimal::TWO {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for ReorderUrgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderSuggestion {
    pub material_id: MaterialId,
    pub material_name: String,
    pub category: MaterialCategory,
    pub unit: Unit,
    pub available: Decimal,
    pub min_stock_level: Decimal,
    pub max_stock_level: Decimal,
    /// Quantity that tops the material up to its maximum level.
    pub suggested_quantity: Decimal,
    pub urgency: ReorderUrgency,
    pub unit_cost: Decimal,
    pub estimated_cost: Decimal,
    pub preferred_supplier: Option<SupplierId>,
}

/// Suggest reorders for every active material at or below its minimum level.
pub fn reorder_suggestions<'a, I>(stock: I) -> DomainResult<Vec<ReorderSuggestion>>
where
    I: IntoIterator<Item = (&'a RawMaterial, &'a StockLevel)>,
{
    let mut suggestions: Vec<ReorderSuggestion> = stock
        .into_iter()
        .filter(|(material, level)| {
            material.active && level.available_units_quantity <= material.min_stock_level
        })
        .map(|(material, level)| {
            let available = level.available_units_quantity;
            let suggested_quantity = (material.max_stock_level - available).max(Decimal::ZERO);
            let estimated_cost = suggested_quantity
                .checked_mul(material.unit_cost)
                .ok_or_else(|| DomainError::validation("reorder cost overflows"))?;
            Ok(ReorderSuggestion {
                material_id: material.id,
                material_name: material.name.clone(),
                category: material.category,
                unit: material.unit,
                available,
                min_stock_level: material.min_stock_level,
                max_stock_level: material.max_stock_level,
                suggested_quantity,
                urgency: ReorderUrgency::classify(available, material.min_stock_level),
                unit_cost: material.unit_cost,
                estimated_cost,
                preferred_supplier: material.preferred_supplier,
            })
        })
        .collect::<DomainResult<_>>()?;

    suggestions.sort_by(|a, b| {
        a.urgency
            .cmp(&b.urgency)
            .then_with(|| a.material_name.cmp(&b.material_name))
    });
    Ok(suggestions)
}

/// Group suggestions into draft order lines per preferred supplier.
///
/// Suggestions without a preferred supplier are keyed under `None`; zero
/// quantities are skipped.
pub fn draft_order_lines(
    suggestions: &[ReorderSuggestion],
) -> BTreeMap<Option<SupplierId>, Vec<NewOrderLine>> {
    let mut grouped: BTreeMap<Option<SupplierId>, Vec<NewOrderLine>> = BTreeMap::new();
    for s in suggestions.iter().filter(|s| s.suggested_quantity > Decimal::ZERO) {
        grouped
            .entry(s.preferred_supplier)
            .or_default()
            .push(NewOrderLine {
                material_id: s.material_id,
                quantity: s.suggested_quantity,
                unit_cost: s.unit_cost,
            });
    }
    grouped
}
