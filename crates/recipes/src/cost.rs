use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_catalog::{Catalog, Recipe};
use galley_core::{DomainError, DomainResult, GuardReason, Guarded, MaterialId, RecipeId};
use galley_units::Unit;

use crate::breakdown::percentage_breakdown;

/// Cost contribution of one ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdownLine {
    pub material_id: MaterialId,
    pub material_name: String,
    /// Quantity as written in the recipe.
    pub quantity: Decimal,
    pub unit: Unit,
    /// Quantity converted to the material's storage unit.
    pub cost_quantity: Decimal,
    /// Storage unit the cost is computed in.
    pub cost_unit: Unit,
    /// Effective cost of one `cost_unit`.
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub percentage_of_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeCost {
    pub recipe_id: RecipeId,
    pub recipe_name: String,
    pub serving_size: Decimal,
    pub total_cost: Decimal,
    pub cost_per_serving: Decimal,
    pub breakdown: Vec<CostBreakdownLine>,
    /// Guarded defaults used while costing; empty when the figures are exact.
    pub approximations: Vec<GuardReason>,
}

impl RecipeCost {
    pub fn is_approximate(&self) -> bool {
        !self.approximations.is_empty()
    }
}

/// Roll up the cost of a recipe from current catalog prices.
///
/// Fails if an ingredient references an unknown material or a unit that cannot
/// be converted to the material's storage unit. Incomplete pack data and a
/// non-positive serving size do not fail; they mark the result approximate.
pub fn calculate_cost<C: Catalog + ?Sized>(recipe: &Recipe, catalog: &C) -> DomainResult<RecipeCost> {
    let mut approximations = Vec::new();
    let mut note = |reason: Option<GuardReason>| {
        if let Some(reason) = reason {
            if !approximations.contains(&reason) {
                approximations.push(reason);
            }
        }
    };

    let mut lines = Vec::with_capacity(recipe.ingredients.len());
    for ingredient in &recipe.ingredients {
        let material = catalog.require_material(ingredient.material_id)?;
        let cost_quantity = material.to_storage_units(ingredient.quantity, ingredient.unit)?;
        let unit_cost = material.effective_unit_cost();
        note(unit_cost.reason());
        let unit_cost = unit_cost.into_value();
        let total_cost = cost_quantity.checked_mul(unit_cost).ok_or_else(|| {
            DomainError::validation(format!("cost of {} overflows", material.name))
        })?;

        lines.push(CostBreakdownLine {
            material_id: material.id,
            material_name: material.name.clone(),
            quantity: ingredient.quantity,
            unit: ingredient.unit,
            cost_quantity,
            cost_unit: material.storage_unit(),
            unit_cost,
            total_cost,
            percentage_of_total: Decimal::ZERO,
        });
    }

    let total_cost: Decimal = lines.iter().map(|l| l.total_cost).sum();
    let costs: Vec<Decimal> = lines.iter().map(|l| l.total_cost).collect();
    for (line, pct) in lines.iter_mut().zip(percentage_breakdown(&costs)) {
        line.percentage_of_total = pct;
    }

    let per_serving = cost_per_serving(total_cost, recipe.serving_size);
    note(per_serving.reason());

    tracing::debug!(
        recipe_id = %recipe.id,
        total_cost = %total_cost,
        approximate = !approximations.is_empty(),
        "recipe costed"
    );

    Ok(RecipeCost {
        recipe_id: recipe.id,
        recipe_name: recipe.name.clone(),
        serving_size: recipe.serving_size,
        total_cost,
        cost_per_serving: per_serving.into_value(),
        breakdown: lines,
        approximations,
    })
}

fn cost_per_serving(total_cost: Decimal, serving_size: Decimal) -> Guarded<Decimal> {
    if serving_size > Decimal::ZERO {
        if let Some(per) = total_cost.checked_div(serving_size) {
            return Guarded::exact(per);
        }
    }
    Guarded::approximate(total_cost, GuardReason::NonPositiveServingSize)
}

/// Recipe with ingredient quantities scaled to `servings`.
pub fn scale_recipe(recipe: &Recipe, servings: Decimal) -> DomainResult<Recipe> {
    recipe.scaled(servings)
}
