use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use galley_catalog::{Catalog, RawMaterial, Recipe};
use galley_core::RecipeId;
use galley_recipes::{calculate_cost, scale_recipe, RecipeCost};

use crate::error::ServiceResult;
use crate::read_model::{TtlCache, DEFAULT_MAX_CAPACITY};
use crate::services::SharedCatalog;

/// Catalog state a recipe's cost is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CostInputs {
    recipe: Recipe,
    materials: Vec<Option<RawMaterial>>,
}

impl CostInputs {
    fn read(catalog: &dyn Catalog, recipe_id: RecipeId) -> ServiceResult<Self> {
        let recipe = catalog.require_recipe(recipe_id)?;
        let materials = recipe
            .ingredients
            .iter()
            .map(|i| catalog.material(i.material_id))
            .collect();
        Ok(Self { recipe, materials })
    }
}

/// Recipe cost roll-up over the catalog, with a short-lived result cache.
///
/// A cached cost is served only while the recipe and every material it
/// references are unchanged in the catalog.
#[derive(Clone)]
pub struct RecipeCosting {
    catalog: SharedCatalog,
    costs: Arc<TtlCache<RecipeId, (CostInputs, RecipeCost)>>,
}

impl RecipeCosting {
    pub fn new(catalog: SharedCatalog, ttl: Duration) -> Self {
        Self::with_capacity(catalog, ttl, DEFAULT_MAX_CAPACITY)
    }

    pub fn with_capacity(catalog: SharedCatalog, ttl: Duration, max_entries: u64) -> Self {
        Self {
            catalog,
            costs: Arc::new(TtlCache::with_capacity(ttl, max_entries)),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn calculate_cost(&self, recipe_id: RecipeId) -> ServiceResult<RecipeCost> {
        let inputs = CostInputs::read(&*self.catalog, recipe_id)?;
        if let Some((cached_inputs, cost)) = self.costs.get(&recipe_id) {
            if cached_inputs == inputs {
                return Ok(cost);
            }
            tracing::debug!("recipe or material prices changed, recosting");
        }
        let cost = calculate_cost(&inputs.recipe, &*self.catalog)?;
        if cost.is_approximate() {
            tracing::warn!(
                recipe = %inputs.recipe.name,
                approximations = ?cost.approximations,
                "recipe cost uses substituted values"
            );
        }
        self.costs.insert(recipe_id, (inputs, cost.clone()));
        Ok(cost)
    }

    /// Cost an ad-hoc recipe that need not be in the catalog. Never cached.
    pub fn cost_of(&self, recipe: &Recipe) -> ServiceResult<RecipeCost> {
        Ok(calculate_cost(recipe, &*self.catalog)?)
    }

    /// Recipe scaled to `servings`, with its cost.
    pub fn scale(&self, recipe_id: RecipeId, servings: Decimal) -> ServiceResult<(Recipe, RecipeCost)> {
        let recipe = self.catalog.require_recipe(recipe_id)?;
        let scaled = scale_recipe(&recipe, servings)?;
        let cost = calculate_cost(&scaled, &*self.catalog)?;
        Ok((scaled, cost))
    }

    pub fn invalidate(&self, recipe_id: RecipeId) {
        self.costs.invalidate(&recipe_id);
    }

    pub fn invalidate_all(&self) {
        self.costs.clear();
    }
}

impl std::fmt::Debug for RecipeCosting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeCosting")
            .field("ttl", &self.costs.ttl())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use galley_catalog::{
        InMemoryCatalog, MaterialCategory, NewRawMaterial, RawMaterial, RecipeIngredient,
    };
    use galley_core::{DomainError, MaterialId};
    use galley_units::Unit;

    use crate::error::ServiceError;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn butter(cost: &str) -> RawMaterial {
        RawMaterial::new(
            MaterialId::from_uuid(uuid::Uuid::nil()),
            NewRawMaterial {
                name: "Butter".to_string(),
                category: MaterialCategory::Dairy,
                unit: Unit::Kilograms,
                base_unit: None,
                units_per_pack: None,
                unit_cost: dec(cost),
                min_stock_level: Decimal::ZERO,
                max_stock_level: dec("10"),
                preferred_supplier: None,
            },
        )
        .unwrap()
    }

    fn test_costing() -> (RecipeCosting, Arc<InMemoryCatalog>, RecipeId) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let material = butter("8.00");
        let recipe = Recipe::new(
            RecipeId::new(),
            "Croissant dough",
            "pastry",
            dec("20"),
            vec![RecipeIngredient::new(material.id, dec("500"), Unit::Grams)],
        );
        let recipe_id = recipe.id;
        catalog.upsert_material(material).unwrap();
        catalog.upsert_recipe(recipe).unwrap();
        let shared: SharedCatalog = catalog.clone();
        (RecipeCosting::new(shared, Duration::from_secs(60)), catalog, recipe_id)
    }

    #[test]
    fn cached_cost_follows_price_changes() {
        let (costing, catalog, recipe_id) = test_costing();
        let cost = costing.calculate_cost(recipe_id).unwrap();
        assert_eq!(cost.total_cost, dec("4.00"));
        assert_eq!(cost.cost_per_serving, dec("0.20"));
        assert_eq!(costing.calculate_cost(recipe_id).unwrap(), cost);

        catalog.upsert_material(butter("10.00")).unwrap();
        assert_eq!(costing.calculate_cost(recipe_id).unwrap().total_cost, dec("5.00"));

        costing.invalidate(recipe_id);
        assert_eq!(costing.calculate_cost(recipe_id).unwrap().total_cost, dec("5.00"));
    }

    #[test]
    fn cached_cost_follows_ingredient_changes() {
        let (costing, catalog, recipe_id) = test_costing();
        assert_eq!(costing.calculate_cost(recipe_id).unwrap().total_cost, dec("4.00"));

        let mut recipe = catalog.require_recipe(recipe_id).unwrap();
        recipe.ingredients[0].quantity = dec("250");
        catalog.upsert_recipe(recipe).unwrap();
        assert_eq!(costing.calculate_cost(recipe_id).unwrap().total_cost, dec("2.00"));
    }

    #[test]
    fn scaling_keeps_cost_per_serving() {
        let (costing, _, recipe_id) = test_costing();
        let (scaled, cost) = costing.scale(recipe_id, dec("40")).unwrap();
        assert_eq!(scaled.ingredients[0].quantity, dec("1000"));
        assert_eq!(cost.total_cost, dec("8.00"));
        assert_eq!(cost.cost_per_serving, dec("0.20"));
    }

    #[test]
    fn unknown_recipe_is_not_found() {
        let (costing, _, _) = test_costing();
        let err = costing.calculate_cost(RecipeId::new()).unwrap_err();
        match err {
            ServiceError::Domain(DomainError::NotFound(what)) if what.contains("recipe") => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
