use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_core::{DomainError, DomainResult, Entity, MaterialId, RecipeId};
use galley_units::{compatible, Unit};

use crate::catalog::Catalog;

/// One ingredient line, in whatever unit the recipe author used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub unit: Unit,
    pub notes: Option<String>,
}

impl RecipeIngredient {
    pub fn new(material_id: MaterialId, quantity: Decimal, unit: Unit) -> Self {
        Self {
            material_id,
            quantity,
            unit,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub category: String,
    /// Number of servings the ingredient list yields.
    pub serving_size: Decimal,
    pub active: bool,
    pub ingredients: Vec<RecipeIngredient>,
}

impl Recipe {
    pub fn new(
        id: RecipeId,
        name: impl Into<String>,
        category: impl Into<String>,
        serving_size: Decimal,
        ingredients: Vec<RecipeIngredient>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            category: category.into(),
            serving_size,
            active: true,
            ingredients,
        }
    }

    /// Check every ingredient against the catalog.
    ///
    /// Each ingredient must reference a known material, have a positive quantity
    /// and use a unit convertible to the material's unit or storage unit.
    /// A non-positive serving size is tolerated here; costing guards it.
    pub fn validate<C: Catalog + ?Sized>(&self, catalog: &C) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("recipe name cannot be empty"));
        }
        for (idx, ingredient) in self.ingredients.iter().enumerate() {
            if ingredient.quantity <= Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "ingredient {} quantity must be positive",
                    idx + 1
                )));
            }
            let material = catalog.require_material(ingredient.material_id)?;
            let pack = material.pack_info();
            let fits = compatible(ingredient.unit, material.unit, pack.as_ref())
                || compatible(ingredient.unit, material.storage_unit(), pack.as_ref());
            if !fits {
                return Err(DomainError::unit_mismatch(
                    ingredient.unit,
                    material.storage_unit(),
                ));
            }
        }
        Ok(())
    }

    /// Copy of this recipe with ingredient quantities scaled to `servings`.
    ///
    /// A non-positive current serving size cannot be scaled from.
    pub fn scaled(&self, servings: Decimal) -> DomainResult<Recipe> {
        if servings <= Decimal::ZERO {
            return Err(DomainError::validation("servings must be positive"));
        }
        if self.serving_size <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "recipe {} has no positive serving size to scale from",
                self.name
            )));
        }
        let factor = servings / self.serving_size;
        let mut scaled = self.clone();
        scaled.serving_size = servings;
        for ingredient in &mut scaled.ingredients {
            ingredient.quantity = ingredient
                .quantity
                .checked_mul(factor)
                .ok_or_else(|| DomainError::validation("scaled quantity overflows"))?;
        }
        Ok(scaled)
    }
}

impl Entity for Recipe {
    type Id = RecipeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
