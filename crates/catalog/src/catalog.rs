use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use galley_core::{DomainError, DomainResult, MaterialId, RecipeId, SectionId, SupplierId};

use crate::material::RawMaterial;
use crate::recipe::Recipe;
use crate::section::Section;
use crate::supplier::Supplier;

/// Read-only access to reference data.
pub trait Catalog: Send + Sync {
    fn material(&self, id: MaterialId) -> Option<RawMaterial>;
    fn materials(&self) -> Vec<RawMaterial>;
    fn supplier(&self, id: SupplierId) -> Option<Supplier>;
    fn suppliers(&self) -> Vec<Supplier>;
    fn section(&self, id: SectionId) -> Option<Section>;
    fn sections(&self) -> Vec<Section>;
    fn recipe(&self, id: RecipeId) -> Option<Recipe>;
    fn recipes(&self) -> Vec<Recipe>;

    fn require_material(&self, id: MaterialId) -> DomainResult<RawMaterial> {
        self.material(id)
            .ok_or_else(|| DomainError::not_found(format!("material {id}")))
    }

    /// Resolve a material that may take part in new stock operations.
    fn require_active_material(&self, id: MaterialId) -> DomainResult<RawMaterial> {
        let material = self.require_material(id)?;
        if !material.active {
            return Err(DomainError::validation(format!(
                "material {} is inactive",
                material.name
            )));
        }
        Ok(material)
    }

    fn require_section(&self, id: SectionId) -> DomainResult<Section> {
        let section = self
            .section(id)
            .ok_or_else(|| DomainError::not_found(format!("section {id}")))?;
        if !section.active {
            return Err(DomainError::validation(format!(
                "section {} is inactive",
                section.name
            )));
        }
        Ok(section)
    }

    fn require_recipe(&self, id: RecipeId) -> DomainResult<Recipe> {
        self.recipe(id)
            .ok_or_else(|| DomainError::not_found(format!("recipe {id}")))
    }

    fn require_supplier(&self, id: SupplierId) -> DomainResult<Supplier> {
        self.supplier(id)
            .ok_or_else(|| DomainError::not_found(format!("supplier {id}")))
    }
}

impl<C> Catalog for Arc<C>
where
    C: Catalog + ?Sized,
{
    fn material(&self, id: MaterialId) -> Option<RawMaterial> {
        (**self).material(id)
    }

    fn materials(&self) -> Vec<RawMaterial> {
        (**self).materials()
    }

    fn supplier(&self, id: SupplierId) -> Option<Supplier> {
        (**self).supplier(id)
    }

    fn suppliers(&self) -> Vec<Supplier> {
        (**self).suppliers()
    }

    fn section(&self, id: SectionId) -> Option<Section> {
        (**self).section(id)
    }

    fn sections(&self) -> Vec<Section> {
        (**self).sections()
    }

    fn recipe(&self, id: RecipeId) -> Option<Recipe> {
        (**self).recipe(id)
    }

    fn recipes(&self) -> Vec<Recipe> {
        (**self).recipes()
    }
}

/// In-memory catalog for embedding and tests.
///
/// Loading goes through the `upsert_*` methods, which validate what they store.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    materials: RwLock<HashMap<MaterialId, RawMaterial>>,
    suppliers: RwLock<HashMap<SupplierId, Supplier>>,
    sections: RwLock<HashMap<SectionId, Section>>,
    recipes: RwLock<HashMap<RecipeId, Recipe>>,
}

fn poisoned() -> DomainError {
    DomainError::invariant("catalog lock poisoned")
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_material(&self, material: RawMaterial) -> DomainResult<()> {
        material.validate()?;
        let mut map = self.materials.write().map_err(|_| poisoned())?;
        map.insert(material.id, material);
        Ok(())
    }

    pub fn upsert_supplier(&self, supplier: Supplier) -> DomainResult<()> {
        if supplier.name.trim().is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }
        let mut map = self.suppliers.write().map_err(|_| poisoned())?;
        map.insert(supplier.id, supplier);
        Ok(())
    }

    pub fn upsert_section(&self, section: Section) -> DomainResult<()> {
        if section.name.trim().is_empty() {
            return Err(DomainError::validation("section name cannot be empty"));
        }
        let mut map = self.sections.write().map_err(|_| poisoned())?;
        map.insert(section.id, section);
        Ok(())
    }

    /// Store a recipe after checking its ingredients against the materials
    /// already loaded.
    pub fn upsert_recipe(&self, recipe: Recipe) -> DomainResult<()> {
        recipe.validate(self)?;
        let mut map = self.recipes.write().map_err(|_| poisoned())?;
        map.insert(recipe.id, recipe);
        Ok(())
    }
}

fn sorted_by_name<T>(mut items: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by(|a, b| name(a).cmp(name(b)));
    items
}

impl Catalog for InMemoryCatalog {
    fn material(&self, id: MaterialId) -> Option<RawMaterial> {
        self.materials.read().ok()?.get(&id).cloned()
    }

    fn materials(&self) -> Vec<RawMaterial> {
        let items = match self.materials.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        };
        sorted_by_name(items, |m| m.name.as_str())
    }

    fn supplier(&self, id: SupplierId) -> Option<Supplier> {
        self.suppliers.read().ok()?.get(&id).cloned()
    }

    fn suppliers(&self) -> Vec<Supplier> {
        let items = match self.suppliers.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        };
        sorted_by_name(items, |s| s.name.as_str())
    }

    fn section(&self, id: SectionId) -> Option<Section> {
        self.sections.read().ok()?.get(&id).cloned()
    }

    fn sections(&self) -> Vec<Section> {
        let items = match self.sections.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        };
        sorted_by_name(items, |s| s.name.as_str())
    }

    fn recipe(&self, id: RecipeId) -> Option<Recipe> {
        self.recipes.read().ok()?.get(&id).cloned()
    }

    fn recipes(&self) -> Vec<Recipe> {
        let items = match self.recipes.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        };
        sorted_by_name(items, |r| r.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MaterialCategory, NewRawMaterial};
    use galley_units::Unit;
    use rust_decimal::Decimal;

    fn test_material(name: &str) -> RawMaterial {
        RawMaterial::new(
            MaterialId::new(),
            NewRawMaterial {
                name: name.to_string(),
                category: MaterialCategory::Produce,
                unit: Unit::Kilograms,
                base_unit: None,
                units_per_pack: None,
                unit_cost: Decimal::from(2),
                min_stock_level: Decimal::ZERO,
                max_stock_level: Decimal::from(5),
                preferred_supplier: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn materials_are_listed_by_name() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_material(test_material("Tomatoes")).unwrap();
        catalog.upsert_material(test_material("Onions")).unwrap();

        let names: Vec<_> = catalog.materials().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Onions", "Tomatoes"]);
    }

    #[test]
    fn inactive_material_is_rejected_for_new_operations() {
        let catalog = InMemoryCatalog::new();
        let mut m = test_material("Basil");
        m.active = false;
        let id = m.id;
        catalog.upsert_material(m).unwrap();

        assert!(catalog.require_material(id).is_ok());
        match catalog.require_active_material(id) {
            Err(DomainError::Validation(msg)) if msg.contains("inactive") => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_entries_are_not_found() {
        let catalog = InMemoryCatalog::new();
        assert!(matches!(
            catalog.require_section(SectionId::new()),
            Err(DomainError::NotFound(msg)) if msg.starts_with("section")
        ));
        assert!(matches!(
            catalog.require_recipe(RecipeId::new()),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn invalid_material_is_not_stored() {
        let catalog = InMemoryCatalog::new();
        let mut m = test_material("Salt");
        m.unit_cost = Decimal::from(-1);
        assert!(catalog.upsert_material(m).is_err());
        assert!(catalog.materials().is_empty());
    }
}
