//! Read-only reference data: raw materials, suppliers, sections and recipes.
//!
//! The core never mutates the catalog. Owners of the data load it through
//! whatever channel they use and expose it via the [`Catalog`] trait.

pub mod catalog;
pub mod material;
pub mod recipe;
pub mod section;
pub mod supplier;

pub use catalog::{Catalog, InMemoryCatalog};
pub use material::{MaterialCategory, NewRawMaterial, RawMaterial};
pub use recipe::{Recipe, RecipeIngredient};
pub use section::Section;
pub use supplier::Supplier;
