use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_core::{DomainError, DomainResult, Entity, Guarded, MaterialId, SupplierId};
use galley_units::{available_units, convert, effective_unit_cost, PackInfo, Unit};

/// Closed set of material categories; budgets allocate per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialCategory {
    Produce,
    Meat,
    Seafood,
    Dairy,
    Bakery,
    DryGoods,
    Spices,
    Oils,
    Beverages,
    Packaging,
    Cleaning,
    Other,
}

impl std::fmt::Display for MaterialCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Produce => write!(f, "PRODUCE"),
            Self::Meat => write!(f, "MEAT"),
            Self::Seafood => write!(f, "SEAFOOD"),
            Self::Dairy => write!(f, "DAIRY"),
            Self::Bakery => write!(f, "BAKERY"),
            Self::DryGoods => write!(f, "DRY_GOODS"),
            Self::Spices => write!(f, "SPICES"),
            Self::Oils => write!(f, "OILS"),
            Self::Beverages => write!(f, "BEVERAGES"),
            Self::Packaging => write!(f, "PACKAGING"),
            Self::Cleaning => write!(f, "CLEANING"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

impl std::str::FromStr for MaterialCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "produce" => Ok(Self::Produce),
            "meat" => Ok(Self::Meat),
            "seafood" => Ok(Self::Seafood),
            "dairy" => Ok(Self::Dairy),
            "bakery" => Ok(Self::Bakery),
            "dry_goods" | "drygoods" => Ok(Self::DryGoods),
            "spices" => Ok(Self::Spices),
            "oils" => Ok(Self::Oils),
            "beverages" => Ok(Self::Beverages),
            "packaging" => Ok(Self::Packaging),
            "cleaning" => Ok(Self::Cleaning),
            "other" => Ok(Self::Other),
            _ => Err(DomainError::validation(format!("unknown material category: {s}"))),
        }
    }
}

/// A purchasable raw material.
///
/// `unit_cost` is the price of one `unit`. For PACKS/BOXES materials, one unit
/// holds `units_per_pack` of `base_unit`, and stock held by sections is counted
/// in `base_unit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMaterial {
    pub id: MaterialId,
    pub name: String,
    pub category: MaterialCategory,
    pub unit: Unit,
    pub base_unit: Option<Unit>,
    pub units_per_pack: Option<Decimal>,
    pub unit_cost: Decimal,
    pub min_stock_level: Decimal,
    pub max_stock_level: Decimal,
    pub active: bool,
    pub preferred_supplier: Option<SupplierId>,
}

/// Input for [`RawMaterial::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRawMaterial {
    pub name: String,
    pub category: MaterialCategory,
    pub unit: Unit,
    pub base_unit: Option<Unit>,
    pub units_per_pack: Option<Decimal>,
    pub unit_cost: Decimal,
    pub min_stock_level: Decimal,
    pub max_stock_level: Decimal,
    pub preferred_supplier: Option<SupplierId>,
}

impl RawMaterial {
    /// Build a validated, active material.
    ///
    /// Pack fields are dropped for non-package units.
    pub fn new(id: MaterialId, draft: NewRawMaterial) -> DomainResult<Self> {
        let is_package = draft.unit.is_package();
        let material = Self {
            id,
            name: draft.name.trim().to_string(),
            category: draft.category,
            unit: draft.unit,
            base_unit: draft.base_unit.filter(|_| is_package),
            units_per_pack: draft.units_per_pack.filter(|_| is_package),
            unit_cost: draft.unit_cost,
            min_stock_level: draft.min_stock_level,
            max_stock_level: draft.max_stock_level,
            active: true,
            preferred_supplier: draft.preferred_supplier,
        };
        material.validate()?;
        Ok(material)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("material name cannot be empty"));
        }
        if self.unit_cost < Decimal::ZERO {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }
        if self.min_stock_level < Decimal::ZERO || self.max_stock_level < Decimal::ZERO {
            return Err(DomainError::validation("stock levels cannot be negative"));
        }
        if self.min_stock_level > self.max_stock_level {
            return Err(DomainError::validation(
                "minimum stock level cannot exceed maximum stock level",
            ));
        }
        if self.unit.is_package() {
            let (Some(base_unit), Some(units_per_pack)) = (self.base_unit, self.units_per_pack)
            else {
                return Err(DomainError::validation(format!(
                    "{} materials require a base unit and units per pack",
                    self.unit
                )));
            };
            PackInfo::new(base_unit, units_per_pack)?;
        }
        Ok(())
    }

    /// Pack bridge, present only for package materials with complete pack data.
    pub fn pack_info(&self) -> Option<PackInfo> {
        if !self.unit.is_package() {
            return None;
        }
        Some(PackInfo {
            base_unit: self.base_unit?,
            units_per_pack: self.units_per_pack?,
        })
    }

    /// Unit section holdings and recipe costs are expressed in.
    pub fn storage_unit(&self) -> Unit {
        match self.base_unit {
            Some(base) if self.unit.is_package() => base,
            _ => self.unit,
        }
    }

    /// Cost of one storage unit.
    pub fn effective_unit_cost(&self) -> Guarded<Decimal> {
        effective_unit_cost(self.unit, self.unit_cost, self.units_per_pack)
    }

    pub fn available_units(&self) -> Vec<Unit> {
        available_units(self.unit, self.base_unit.filter(|_| self.unit.is_package()))
    }

    /// Convert a quantity in `from` into storage units.
    pub fn to_storage_units(&self, quantity: Decimal, from: Unit) -> DomainResult<Decimal> {
        convert(quantity, from, self.storage_unit(), self.pack_info().as_ref())
    }

    /// Convert a quantity in storage units into purchase units.
    pub fn to_purchase_units(&self, quantity: Decimal) -> DomainResult<Decimal> {
        convert(quantity, self.storage_unit(), self.unit, self.pack_info().as_ref())
    }
}

impl Entity for RawMaterial {
    type Id = MaterialId;

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
