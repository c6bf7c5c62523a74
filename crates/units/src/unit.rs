use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_core::DomainError;

/// Physical dimension of a unit. Only units of the same category convert directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitCategory {
    Weight,
    Volume,
    Count,
    Length,
    Area,
    /// Composite units whose size is per-material data.
    Package,
}

/// Measurement unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Unit {
    Milligrams,
    Grams,
    Kilograms,
    Milliliters,
    Centiliters,
    Liters,
    Pieces,
    Millimeters,
    Centimeters,
    Meters,
    SquareCentimeters,
    SquareMeters,
    Packs,
    Boxes,
}

impl Unit {
    pub const ALL: [Unit; 14] = [
        Unit::Milligrams,
        Unit::Grams,
        Unit::Kilograms,
        Unit::Milliliters,
        Unit::Centiliters,
        Unit::Liters,
        Unit::Pieces,
        Unit::Millimeters,
        Unit::Centimeters,
        Unit::Meters,
        Unit::SquareCentimeters,
        Unit::SquareMeters,
        Unit::Packs,
        Unit::Boxes,
    ];

    pub fn category(self) -> UnitCategory {
        match self {
            Unit::Milligrams | Unit::Grams | Unit::Kilograms => UnitCategory::Weight,
            Unit::Milliliters | Unit::Centiliters | Unit::Liters => UnitCategory::Volume,
            Unit::Pieces => UnitCategory::Count,
            Unit::Millimeters | Unit::Centimeters | Unit::Meters => UnitCategory::Length,
            Unit::SquareCentimeters | Unit::SquareMeters => UnitCategory::Area,
            Unit::Packs | Unit::Boxes => UnitCategory::Package,
        }
    }

    pub fn is_package(self) -> bool {
        self.category() == UnitCategory::Package
    }

    /// How many of the category's smallest unit make up one of `self`.
    ///
    /// Always a power of ten. `None` for package units.
    pub fn factor(self) -> Option<Decimal> {
        let f: i64 = match self {
            Unit::Milligrams => 1,
            Unit::Grams => 1_000,
            Unit::Kilograms => 1_000_000,
            Unit::Milliliters => 1,
            Unit::Centiliters => 10,
            Unit::Liters => 1_000,
            Unit::Pieces => 1,
            Unit::Millimeters => 1,
            Unit::Centimeters => 10,
            Unit::Meters => 1_000,
            Unit::SquareCentimeters => 1,
            Unit::SquareMeters => 10_000,
            Unit::Packs | Unit::Boxes => return None,
        };
        Some(Decimal::from(f))
    }

    /// Other units of the same category, in declaration order (includes `self`).
    pub fn same_category(self) -> impl Iterator<Item = Unit> {
        let category = self.category();
        Unit::ALL.into_iter().filter(move |u| u.category() == category)
    }

    /// Canonical upper-case name, as stored.
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Milligrams => "MILLIGRAMS",
            Unit::Grams => "GRAMS",
            Unit::Kilograms => "KILOGRAMS",
            Unit::Milliliters => "MILLILITERS",
            Unit::Centiliters => "CENTILITERS",
            Unit::Liters => "LITERS",
            Unit::Pieces => "PIECES",
            Unit::Millimeters => "MILLIMETERS",
            Unit::Centimeters => "CENTIMETERS",
            Unit::Meters => "METERS",
            Unit::SquareCentimeters => "SQUARE_CENTIMETERS",
            Unit::SquareMeters => "SQUARE_METERS",
            Unit::Packs => "PACKS",
            Unit::Boxes => "BOXES",
        }
    }

    /// Short label used in formatted output.
    pub fn abbreviation(self) -> &'static str {
        match self {
            Unit::Milligrams => "mg",
            Unit::Grams => "g",
            Unit::Kilograms => "kg",
            Unit::Milliliters => "ml",
            Unit::Centiliters => "cl",
            Unit::Liters => "l",
            Unit::Pieces => "pcs",
            Unit::Millimeters => "mm",
            Unit::Centimeters => "cm",
            Unit::Meters => "m",
            Unit::SquareCentimeters => "cm²",
            Unit::SquareMeters => "m²",
            Unit::Packs => "packs",
            Unit::Boxes => "boxes",
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Unit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "milligrams" | "milligram" | "mg" => Ok(Self::Milligrams),
            "grams" | "gram" | "g" | "gr" => Ok(Self::Grams),
            "kilograms" | "kilogram" | "kg" | "kgs" => Ok(Self::Kilograms),
            "milliliters" | "milliliter" | "millilitres" | "millilitre" | "ml" => {
                Ok(Self::Milliliters)
            }
            "centiliters" | "centiliter" | "centilitres" | "centilitre" | "cl" => {
                Ok(Self::Centiliters)
            }
            "liters" | "liter" | "litres" | "litre" | "l" | "lt" => Ok(Self::Liters),
            "pieces" | "piece" | "pcs" | "pc" | "ea" => Ok(Self::Pieces),
            "millimeters" | "millimeter" | "mm" => Ok(Self::Millimeters),
            "centimeters" | "centimeter" | "cm" => Ok(Self::Centimeters),
            "meters" | "meter" | "metres" | "metre" | "m" => Ok(Self::Meters),
            "square_centimeters" | "square_centimeter" | "cm2" | "sqcm" => {
                Ok(Self::SquareCentimeters)
            }
            "square_meters" | "square_meter" | "m2" | "sqm" => Ok(Self::SquareMeters),
            "packs" | "pack" | "pk" => Ok(Self::Packs),
            "boxes" | "box" | "bx" => Ok(Self::Boxes),
            _ => Err(DomainError::validation(format!("unknown unit: {s}"))),
        }
    }
}
