//! Display rounding. Never applied to stored or intermediate values.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::unit::Unit;

/// Decimals shown for a per-storage-unit cost.
pub const UNIT_COST_DECIMALS: u32 = 4;

/// Decimals shown for money amounts.
pub const MONEY_DECIMALS: u32 = 2;

fn quantity_decimals(unit: Unit) -> u32 {
    match unit {
        Unit::Milligrams
        | Unit::Grams
        | Unit::Milliliters
        | Unit::Pieces
        | Unit::Millimeters
        | Unit::SquareCentimeters => 0,
        Unit::Kilograms | Unit::Liters | Unit::Centiliters | Unit::Centimeters => 1,
        Unit::Meters | Unit::SquareMeters | Unit::Packs | Unit::Boxes => 2,
    }
}

fn round(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a quantity to the precision shown for its unit.
pub fn round_for_display(value: Decimal, unit: Unit) -> Decimal {
    round(value, quantity_decimals(unit))
}

pub fn round_money(value: Decimal) -> Decimal {
    round(value, MONEY_DECIMALS)
}

/// `"1.5 kg"`, `"250 g"`.
pub fn format_quantity(value: Decimal, unit: Unit) -> String {
    let dp = quantity_decimals(unit) as usize;
    format!("{:.dp$} {}", round_for_display(value, unit), unit.abbreviation())
}

/// `"0.0100/g"`.
pub fn format_unit_cost(cost: Decimal, unit: Unit) -> String {
    let dp = UNIT_COST_DECIMALS as usize;
    format!("{:.dp$}/{}", round(cost, UNIT_COST_DECIMALS), unit.abbreviation())
}

/// `"50.00"`.
pub fn format_money(value: Decimal) -> String {
    let dp = MONEY_DECIMALS as usize;
    format!("{:.dp$}", round_money(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn rounding_depends_on_unit() {
        assert_eq!(round_for_display(dec("249.5"), Unit::Grams), dec("250"));
        assert_eq!(round_for_display(dec("1.25"), Unit::Kilograms), dec("1.3"));
        assert_eq!(round_for_display(dec("0.333"), Unit::Liters), dec("0.3"));
    }

    #[test]
    fn formatting() {
        assert_eq!(format_quantity(dec("1750"), Unit::Grams), "1750 g");
        assert_eq!(format_quantity(dec("1.5"), Unit::Kilograms), "1.5 kg");
        assert_eq!(format_quantity(dec("2"), Unit::Liters), "2.0 l");
        assert_eq!(format_unit_cost(dec("0.01"), Unit::Grams), "0.0100/g");
        assert_eq!(format_money(dec("50")), "50.00");
        assert_eq!(format_money(dec("0.005")), "0.01");
    }
}
