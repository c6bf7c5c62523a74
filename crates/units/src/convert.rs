use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_core::{DomainError, DomainResult};

use crate::unit::Unit;

/// Per-material bridge between a package unit and the unit it contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackInfo {
    pub base_unit: Unit,
    pub units_per_pack: Decimal,
}

impl PackInfo {
    pub fn new(base_unit: Unit, units_per_pack: Decimal) -> DomainResult<Self> {
        let info = Self {
            base_unit,
            units_per_pack,
        };
        info.validate()?;
        Ok(info)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.base_unit.is_package() {
            return Err(DomainError::validation(format!(
                "base unit cannot be a package unit ({})",
                self.base_unit
            )));
        }
        if self.units_per_pack <= Decimal::ZERO {
            return Err(DomainError::validation(
                "units per pack must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Convert `value` from one unit to another.
///
/// Same-category units convert through their power-of-ten factors. A package unit
/// converts only to (or from) the `base_unit` of the supplied `pack`. Anything
/// else is a `UnitMismatch`.
pub fn convert(value: Decimal, from: Unit, to: Unit, pack: Option<&PackInfo>) -> DomainResult<Decimal> {
    if from == to {
        return Ok(value);
    }

    match (from.factor(), to.factor()) {
        (Some(f_from), Some(f_to)) => {
            if from.category() != to.category() {
                return Err(DomainError::unit_mismatch(from, to));
            }
            scale(value, f_from, f_to, from, to)
        }
        (None, Some(_)) => {
            let pack = bridge(from, to, pack)?;
            checked(value.checked_mul(pack.units_per_pack), from, to)
        }
        (Some(_), None) => {
            let pack = bridge(to, from, pack)?;
            checked(value.checked_div(pack.units_per_pack), from, to)
        }
        (None, None) => Err(DomainError::unit_mismatch(from, to)),
    }
}

/// Whether `convert(_, from, to, pack)` can succeed.
pub fn compatible(from: Unit, to: Unit, pack: Option<&PackInfo>) -> bool {
    if from == to {
        return true;
    }
    match (from.is_package(), to.is_package()) {
        (false, false) => from.category() == to.category(),
        (true, false) => pack.is_some_and(|p| p.base_unit == to),
        (false, true) => pack.is_some_and(|p| p.base_unit == from),
        (true, true) => false,
    }
}

/// Units a material can be expressed in: its own unit, its base unit, then the
/// remaining units of the relevant category. Never crosses categories.
pub fn available_units(unit: Unit, base_unit: Option<Unit>) -> Vec<Unit> {
    let mut units = vec![unit];
    let anchor = match base_unit {
        Some(base) if unit.is_package() => {
            units.push(base);
            base
        }
        _ => unit,
    };
    if !anchor.is_package() {
        for u in anchor.same_category() {
            if !units.contains(&u) {
                units.push(u);
            }
        }
    }
    units
}

fn bridge<'a>(package: Unit, other: Unit, pack: Option<&'a PackInfo>) -> DomainResult<&'a PackInfo> {
    let Some(pack) = pack else {
        return Err(DomainError::validation(format!(
            "converting {package} requires units per pack and a base unit"
        )));
    };
    if pack.base_unit != other {
        return Err(DomainError::unit_mismatch(package, other));
    }
    if pack.units_per_pack <= Decimal::ZERO {
        return Err(DomainError::validation(
            "units per pack must be greater than zero",
        ));
    }
    Ok(pack)
}

fn scale(value: Decimal, f_from: Decimal, f_to: Decimal, from: Unit, to: Unit) -> DomainResult<Decimal> {
    // Multiply first when going to a smaller unit, divide first otherwise, so
    // intermediate values stay within range.
    let result = if f_from >= f_to {
        let ratio = f_from / f_to;
        value.checked_mul(ratio)
    } else {
        let ratio = f_to / f_from;
        value.checked_div(ratio)
    };
    checked(result, from, to)
}

fn checked(result: Option<Decimal>, from: Unit, to: Unit) -> DomainResult<Decimal> {
    result
        .map(|d| d.normalize())
        .ok_or_else(|| DomainError::validation(format!("conversion from {from} to {to} overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn flour_pack() -> PackInfo {
        PackInfo::new(Unit::Grams, dec("1000")).unwrap()
    }

    #[test]
    fn same_unit_is_identity() {
        let v = dec("12.345");
        assert_eq!(convert(v, Unit::Grams, Unit::Grams, None).unwrap(), v);
    }

    #[test]
    fn converts_within_a_category() {
        assert_eq!(
            convert(dec("1.5"), Unit::Kilograms, Unit::Grams, None).unwrap(),
            dec("1500")
        );
        assert_eq!(
            convert(dec("250"), Unit::Milliliters, Unit::Liters, None).unwrap(),
            dec("0.25")
        );
        assert_eq!(
            convert(dec("3"), Unit::SquareMeters, Unit::SquareCentimeters, None).unwrap(),
            dec("30000")
        );
    }

    #[test]
    fn cross_category_is_a_mismatch() {
        match convert(dec("1"), Unit::Grams, Unit::Liters, None) {
            Err(DomainError::UnitMismatch { from, to }) => {
                assert_eq!(from, "GRAMS");
                assert_eq!(to, "LITERS");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn packs_bridge_to_their_base_unit_only() {
        let pack = flour_pack();
        assert_eq!(
            convert(dec("2"), Unit::Packs, Unit::Grams, Some(&pack)).unwrap(),
            dec("2000")
        );
        assert_eq!(
            convert(dec("250"), Unit::Grams, Unit::Packs, Some(&pack)).unwrap(),
            dec("0.25")
        );
        assert!(matches!(
            convert(dec("1"), Unit::Packs, Unit::Kilograms, Some(&pack)),
            Err(DomainError::UnitMismatch { .. })
        ));
        assert!(matches!(
            convert(dec("1"), Unit::Packs, Unit::Boxes, Some(&pack)),
            Err(DomainError::UnitMismatch { .. })
        ));
    }

    #[test]
    fn pack_conversion_without_pack_info_is_rejected() {
        match convert(dec("1"), Unit::Boxes, Unit::Pieces, None) {
            Err(DomainError::Validation(msg)) if msg.contains("units per pack") => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn pack_info_rejects_non_positive_sizes_and_package_bases() {
        assert!(PackInfo::new(Unit::Grams, Decimal::ZERO).is_err());
        assert!(PackInfo::new(Unit::Pieces, dec("-3")).is_err());
        assert!(PackInfo::new(Unit::Packs, dec("3")).is_err());
    }

    #[test]
    fn overflow_is_a_validation_error() {
        match convert(Decimal::MAX, Unit::Kilograms, Unit::Milligrams, None) {
            Err(DomainError::Validation(msg)) if msg.contains("overflows") => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn compatibility_matches_convert() {
        let pack = flour_pack();
        for from in Unit::ALL {
            for to in Unit::ALL {
                let ok = convert(Decimal::ONE, from, to, Some(&pack)).is_ok();
                assert_eq!(compatible(from, to, Some(&pack)), ok, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn available_units_for_a_pack_material() {
        let units = available_units(Unit::Packs, Some(Unit::Grams));
        assert_eq!(
            units,
            vec![Unit::Packs, Unit::Grams, Unit::Milligrams, Unit::Kilograms]
        );
    }

    #[test]
    fn available_units_never_cross_categories() {
        for unit in Unit::ALL {
            if unit.is_package() {
                continue;
            }
            for u in available_units(unit, None) {
                assert_eq!(u.category(), unit.category());
            }
        }
    }

    fn non_package_unit() -> impl Strategy<Value = Unit> {
        prop::sample::select(
            Unit::ALL
                .into_iter()
                .filter(|u| !u.is_package())
                .collect::<Vec<_>>(),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn prop_same_category_round_trip_is_exact(
            mantissa in -1_000_000_000i64..1_000_000_000i64,
            dp in 0u32..6,
            from in non_package_unit(),
            to in non_package_unit(),
        ) {
            prop_assume!(from.category() == to.category());
            let x = Decimal::new(mantissa, dp);
            let there = convert(x, from, to, None).unwrap();
            let back = convert(there, to, from, None).unwrap();
            prop_assert_eq!(back, x);
        }

        #[test]
        fn prop_pack_round_trip_is_exact_for_power_of_ten_sizes(
            packs in 0i64..100_000,
            exp in 0u32..5,
        ) {
            let pack = PackInfo::new(Unit::Grams, Decimal::from(10i64.pow(exp))).unwrap();
            let x = Decimal::from(packs);
            let grams = convert(x, Unit::Packs, Unit::Grams, Some(&pack)).unwrap();
            let back = convert(grams, Unit::Grams, Unit::Packs, Some(&pack)).unwrap();
            prop_assert_eq!(back, x);
        }
    }
}
