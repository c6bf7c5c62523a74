use rust_decimal::Decimal;

use galley_core::{GuardReason, Guarded};

use crate::unit::Unit;

/// Cost of one storage unit of a material.
///
/// For package units this is `unit_cost / units_per_pack`; a missing or
/// non-positive pack size substitutes `1` and marks the result approximate.
/// Other units cost exactly `unit_cost`.
pub fn effective_unit_cost(
    unit: Unit,
    unit_cost: Decimal,
    units_per_pack: Option<Decimal>,
) -> Guarded<Decimal> {
    if !unit.is_package() {
        return Guarded::exact(unit_cost);
    }
    match units_per_pack {
        Some(size) if size > Decimal::ZERO => match unit_cost.checked_div(size) {
            Some(cost) => Guarded::exact(cost),
            None => Guarded::approximate(unit_cost, GuardReason::NonPositiveUnitsPerPack),
        },
        Some(_) => Guarded::approximate(unit_cost, GuardReason::NonPositiveUnitsPerPack),
        None => Guarded::approximate(unit_cost, GuardReason::MissingUnitsPerPack),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn flour_pack_costs_one_cent_per_gram() {
        let cost = effective_unit_cost(Unit::Packs, dec("10.00"), Some(dec("1000")));
        assert_eq!(*cost.value(), dec("0.01"));
        assert!(!cost.is_approximate());
    }

    #[test]
    fn plain_units_cost_their_unit_cost() {
        let cost = effective_unit_cost(Unit::Kilograms, dec("3.20"), Some(dec("12")));
        assert_eq!(cost.into_value(), dec("3.20"));
    }

    #[test]
    fn missing_pack_size_falls_back_to_one() {
        let cost = effective_unit_cost(Unit::Boxes, dec("24"), None);
        assert_eq!(*cost.value(), dec("24"));
        assert_eq!(cost.reason(), Some(GuardReason::MissingUnitsPerPack));

        let cost = effective_unit_cost(Unit::Packs, dec("24"), Some(Decimal::ZERO));
        assert_eq!(cost.reason(), Some(GuardReason::NonPositiveUnitsPerPack));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn prop_effective_cost_times_pack_size_is_unit_cost(
            cents in 0i64..10_000_000,
            exp in 0u32..6,
            multiplier in prop::sample::select(vec![1i64, 2, 4, 5, 8, 25]),
        ) {
            let unit_cost = Decimal::new(cents, 2);
            let size = Decimal::from(10i64.pow(exp) * multiplier);
            let per_unit = effective_unit_cost(Unit::Packs, unit_cost, Some(size)).into_value();
            prop_assert_eq!(per_unit * size, unit_cost);
        }
    }
}
