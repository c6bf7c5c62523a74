use rust_decimal::{Decimal, RoundingStrategy};

const PERCENT_DECIMALS: u32 = 2;

/// Share of each cost in the total, in percent.
///
/// Every share but the last is truncated to two decimals and the last absorbs the
/// remainder, so the result always sums to exactly 100 and no share is negative. A zero total splits
/// evenly under the same rule. No costs means no shares.
pub fn percentage_breakdown(costs: &[Decimal]) -> Vec<Decimal> {
    let Some((_, head)) = costs.split_last() else {
        return Vec::new();
    };

    let hundred = Decimal::ONE_HUNDRED;
    let total: Decimal = costs.iter().copied().sum();
    let even = hundred / Decimal::from(costs.len());

    let mut shares: Vec<Decimal> = head
        .iter()
        .map(|cost| {
            let raw = if total.is_zero() {
                even
            } else {
                *cost / total * hundred
            };
            raw.round_dp_with_strategy(PERCENT_DECIMALS, RoundingStrategy::ToZero)
        })
        .collect();

    let assigned: Decimal = shares.iter().copied().sum();
    shares.push(hundred - assigned);
    shares
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
    fn thirds_put_the_remainder_on_the_last_line() {
        let shares = percentage_breakdown(&[dec("1"), dec("1"), dec("1")]);
        assert_eq!(shares, vec![dec("33.33"), dec("33.33"), dec("33.34")]);
    }

    #[test]
    fn single_line_is_one_hundred_percent() {
        assert_eq!(percentage_breakdown(&[dec("5.00")]), vec![dec("100")]);
    }

    #[test]
    fn zero_total_splits_evenly() {
        let shares = percentage_breakdown(&[Decimal::ZERO; 4]);
        assert_eq!(shares, vec![dec("25"), dec("25"), dec("25"), dec("25")]);
    }

    #[test]
    fn zero_cost_last_line_is_not_negative() {
        let mut costs = vec![Decimal::ONE; 6];
        costs.push(Decimal::ZERO);
        let shares = percentage_breakdown(&costs);
        assert_eq!(shares[0], dec("16.66"));
        assert_eq!(shares[6], dec("0.04"));
    }

    #[test]
    fn empty_input_has_no_shares() {
        assert!(percentage_breakdown(&[]).is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn prop_shares_sum_to_exactly_one_hundred(
            cents in prop::collection::vec(0i64..1_000_000, 1..25)
        ) {
            let costs: Vec<Decimal> = cents.iter().map(|c| Decimal::new(*c, 2)).collect();
            let shares = percentage_breakdown(&costs);
            prop_assert_eq!(shares.len(), costs.len());
            let sum: Decimal = shares.iter().copied().sum();
            prop_assert_eq!(sum, Decimal::ONE_HUNDRED);
        }

        #[test]
        fn prop_no_share_is_negative(
            cents in prop::collection::vec(0i64..1_000_000, 1..25)
        ) {
            let costs: Vec<Decimal> = cents.iter().map(|c| Decimal::new(*c, 2)).collect();
            for share in percentage_breakdown(&costs) {
                prop_assert!(share >= Decimal::ZERO, "negative share {}", share);
            }
        }
    }
}
