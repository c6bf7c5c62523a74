//! Variance analysis and threshold-based recommendations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_catalog::MaterialCategory;

use crate::budget::Budget;
use crate::spend::BudgetSpending;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceLine {
    pub category: MaterialCategory,
    pub allocated: Decimal,
    pub actual: Decimal,
    /// `allocated - actual`; negative when over budget.
    pub variance: Decimal,
    /// Variance as a percentage of the allocation; zero for zero allocations.
    pub variance_pct: Decimal,
    pub is_overrun: bool,
}

pub fn variance_analysis(spending: &BudgetSpending) -> Vec<VarianceLine> {
    spending
        .by_category
        .iter()
        .map(|c| {
            let variance = c.allocated - c.spent;
            let variance_pct = if c.allocated > Decimal::ZERO {
                (variance * Decimal::ONE_HUNDRED)
                    .checked_div(c.allocated)
                    .unwrap_or_default()
            } else {
                Decimal::ZERO
            };
            VarianceLine {
                category: c.category,
                allocated: c.allocated,
                actual: c.spent,
                variance,
                variance_pct,
                is_overrun: c.spent > c.allocated,
            }
        })
        .collect()
}

/// Percentages that trigger recommendations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetThresholds {
    /// Utilisation at or above this is "near the limit".
    pub near_limit_pct: Decimal,
    /// Utilisation below this, late in the period, is "underutilised".
    pub underutilized_pct: Decimal,
    /// Elapsed share of the period after which underutilisation is reported.
    pub late_period_pct: Decimal,
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        Self {
            near_limit_pct: Decimal::from(90),
            underutilized_pct: Decimal::from(50),
            late_period_pct: Decimal::from(75),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationKind {
    BudgetOverrun,
    CategoryOverrun,
    NearLimit,
    Underutilized,
    UnallocatedSpend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub severity: Severity,
    pub category: Option<MaterialCategory>,
    pub message: String,
}

/// Deterministic recommendations for a budget, most severe first.
pub fn recommendations(
    budget: &Budget,
    spending: &BudgetSpending,
    thresholds: &BudgetThresholds,
    today: NaiveDate,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if spending.total_budget > Decimal::ZERO && spending.total_spent > spending.total_budget {
        out.push(Recommendation {
            kind: RecommendationKind::BudgetOverrun,
            severity: Severity::Critical,
            category: None,
            message: format!(
                "{} is over budget by {}",
                budget.name,
                (spending.total_spent - spending.total_budget).round_dp(2)
            ),
        });
    }

    let late = budget.elapsed_pct(today) >= thresholds.late_period_pct;
    for c in &spending.by_category {
        if c.spent > c.allocated {
            out.push(Recommendation {
                kind: RecommendationKind::CategoryOverrun,
                severity: Severity::Critical,
                category: Some(c.category),
                message: format!(
                    "{} spending exceeds its allocation by {}",
                    c.category,
                    (c.spent - c.allocated).round_dp(2)
                ),
            });
        } else if c.allocated > Decimal::ZERO && c.utilization_rate >= thresholds.near_limit_pct {
            out.push(Recommendation {
                kind: RecommendationKind::NearLimit,
                severity: Severity::Warning,
                category: Some(c.category),
                message: format!(
                    "{} has used {}% of its allocation",
                    c.category,
                    c.utilization_rate.round_dp(1)
                ),
            });
        } else if late && c.allocated > Decimal::ZERO && c.utilization_rate < thresholds.underutilized_pct {
            out.push(Recommendation {
                kind: RecommendationKind::Underutilized,
                severity: Severity::Info,
                category: Some(c.category),
                message: format!(
                    "{} has used only {}% of its allocation; consider reallocating",
                    c.category,
                    c.utilization_rate.round_dp(1)
                ),
            });
        }
    }

    for u in &spending.unallocated {
        out.push(Recommendation {
            kind: RecommendationKind::UnallocatedSpend,
            severity: Severity::Warning,
            category: Some(u.category),
            message: format!(
                "{} spent on {} which has no allocation",
                u.amount.round_dp(2),
                u.category
            ),
        });
    }

    out.sort_by_key(|r| r.severity);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetAllocation, NewBudget, SpendBasis};
    use crate::spend::{calculate_spending, SpendRecord, SpendSource};
    use galley_core::{BudgetId, MaterialId, PurchaseOrderId};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn test_budget() -> Budget {
        Budget::new(
            BudgetId::new(),
            NewBudget {
                name: "January".to_string(),
                period_start: date(1),
                period_end: date(31),
                basis: SpendBasis::PurchaseOrders,
                allocations: vec![
                    BudgetAllocation::new(MaterialCategory::Bakery, dec("100")),
                    BudgetAllocation::new(MaterialCategory::Dairy, dec("100")),
                    BudgetAllocation::new(MaterialCategory::Produce, dec("100")),
                ],
            },
        )
        .unwrap()
    }

    fn spend(category: MaterialCategory, amount: &str) -> SpendRecord {
        SpendRecord {
            source: SpendSource::PurchaseOrder(PurchaseOrderId::new()),
            material_id: MaterialId::new(),
            category,
            date: date(5),
            amount: dec(amount),
            guard: None,
        }
    }

    fn test_spending() -> (Budget, BudgetSpending) {
        let budget = test_budget();
        let spending = calculate_spending(
            &budget,
            &[
                spend(MaterialCategory::Bakery, "120"),
                spend(MaterialCategory::Dairy, "95"),
                spend(MaterialCategory::Produce, "10"),
                spend(MaterialCategory::Cleaning, "5"),
            ],
        );
        (budget, spending)
    }

    #[test]
    fn variance_per_allocation() {
        let (_, spending) = test_spending();
        let lines = variance_analysis(&spending);
        assert_eq!(lines.len(), 3);

        assert_eq!(lines[0].variance, dec("-20"));
        assert_eq!(lines[0].variance_pct, dec("-20"));
        assert!(lines[0].is_overrun);

        assert_eq!(lines[1].variance, dec("5"));
        assert!(!lines[1].is_overrun);
    }

    #[test]
    fn recommendations_mid_period() {
        let (budget, spending) = test_spending();
        let recs = recommendations(&budget, &spending, &BudgetThresholds::default(), date(10));

        let kinds: Vec<RecommendationKind> = recs.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecommendationKind::CategoryOverrun,
                RecommendationKind::NearLimit,
                RecommendationKind::UnallocatedSpend,
            ]
        );
        assert_eq!(recs[0].category, Some(MaterialCategory::Bakery));
        assert_eq!(recs[1].category, Some(MaterialCategory::Dairy));
    }

    #[test]
    fn underutilisation_only_late_in_period() {
        let (budget, spending) = test_spending();
        let recs = recommendations(&budget, &spending, &BudgetThresholds::default(), date(30));
        assert!(recs.iter().any(|r| r.kind == RecommendationKind::Underutilized
            && r.category == Some(MaterialCategory::Produce)));
    }

    #[test]
    fn overall_overrun_is_critical() {
        let budget = test_budget();
        let spending = calculate_spending(
            &budget,
            &[
                spend(MaterialCategory::Bakery, "150"),
                spend(MaterialCategory::Dairy, "100"),
                spend(MaterialCategory::Produce, "100"),
            ],
        );
        let recs = recommendations(&budget, &spending, &BudgetThresholds::default(), date(10));
        assert_eq!(recs[0].kind, RecommendationKind::BudgetOverrun);
        assert_eq!(recs[0].severity, Severity::Critical);
    }
}
