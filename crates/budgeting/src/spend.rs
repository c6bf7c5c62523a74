//! Spend aggregation against a budget.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_catalog::{Catalog, MaterialCategory, RawMaterial};
use galley_core::{
    BudgetId, ConsumptionId, DomainError, DomainResult, GuardReason, Guarded, MaterialId,
    PurchaseOrderId,
};
use galley_inventory::SectionConsumption;
use galley_purchasing::PurchaseOrder;

use crate::budget::Budget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SpendSource {
    PurchaseOrder(PurchaseOrderId),
    Consumption(ConsumptionId),
}

/// One amount of money spent on a material on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRecord {
    pub source: SpendSource,
    pub material_id: MaterialId,
    pub category: MaterialCategory,
    pub date: NaiveDate,
    pub amount: Decimal,
    /// Set when the amount was computed with a guarded default.
    pub guard: Option<GuardReason>,
}

/// Spend records for one purchase order, one per line.
///
/// Orders that never reached approval, or were cancelled, carry no spend.
pub fn purchase_order_spend<C: Catalog + ?Sized>(
    order: &PurchaseOrder,
    catalog: &C,
) -> DomainResult<Vec<SpendRecord>> {
    if !order.status().is_committed() {
        return Ok(Vec::new());
    }
    let date = order
        .order_date()
        .ok_or_else(|| DomainError::invariant("committed order without an order date"))?;
    let order_id = *galley_core::AggregateRoot::id(order);

    order
        .lines()
        .iter()
        .map(|line| {
            let material = catalog.require_material(line.material_id)?;
            Ok(SpendRecord {
                source: SpendSource::PurchaseOrder(order_id),
                material_id: line.material_id,
                category: material.category,
                date,
                amount: line.line_total,
                guard: None,
            })
        })
        .collect()
}

/// Spend record for one section consumption, valued at the material's
/// effective unit cost.
pub fn consumption_spend(
    consumption: &SectionConsumption,
    material: &RawMaterial,
) -> DomainResult<SpendRecord> {
    if consumption.material_id != material.id {
        return Err(DomainError::invariant("consumption material mismatch"));
    }
    let quantity = material.to_storage_units(consumption.quantity, consumption.unit)?;
    let unit_cost = material.effective_unit_cost();
    let amount = quantity
        .checked_mul(*unit_cost.value())
        .ok_or_else(|| DomainError::validation("consumption value overflows"))?;

    Ok(SpendRecord {
        source: SpendSource::Consumption(consumption.consumption_id),
        material_id: material.id,
        category: material.category,
        date: consumption.consumed_at.date_naive(),
        amount,
        guard: unit_cost.reason(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpend {
    pub category: MaterialCategory,
    pub allocated: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub utilization_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnallocatedSpend {
    pub category: MaterialCategory,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSpending {
    pub budget_id: BudgetId,
    pub total_budget: Decimal,
    /// Spend in allocated categories.
    pub total_spent: Decimal,
    pub remaining: Decimal,
    pub utilization_rate: Decimal,
    pub by_category: Vec<CategorySpend>,
    pub unallocated: Vec<UnallocatedSpend>,
    pub record_count: usize,
    pub approximations: Vec<GuardReason>,
}

impl BudgetSpending {
    pub fn unallocated_total(&self) -> Decimal {
        self.unallocated.iter().map(|u| u.amount).sum()
    }

    pub fn is_approximate(&self) -> bool {
        !self.approximations.is_empty()
    }
}

/// `spent / allocated × 100`; a zero allocation yields a guarded zero.
pub fn utilization(spent: Decimal, allocated: Decimal) -> Guarded<Decimal> {
    if allocated > Decimal::ZERO {
        if let Some(rate) = spent
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|v| v.checked_div(allocated))
        {
            return Guarded::exact(rate);
        }
    }
    if spent.is_zero() && allocated.is_zero() {
        return Guarded::exact(Decimal::ZERO);
    }
    Guarded::approximate(Decimal::ZERO, GuardReason::ZeroBudget)
}

/// Aggregate `records` against `budget`.
///
/// Only records inside the budget period whose source matches the budget's
/// spend basis are counted.
pub fn calculate_spending(budget: &Budget, records: &[SpendRecord]) -> BudgetSpending {
    let mut approximations = Vec::new();
    let mut note = |reason: Option<GuardReason>| {
        if let Some(reason) = reason {
            if !approximations.contains(&reason) {
                approximations.push(reason);
            }
        }
    };

    let mut spent: BTreeMap<MaterialCategory, Decimal> = BTreeMap::new();
    let mut record_count = 0;
    for record in records.iter().filter(|r| counts(budget, r)) {
        *spent.entry(record.category).or_default() += record.amount;
        note(record.guard);
        record_count += 1;
    }

    let by_category: Vec<CategorySpend> = budget
        .allocations
        .iter()
        .map(|allocation| {
            let category_spent = spent.get(&allocation.category).copied().unwrap_or_default();
            let rate = utilization(category_spent, allocation.allocated);
            note(rate.reason());
            CategorySpend {
                category: allocation.category,
                allocated: allocation.allocated,
                spent: category_spent,
                remaining: allocation.allocated - category_spent,
                utilization_rate: rate.into_value(),
            }
        })
        .collect();

    let unallocated: Vec<UnallocatedSpend> = spent
        .iter()
        .filter(|(category, _)| budget.allocation(**category).is_none())
        .map(|(category, amount)| UnallocatedSpend {
            category: *category,
            amount: *amount,
        })
        .collect();

    let total_budget = budget.total_budget();
    let total_spent: Decimal = by_category.iter().map(|c| c.spent).sum();
    let rate = utilization(total_spent, total_budget);
    note(rate.reason());

    tracing::debug!(
        budget_id = %budget.id,
        records = record_count,
        total_spent = %total_spent,
        "budget spending calculated"
    );

    BudgetSpending {
        budget_id: budget.id,
        total_budget,
        total_spent,
        remaining: total_budget - total_spent,
        utilization_rate: rate.into_value(),
        by_category,
        unallocated,
        record_count,
        approximations,
    }
}

fn counts(budget: &Budget, record: &SpendRecord) -> bool {
    let basis_matches = match record.source {
        SpendSource::PurchaseOrder(_) => budget.basis.counts_purchases(),
        SpendSource::Consumption(_) => budget.basis.counts_consumption(),
    };
    basis_matches && budget.contains(record.date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetAllocation, NewBudget, SpendBasis};
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn budget(basis: SpendBasis) -> Budget {
        Budget::new(
            BudgetId::new(),
            NewBudget {
                name: "Bakery/January".to_string(),
                period_start: date(1, 1),
                period_end: date(1, 31),
                basis,
                allocations: vec![BudgetAllocation::new(MaterialCategory::Bakery, dec("500"))],
            },
        )
        .unwrap()
    }

    fn po_record(category: MaterialCategory, day: NaiveDate, amount: &str) -> SpendRecord {
        SpendRecord {
            source: SpendSource::PurchaseOrder(PurchaseOrderId::new()),
            material_id: MaterialId::new(),
            category,
            date: day,
            amount: dec(amount),
            guard: None,
        }
    }

    fn consumption_record(day: NaiveDate, amount: &str) -> SpendRecord {
        SpendRecord {
            source: SpendSource::Consumption(ConsumptionId::new()),
            material_id: MaterialId::new(),
            category: MaterialCategory::Bakery,
            date: day,
            amount: dec(amount),
            guard: None,
        }
    }

    #[test]
    fn fifty_of_five_hundred_is_ten_percent() {
        let budget = budget(SpendBasis::PurchaseOrders);
        let spending = calculate_spending(
            &budget,
            &[po_record(MaterialCategory::Bakery, date(1, 10), "50.00")],
        );
        assert_eq!(spending.total_spent, dec("50.00"));
        assert_eq!(spending.utilization_rate, dec("10"));
        assert_eq!(spending.remaining, dec("450.00"));
        assert_eq!(spending.by_category[0].utilization_rate, dec("10"));
        assert!(!spending.is_approximate());
    }

    #[test]
    fn out_of_period_and_other_basis_records_are_ignored() {
        let orders_only = budget(SpendBasis::PurchaseOrders);
        let spending = calculate_spending(
            &orders_only,
            &[
                po_record(MaterialCategory::Bakery, date(2, 1), "50.00"),
                consumption_record(date(1, 5), "20.00"),
            ],
        );
        assert_eq!(spending.total_spent, Decimal::ZERO);
        assert_eq!(spending.record_count, 0);

        let both = budget(SpendBasis::Both);
        let spending = calculate_spending(
            &both,
            &[
                po_record(MaterialCategory::Bakery, date(1, 31), "50.00"),
                consumption_record(date(1, 5), "20.00"),
            ],
        );
        assert_eq!(spending.total_spent, dec("70.00"));
    }

    #[test]
    fn unallocated_categories_are_reported_separately() {
        let budget = budget(SpendBasis::PurchaseOrders);
        let spending = calculate_spending(
            &budget,
            &[
                po_record(MaterialCategory::Bakery, date(1, 3), "10.00"),
                po_record(MaterialCategory::Cleaning, date(1, 3), "15.00"),
            ],
        );
        assert_eq!(spending.total_spent, dec("10.00"));
        assert_eq!(
            spending.unallocated,
            vec![UnallocatedSpend {
                category: MaterialCategory::Cleaning,
                amount: dec("15.00"),
            }]
        );
        assert_eq!(spending.unallocated_total(), dec("15.00"));
    }

    #[test]
    fn zero_budget_with_spend_is_guarded() {
        let rate = utilization(dec("10"), Decimal::ZERO);
        assert_eq!(*rate.value(), Decimal::ZERO);
        assert_eq!(rate.reason(), Some(GuardReason::ZeroBudget));
        assert!(!utilization(Decimal::ZERO, Decimal::ZERO).is_approximate());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn spent_plus_remaining_is_total(amounts in proptest::collection::vec(0u32..10_000, 0..20)) {
            let budget = budget(SpendBasis::PurchaseOrders);
            let records: Vec<SpendRecord> = amounts
                .iter()
                .map(|a| po_record(MaterialCategory::Bakery, date(1, 15), &a.to_string()))
                .collect();
            let spending = calculate_spending(&budget, &records);
            prop_assert_eq!(spending.total_spent + spending.remaining, spending.total_budget);
            prop_assert_eq!(spending.record_count, records.len());
        }
    }
}
