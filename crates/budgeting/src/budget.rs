use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_catalog::MaterialCategory;
use galley_core::{BudgetId, DomainError, DomainResult, Entity};

/// Which kind of spend counts against a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpendBasis {
    PurchaseOrders,
    Consumption,
    Both,
}

impl SpendBasis {
    pub fn counts_purchases(self) -> bool {
        matches!(self, Self::PurchaseOrders | Self::Both)
    }

    pub fn counts_consumption(self) -> bool {
        matches!(self, Self::Consumption | Self::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub category: MaterialCategory,
    pub allocated: Decimal,
    pub notes: Option<String>,
}

impl BudgetAllocation {
    pub fn new(category: MaterialCategory, allocated: Decimal) -> Self {
        Self {
            category,
            allocated,
            notes: None,
        }
    }
}

/// Input for [`Budget::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBudget {
    pub name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub basis: SpendBasis,
    pub allocations: Vec<BudgetAllocation>,
}

/// A spending budget over an inclusive date period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub basis: SpendBasis,
    pub allocations: Vec<BudgetAllocation>,
    pub active: bool,
}

impl Budget {
    pub fn new(id: BudgetId, draft: NewBudget) -> DomainResult<Self> {
        let budget = Self {
            id,
            name: draft.name.trim().to_string(),
            period_start: draft.period_start,
            period_end: draft.period_end,
            basis: draft.basis,
            allocations: draft.allocations,
            active: true,
        };
        budget.validate()?;
        Ok(budget)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.is_empty() {
            return Err(DomainError::validation("budget name cannot be empty"));
        }
        if self.period_end < self.period_start {
            return Err(DomainError::validation(
                "budget period end cannot be before its start",
            ));
        }
        for (idx, allocation) in self.allocations.iter().enumerate() {
            if allocation.allocated < Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "allocation for {} cannot be negative",
                    allocation.category
                )));
            }
            if self.allocations[..idx]
                .iter()
                .any(|a| a.category == allocation.category)
            {
                return Err(DomainError::validation(format!(
                    "duplicate allocation for {}",
                    allocation.category
                )));
            }
        }
        Ok(())
    }

    /// `Σ allocated`.
    pub fn total_budget(&self) -> Decimal {
        self.allocations.iter().map(|a| a.allocated).sum()
    }

    pub fn allocation(&self, category: MaterialCategory) -> Option<&BudgetAllocation> {
        self.allocations.iter().find(|a| a.category == category)
    }

    /// Both ends inclusive.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.period_start <= date && date <= self.period_end
    }

    /// Share of the period elapsed at `today`, as a percentage in `[0, 100]`.
    pub fn elapsed_pct(&self, today: NaiveDate) -> Decimal {
        if today < self.period_start {
            return Decimal::ZERO;
        }
        if today >= self.period_end {
            return Decimal::ONE_HUNDRED;
        }
        let total_days = (self.period_end - self.period_start).num_days() + 1;
        let elapsed_days = (today - self.period_start).num_days() + 1;
        Decimal::from(elapsed_days) * Decimal::ONE_HUNDRED / Decimal::from(total_days)
    }
}

impl Entity for Budget {
    type Id = BudgetId;

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
