//! Budget tracking: period budgets allocated per material category, spend
//! aggregation from purchase orders and section consumption, variance and
//! recommendations.

pub mod analysis;
pub mod budget;
pub mod spend;

pub use analysis::{
    recommendations, variance_analysis, BudgetThresholds, Recommendation, RecommendationKind,
    Severity, VarianceLine,
};
pub use budget::{Budget, BudgetAllocation, NewBudget, SpendBasis};
pub use spend::{
    calculate_spending, consumption_spend, purchase_order_spend, utilization, BudgetSpending,
    CategorySpend, SpendRecord, SpendSource, UnallocatedSpend,
};
