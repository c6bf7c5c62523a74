use chrono::NaiveDate;

use galley_budgeting::{
    calculate_spending, consumption_spend, purchase_order_spend, recommendations,
    variance_analysis, Budget, BudgetSpending, BudgetThresholds, Recommendation, SpendRecord,
    VarianceLine,
};
use galley_catalog::Catalog;
use galley_inventory::SectionStock;
use galley_purchasing::PurchaseOrder;

use crate::error::ServiceResult;
use crate::event_store::EventStore;
use crate::services::SharedCatalog;
use crate::unit_of_work::load_all;

/// Budget utilisation over committed purchase orders and section consumption.
#[derive(Clone)]
pub struct BudgetTracker<S> {
    store: S,
    catalog: SharedCatalog,
    thresholds: BudgetThresholds,
}

impl<S> BudgetTracker<S>
where
    S: EventStore,
{
    pub fn new(store: S, catalog: SharedCatalog, thresholds: BudgetThresholds) -> Self {
        Self {
            store,
            catalog,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &BudgetThresholds {
        &self.thresholds
    }

    #[tracing::instrument(skip_all, fields(budget = %budget.name))]
    pub fn calculate_spending(&self, budget: &Budget) -> ServiceResult<BudgetSpending> {
        let records = self.spend_records(budget)?;
        let spending = calculate_spending(budget, &records);
        if spending.is_approximate() {
            tracing::warn!(
                budget = %budget.name,
                approximations = ?spending.approximations,
                "budget spending uses substituted values"
            );
        }
        Ok(spending)
    }

    pub fn variance_analysis(&self, budget: &Budget) -> ServiceResult<Vec<VarianceLine>> {
        Ok(variance_analysis(&self.calculate_spending(budget)?))
    }

    pub fn recommendations(&self, budget: &Budget, today: NaiveDate) -> ServiceResult<Vec<Recommendation>> {
        let spending = self.calculate_spending(budget)?;
        Ok(recommendations(budget, &spending, &self.thresholds, today))
    }

    /// Every spend record the budget's basis counts, before period filtering.
    pub fn spend_records(&self, budget: &Budget) -> ServiceResult<Vec<SpendRecord>> {
        let mut records = Vec::new();

        if budget.basis.counts_purchases() {
            for order in load_all::<PurchaseOrder, _>(&self.store)? {
                records.extend(purchase_order_spend(&order, &*self.catalog)?);
            }
        }

        if budget.basis.counts_consumption() {
            for stock in load_all::<SectionStock, _>(&self.store)? {
                let Some(material_id) = stock.material_id() else {
                    continue;
                };
                let material = self.catalog.require_material(material_id)?;
                for consumption in stock.consumptions() {
                    records.push(consumption_spend(consumption, &material)?);
                }
            }
        }

        tracing::debug!(records = records.len(), "spend records collected");
        Ok(records)
    }
}

impl<S> std::fmt::Debug for BudgetTracker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetTracker")
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}
