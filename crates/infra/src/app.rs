//! Engine wiring: one event store, one catalog, every service over them.

use std::sync::Arc;

use anyhow::Context;

use galley_catalog::Catalog;

use crate::config::GalleyConfig;
use crate::event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use crate::read_model::TtlCache;
use crate::services::{
    BudgetTracker, PurchaseOrderWorkflow, RecipeCosting, SectionInventoryManager, SharedCatalog,
    StockLedger,
};
use crate::unit_of_work::Transactor;

pub type SharedStore = Arc<dyn EventStore>;

#[derive(Clone)]
pub struct InventoryEngine {
    config: GalleyConfig,
    store: SharedStore,
    catalog: SharedCatalog,
    ledger: StockLedger<SharedStore>,
    sections: SectionInventoryManager<SharedStore>,
    recipes: RecipeCosting,
    purchase_orders: PurchaseOrderWorkflow<SharedStore>,
    budgets: BudgetTracker<SharedStore>,
}

impl InventoryEngine {
    pub fn new(store: SharedStore, catalog: SharedCatalog, config: GalleyConfig) -> Self {
        let tx = Transactor::new(store.clone(), config.transactions.max_conflict_retries);
        let levels = Arc::new(TtlCache::with_capacity(
            config.cache.stock_level_ttl(),
            config.cache.max_entries,
        ));

        let ledger = StockLedger::new(tx.clone(), catalog.clone(), levels.clone());
        let sections = SectionInventoryManager::new(tx.clone(), catalog.clone(), levels);
        let recipes = RecipeCosting::with_capacity(
            catalog.clone(),
            config.cache.recipe_cost_ttl(),
            config.cache.max_entries,
        );
        let purchase_orders = PurchaseOrderWorkflow::new(tx, catalog.clone(), ledger.clone());
        let budgets = BudgetTracker::new(store.clone(), catalog.clone(), config.budget.thresholds());

        Self {
            config,
            store,
            catalog,
            ledger,
            sections,
            recipes,
            purchase_orders,
            budgets,
        }
    }

    /// Engine over a fresh in-memory store.
    pub fn in_memory(catalog: SharedCatalog, config: GalleyConfig) -> Self {
        Self::new(Arc::new(InMemoryEventStore::new()), catalog, config)
    }

    /// Engine over Postgres when `database.url` is set, in-memory otherwise.
    ///
    /// Must be called inside a multi-threaded tokio runtime when Postgres is used.
    pub async fn connect(catalog: SharedCatalog, config: GalleyConfig) -> anyhow::Result<Self> {
        let Some(url) = config.database.url.clone() else {
            tracing::info!("no database configured, using the in-memory event store");
            return Ok(Self::in_memory(catalog, config));
        };

        let store = PostgresEventStore::connect(&url, config.database.max_connections)
            .await
            .context("failed to connect the postgres event store")?;
        tracing::info!(
            max_connections = config.database.max_connections,
            "postgres event store ready"
        );
        Ok(Self::new(Arc::new(store), catalog, config))
    }

    pub fn config(&self) -> &GalleyConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn catalog(&self) -> &dyn Catalog {
        &*self.catalog
    }

    pub fn ledger(&self) -> &StockLedger<SharedStore> {
        &self.ledger
    }

    pub fn sections(&self) -> &SectionInventoryManager<SharedStore> {
        &self.sections
    }

    pub fn recipes(&self) -> &RecipeCosting {
        &self.recipes
    }

    pub fn purchase_orders(&self) -> &PurchaseOrderWorkflow<SharedStore> {
        &self.purchase_orders
    }

    pub fn budgets(&self) -> &BudgetTracker<SharedStore> {
        &self.budgets
    }
}

impl std::fmt::Debug for InventoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
