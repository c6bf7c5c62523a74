//! Engine configuration.
//!
//! Loaded in layers: compiled defaults, then an optional TOML file, then
//! `GALLEY__`-prefixed environment variables (`GALLEY__CACHE__STOCK_LEVEL_TTL_MS=0`).

use std::path::Path;
use std::time::Duration;

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

use galley_budgeting::BudgetThresholds;
use galley_observability::LoggingConfig;

use crate::read_model::DEFAULT_MAX_CAPACITY;

/// Default location of the optional configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "config/galley.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct GalleyConfig {
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub transactions: TransactionConfig,
    pub budget: BudgetConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Zero disables the stock level cache.
    pub stock_level_ttl_ms: u64,
    pub recipe_cost_ttl_ms: u64,
    /// Upper bound on entries held by each cache.
    pub max_entries: u64,
}

impl CacheConfig {
    pub fn stock_level_ttl(&self) -> Duration {
        Duration::from_millis(self.stock_level_ttl_ms)
    }

    pub fn recipe_cost_ttl(&self) -> Duration {
        Duration::from_millis(self.recipe_cost_ttl_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConfig {
    /// Extra attempts after a version conflict before giving up.
    pub max_conflict_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetConfig {
    pub near_limit_pct: Decimal,
    pub underutilized_pct: Decimal,
    pub late_period_pct: Decimal,
}

impl BudgetConfig {
    pub fn thresholds(&self) -> BudgetThresholds {
        BudgetThresholds {
            near_limit_pct: self.near_limit_pct,
            underutilized_pct: self.underutilized_pct,
            late_period_pct: self.late_period_pct,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL; the in-memory store is used when unset.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl GalleyConfig {
    /// Load from `config/galley.toml` (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from the given file (if present) and the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("GALLEY").separator("__"))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("logging.filter", "info")?
            .set_default("logging.format", "json")?
            .set_default("cache.stock_level_ttl_ms", 30_000)?
            .set_default("cache.recipe_cost_ttl_ms", 60_000)?
            .set_default("cache.max_entries", DEFAULT_MAX_CAPACITY)?
            .set_default("transactions.max_conflict_retries", 5)?
            .set_default("budget.near_limit_pct", "90")?
            .set_default("budget.underutilized_pct", "50")?
            .set_default("budget.late_period_pct", "75")?
            .set_default("database.max_connections", 10)
    }
}

impl Default for GalleyConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            cache: CacheConfig {
                stock_level_ttl_ms: 30_000,
                recipe_cost_ttl_ms: 60_000,
                max_entries: DEFAULT_MAX_CAPACITY,
            },
            transactions: TransactionConfig {
                max_conflict_retries: 5,
            },
            budget: BudgetConfig {
                near_limit_pct: Decimal::from(90),
                underutilized_pct: Decimal::from(50),
                late_period_pct: Decimal::from(75),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
            },
        }
    }
}
