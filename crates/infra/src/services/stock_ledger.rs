use chrono::Utc;
use rust_decimal::Decimal;

use galley_catalog::Catalog;
use galley_core::{DomainError, MaterialId};
use galley_events::EventEnvelope;
use galley_inventory::{
    LedgerCommand, LedgerEvent, MaterialLedger, RecordEntry, RecordMovement, StockEntry,
    StockLevel, StockMovement,
};

use crate::error::{ServiceError, ServiceResult};
use crate::event_store::EventStore;
use crate::services::{named, SharedCatalog, StockLevelCache};
use crate::unit_of_work::{load_aggregate, Transactor};

/// Central per-material ledger: receipts, movements and derived stock levels.
#[derive(Clone)]
pub struct StockLedger<S> {
    tx: Transactor<S>,
    catalog: SharedCatalog,
    levels: StockLevelCache,
}

impl<S> StockLedger<S>
where
    S: EventStore,
{
    pub fn new(tx: Transactor<S>, catalog: SharedCatalog, levels: StockLevelCache) -> Self {
        Self { tx, catalog, levels }
    }

    /// Record a receipt in the material's purchase unit.
    #[tracing::instrument(skip_all, fields(material_id = %cmd.material_id))]
    pub fn record_entry(&self, cmd: RecordEntry) -> ServiceResult<StockEntry> {
        let material = self.catalog.require_active_material(cmd.material_id)?;
        if cmd.unit != material.unit {
            return Err(DomainError::unit_mismatch(cmd.unit, material.unit).into());
        }

        let stream = MaterialLedger::stream_id(cmd.material_id);
        let command = LedgerCommand::RecordEntry(cmd);
        let (events, _) = self
            .tx
            .run("record_entry", |uow| uow.handle::<MaterialLedger>(stream, &command))?;
        self.levels.invalidate(&material.id);

        let entry = events
            .into_iter()
            .find_map(|e| match e {
                LedgerEvent::StockEntryRecorded(entry) => Some(entry),
                _ => None,
            })
            .ok_or_else(|| DomainError::invariant("entry command produced no entry"))?;
        tracing::info!(
            material = %material.name,
            quantity = %entry.quantity,
            total_cost = %entry.total_cost,
            "stock entry recorded"
        );
        Ok(entry)
    }

    /// Record a movement; reducing movements may not overdraw the ledger.
    #[tracing::instrument(skip_all, fields(material_id = %cmd.material_id, movement_type = %cmd.movement_type))]
    pub fn record_movement(&self, cmd: RecordMovement) -> ServiceResult<StockMovement> {
        let material = self.catalog.require_active_material(cmd.material_id)?;
        if cmd.unit != material.unit {
            return Err(DomainError::unit_mismatch(cmd.unit, material.unit).into());
        }

        let stream = MaterialLedger::stream_id(cmd.material_id);
        let command = LedgerCommand::RecordMovement(cmd);
        let (events, _) = self
            .tx
            .run("record_movement", |uow| uow.handle::<MaterialLedger>(stream, &command))
            .map_err(named(&*self.catalog))?;
        self.levels.invalidate(&material.id);

        let movement = events
            .into_iter()
            .find_map(|e| match e {
                LedgerEvent::StockMovementRecorded(m) => Some(m),
                _ => None,
            })
            .ok_or_else(|| DomainError::invariant("movement command produced no movement"))?;
        tracing::info!(material = %material.name, quantity = %movement.quantity, "stock movement recorded");
        Ok(movement)
    }

    /// Derived stock position, served from the TTL cache when fresh.
    pub fn stock_level(&self, material_id: MaterialId) -> ServiceResult<StockLevel> {
        if let Some(level) = self.levels.get(&material_id) {
            return Ok(level);
        }
        let ticket = self.levels.ticket();
        let material = self.catalog.require_material(material_id)?;
        let ledger = self.ledger(material_id)?;
        let level = StockLevel::derive(&material, &ledger, Utc::now())?;
        if !self.levels.insert_unless_invalidated(ticket, material_id, level.clone()) {
            tracing::debug!(%material_id, "stock level changed while loading, not cached");
        }
        Ok(level)
    }

    /// Stock levels of every active material, by name.
    pub fn stock_levels(&self) -> ServiceResult<Vec<StockLevel>> {
        self.catalog
            .materials()
            .into_iter()
            .filter(|m| m.active)
            .map(|m| self.stock_level(m.id))
            .collect()
    }

    pub fn entries(&self, material_id: MaterialId) -> ServiceResult<Vec<StockEntry>> {
        Ok(self.ledger(material_id)?.entries().to_vec())
    }

    pub fn movements(&self, material_id: MaterialId) -> ServiceResult<Vec<StockMovement>> {
        Ok(self.ledger(material_id)?.movements().to_vec())
    }

    /// Value of all available stock at current unit costs.
    pub fn inventory_value(&self) -> ServiceResult<Decimal> {
        self.stock_levels()?
            .iter()
            .try_fold(Decimal::ZERO, |total, l| total.checked_add(l.inventory_value))
            .ok_or_else(|| ServiceError::from(DomainError::validation("inventory value overflows")))
    }

    /// The material's ledger events with their stream metadata, oldest first.
    pub fn history(&self, material_id: MaterialId) -> ServiceResult<Vec<EventEnvelope<LedgerEvent>>> {
        self.tx
            .store()
            .load_stream(MaterialLedger::stream_id(material_id))?
            .iter()
            .map(|stored| {
                stored
                    .to_envelope()
                    .decode::<LedgerEvent>()
                    .map_err(|e| ServiceError::Deserialize(e.to_string()))
            })
            .collect()
    }

    pub(crate) fn ledger(&self, material_id: MaterialId) -> ServiceResult<MaterialLedger> {
        load_aggregate(self.tx.store(), MaterialLedger::stream_id(material_id))
    }

    pub(crate) fn invalidate(&self, material_id: MaterialId) {
        self.levels.invalidate(&material_id);
    }
}

impl<S> std::fmt::Debug for StockLedger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger").finish_non_exhaustive()
    }
}
