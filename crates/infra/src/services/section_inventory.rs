use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_catalog::{Catalog, RawMaterial};
use galley_core::{
    ConsumptionId, DomainError, MaterialId, MovementId, RecipeId, SectionId, StockShortfall,
    UserId,
};
use galley_inventory::{
    AllocateStock, ConsumeStock, ConsumptionReason, LedgerCommand, MaterialLedger,
    MovementReference, MovementType, RecordMovement, ReleaseReservation, ReserveStock,
    SectionCommand, SectionConsumption, SectionEvent, SectionHolding, SectionStock,
    SetStockLevels,
};

use crate::error::{ServiceError, ServiceResult};
use crate::event_store::EventStore;
use crate::services::{named, SharedCatalog, StockLevelCache};
use crate::unit_of_work::{load_aggregate, load_all, Transactor};

/// A consumption from a section holding, in the material's storage unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConsumption {
    pub section_id: SectionId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub reason: ConsumptionReason,
    pub order_id: Option<String>,
    pub notes: Option<String>,
    pub consumed_by: UserId,
}

/// Per-section holdings: assignment from the central ledger, consumption,
/// reservations and levels.
#[derive(Clone)]
pub struct SectionInventoryManager<S> {
    tx: Transactor<S>,
    catalog: SharedCatalog,
    levels: StockLevelCache,
}

impl<S> SectionInventoryManager<S>
where
    S: EventStore,
{
    pub fn new(tx: Transactor<S>, catalog: SharedCatalog, levels: StockLevelCache) -> Self {
        Self { tx, catalog, levels }
    }

    /// Move `quantity` purchase units from the central ledger into a section.
    ///
    /// The ledger debit and the section credit commit together or not at all.
    #[tracing::instrument(skip_all, fields(%section_id, %material_id, %quantity))]
    pub fn assign_stock(
        &self,
        section_id: SectionId,
        material_id: MaterialId,
        quantity: Decimal,
        assigned_by: UserId,
    ) -> ServiceResult<SectionHolding> {
        let section = self.catalog.require_section(section_id)?;
        let material = self.catalog.require_active_material(material_id)?;
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation("assigned quantity must be positive").into());
        }
        let storage_quantity = material.to_storage_units(quantity, material.unit)?;

        let movement_id = MovementId::new();
        let now = Utc::now();
        let debit = LedgerCommand::RecordMovement(RecordMovement {
            movement_id,
            material_id,
            movement_type: MovementType::Out,
            quantity,
            unit: material.unit,
            reference: Some(MovementReference::Section(section_id)),
            reason: Some(format!("assigned to {}", section.name)),
            performed_by: assigned_by,
            occurred_at: now,
        });
        let credit = SectionCommand::Allocate(AllocateStock {
            section_id,
            material_id,
            quantity: storage_quantity,
            unit: material.storage_unit(),
            source_movement_id: movement_id,
            allocated_by: assigned_by,
            occurred_at: now,
        });

        let stream = SectionStock::stream_id(section_id, material_id);
        let (holding, _) = self
            .tx
            .run("assign_stock", |uow| {
                uow.handle::<MaterialLedger>(MaterialLedger::stream_id(material_id), &debit)?;
                uow.handle::<SectionStock>(stream, &credit)?;
                Ok(uow.load::<SectionStock>(stream)?.holding(&material))
            })
            .map_err(named(&*self.catalog))?;
        self.levels.invalidate(&material_id);

        tracing::info!(
            section = %section.name,
            material = %material.name,
            storage_quantity = %storage_quantity,
            unit = %material.storage_unit(),
            "stock assigned to section"
        );
        Ok(holding)
    }

    /// Consume from a holding; reserved stock cannot be consumed.
    #[tracing::instrument(skip_all, fields(section_id = %cmd.section_id, material_id = %cmd.material_id))]
    pub fn record_consumption(&self, cmd: RecordConsumption) -> ServiceResult<SectionConsumption> {
        self.catalog.require_section(cmd.section_id)?;
        let material = self.catalog.require_material(cmd.material_id)?;

        let stream = SectionStock::stream_id(cmd.section_id, cmd.material_id);
        let consume = SectionCommand::Consume(ConsumeStock {
            consumption_id: ConsumptionId::new(),
            section_id: cmd.section_id,
            material_id: cmd.material_id,
            quantity: cmd.quantity,
            unit: material.storage_unit(),
            reason: cmd.reason,
            order_id: cmd.order_id,
            notes: cmd.notes,
            consumed_by: cmd.consumed_by,
            occurred_at: Utc::now(),
        });
        let (events, _) = self
            .tx
            .run("record_consumption", |uow| uow.handle::<SectionStock>(stream, &consume))
            .map_err(named(&*self.catalog))?;

        let consumption = first_consumption(events)?;
        tracing::info!(
            material = %material.name,
            quantity = %consumption.quantity,
            reason = %consumption.reason,
            "section consumption recorded"
        );
        Ok(consumption)
    }

    /// Consume every ingredient of a recipe from one section.
    ///
    /// All-or-nothing: if any ingredient is short, nothing is consumed and the
    /// error lists every short ingredient. Ingredients repeating a material are
    /// consumed as one combined quantity.
    #[tracing::instrument(skip_all, fields(%section_id, %recipe_id))]
    pub fn record_recipe_consumption(
        &self,
        section_id: SectionId,
        recipe_id: RecipeId,
        consumed_by: UserId,
        order_id: Option<String>,
    ) -> ServiceResult<Vec<SectionConsumption>> {
        self.catalog.require_section(section_id)?;
        let recipe = self.catalog.require_recipe(recipe_id)?;
        if !recipe.active {
            return Err(DomainError::validation(format!("recipe {} is inactive", recipe.name)).into());
        }

        let mut demand: Vec<(RawMaterial, Decimal)> = Vec::new();
        for ingredient in &recipe.ingredients {
            let material = self.catalog.require_material(ingredient.material_id)?;
            let quantity = material.to_storage_units(ingredient.quantity, ingredient.unit)?;
            match demand.iter_mut().find(|(m, _)| m.id == material.id) {
                Some((_, total)) => *total += quantity,
                None => demand.push((material, quantity)),
            }
        }

        let reason = if order_id.is_some() {
            ConsumptionReason::Selling
        } else {
            ConsumptionReason::Production
        };
        let now = Utc::now();
        let notes = Some(format!("recipe: {}", recipe.name));

        let (consumptions, _) = self
            .tx
            .run("record_recipe_consumption", |uow| {
                let mut consumed = Vec::with_capacity(demand.len());
                let mut shortfalls: Vec<StockShortfall> = Vec::new();
                for (material, quantity) in &demand {
                    let consume = SectionCommand::Consume(ConsumeStock {
                        consumption_id: ConsumptionId::new(),
                        section_id,
                        material_id: material.id,
                        quantity: *quantity,
                        unit: material.storage_unit(),
                        reason,
                        order_id: order_id.clone(),
                        notes: notes.clone(),
                        consumed_by,
                        occurred_at: now,
                    });
                    let stream = SectionStock::stream_id(section_id, material.id);
                    match uow.handle::<SectionStock>(stream, &consume) {
                        Ok(events) => consumed.push(first_consumption(events)?),
                        Err(ServiceError::Domain(DomainError::InsufficientStock(shortfall))) => {
                            shortfalls.push(shortfall)
                        }
                        Err(err) => return Err(err),
                    }
                }
                if !shortfalls.is_empty() {
                    return Err(DomainError::AggregateInsufficientStock(shortfalls).into());
                }
                Ok(consumed)
            })
            .map_err(named(&*self.catalog))?;

        tracing::info!(
            recipe = %recipe.name,
            ingredients = consumptions.len(),
            "recipe consumption recorded"
        );
        Ok(consumptions)
    }

    #[tracing::instrument(skip_all, fields(%section_id, %material_id, %quantity))]
    pub fn reserve_stock(
        &self,
        section_id: SectionId,
        material_id: MaterialId,
        quantity: Decimal,
        reserved_by: UserId,
    ) -> ServiceResult<SectionHolding> {
        let command = SectionCommand::Reserve(ReserveStock {
            section_id,
            material_id,
            quantity,
            reserved_by,
            occurred_at: Utc::now(),
        });
        self.apply("reserve_stock", section_id, material_id, &command)
    }

    #[tracing::instrument(skip_all, fields(%section_id, %material_id, %quantity))]
    pub fn release_reservation(
        &self,
        section_id: SectionId,
        material_id: MaterialId,
        quantity: Decimal,
        released_by: UserId,
    ) -> ServiceResult<SectionHolding> {
        let command = SectionCommand::Release(ReleaseReservation {
            section_id,
            material_id,
            quantity,
            released_by,
            occurred_at: Utc::now(),
        });
        self.apply("release_reservation", section_id, material_id, &command)
    }

    #[tracing::instrument(skip_all, fields(%section_id, %material_id))]
    pub fn set_stock_levels(
        &self,
        section_id: SectionId,
        material_id: MaterialId,
        min_level: Decimal,
        max_level: Decimal,
        set_by: UserId,
    ) -> ServiceResult<SectionHolding> {
        let command = SectionCommand::SetLevels(SetStockLevels {
            section_id,
            material_id,
            min_level,
            max_level,
            set_by,
            occurred_at: Utc::now(),
        });
        self.apply("set_stock_levels", section_id, material_id, &command)
    }

    pub fn holding(&self, section_id: SectionId, material_id: MaterialId) -> ServiceResult<SectionHolding> {
        let material = self.catalog.require_material(material_id)?;
        let stock: SectionStock =
            load_aggregate(self.tx.store(), SectionStock::stream_id(section_id, material_id))?;
        Ok(stock.holding(&material))
    }

    /// Every holding of a section, by material name.
    pub fn section_inventory(&self, section_id: SectionId) -> ServiceResult<Vec<SectionHolding>> {
        let mut holdings = Vec::new();
        for stock in load_all::<SectionStock, _>(self.tx.store())? {
            if stock.section_id() != Some(section_id) {
                continue;
            }
            let Some(material_id) = stock.material_id() else {
                continue;
            };
            let material = self.catalog.require_material(material_id)?;
            holdings.push(stock.holding(&material));
        }
        holdings.sort_by(|a, b| a.material_name.cmp(&b.material_name));
        Ok(holdings)
    }

    pub fn consumption_history(
        &self,
        section_id: SectionId,
        material_id: MaterialId,
    ) -> ServiceResult<Vec<SectionConsumption>> {
        let stock: SectionStock =
            load_aggregate(self.tx.store(), SectionStock::stream_id(section_id, material_id))?;
        Ok(stock.consumptions().to_vec())
    }

    /// Holdings at or below their section minimum.
    pub fn low_stock_holdings(&self, section_id: SectionId) -> ServiceResult<Vec<SectionHolding>> {
        Ok(self
            .section_inventory(section_id)?
            .into_iter()
            .filter(|h| h.is_low_stock)
            .collect())
    }

    fn apply(
        &self,
        operation: &str,
        section_id: SectionId,
        material_id: MaterialId,
        command: &SectionCommand,
    ) -> ServiceResult<SectionHolding> {
        self.catalog.require_section(section_id)?;
        let material = self.catalog.require_material(material_id)?;
        let stream = SectionStock::stream_id(section_id, material_id);
        let (holding, _) = self
            .tx
            .run(operation, |uow| {
                uow.handle::<SectionStock>(stream, command)?;
                Ok(uow.load::<SectionStock>(stream)?.holding(&material))
            })
            .map_err(named(&*self.catalog))?;
        tracing::info!(operation, material = %material.name, "section holding updated");
        Ok(holding)
    }
}

fn first_consumption(events: Vec<SectionEvent>) -> ServiceResult<SectionConsumption> {
    events
        .into_iter()
        .find_map(|e| match e {
            SectionEvent::StockConsumed(c) => Some(c),
            _ => None,
        })
        .ok_or_else(|| DomainError::invariant("consume command produced no consumption").into())
}

impl<S> std::fmt::Debug for SectionInventoryManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionInventoryManager").finish_non_exhaustive()
    }
}
