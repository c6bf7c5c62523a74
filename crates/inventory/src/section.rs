use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_catalog::RawMaterial;
use galley_core::{
    Aggregate, AggregateId, AggregateRoot, ConsumptionId, DomainError, EventSourced, MaterialId,
    MovementId, SectionId, StockShortfall, UserId,
};
use galley_events::Event;
use galley_units::Unit;

/// Why stock left a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumptionReason {
    Selling,
    Production,
    Waste,
    Spoilage,
    StaffMeal,
    Testing,
    Other,
}

impl std::fmt::Display for ConsumptionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Selling => write!(f, "SELLING"),
            Self::Production => write!(f, "PRODUCTION"),
            Self::Waste => write!(f, "WASTE"),
            Self::Spoilage => write!(f, "SPOILAGE"),
            Self::StaffMeal => write!(f, "STAFF_MEAL"),
            Self::Testing => write!(f, "TESTING"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

impl std::str::FromStr for ConsumptionReason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "selling" | "sale" => Ok(Self::Selling),
            "production" => Ok(Self::Production),
            "waste" => Ok(Self::Waste),
            "spoilage" => Ok(Self::Spoilage),
            "staff_meal" => Ok(Self::StaffMeal),
            "testing" => Ok(Self::Testing),
            "other" => Ok(Self::Other),
            _ => Err(DomainError::validation(format!("unknown consumption reason: {s}"))),
        }
    }
}

/// Append-only record of stock used by a section, in storage units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionConsumption {
    pub consumption_id: ConsumptionId,
    pub section_id: SectionId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub unit: Unit,
    pub reason: ConsumptionReason,
    pub order_id: Option<String>,
    pub notes: Option<String>,
    pub consumed_by: UserId,
    pub consumed_at: DateTime<Utc>,
}

/// Aggregate root: one material held by one section.
///
/// Quantities are always in the material's storage unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionStock {
    id: AggregateId,
    section_id: Option<SectionId>,
    material_id: Option<MaterialId>,
    unit: Option<Unit>,
    quantity: Decimal,
    reserved_quantity: Decimal,
    min_level: Option<Decimal>,
    max_level: Option<Decimal>,
    last_allocated_at: Option<DateTime<Utc>>,
    consumptions: Vec<SectionConsumption>,
    version: u64,
}

impl SectionStock {
    /// Deterministic stream id of the holding for `(section, material)`.
    pub fn stream_id(section_id: SectionId, material_id: MaterialId) -> AggregateId {
        AggregateId::derived(
            "inventory.section_stock",
            &[section_id.as_uuid(), material_id.as_uuid()],
        )
    }

    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            section_id: None,
            material_id: None,
            unit: None,
            quantity: Decimal::ZERO,
            reserved_quantity: Decimal::ZERO,
            min_level: None,
            max_level: None,
            last_allocated_at: None,
            consumptions: Vec::new(),
            version: 0,
        }
    }

    pub fn section_id(&self) -> Option<SectionId> {
        self.section_id
    }

    pub fn material_id(&self) -> Option<MaterialId> {
        self.material_id
    }

    pub fn unit(&self) -> Option<Unit> {
        self.unit
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn reserved_quantity(&self) -> Decimal {
        self.reserved_quantity
    }

    /// Quantity that can be consumed or reserved.
    pub fn unreserved_quantity(&self) -> Decimal {
        self.quantity - self.reserved_quantity
    }

    pub fn consumptions(&self) -> &[SectionConsumption] {
        &self.consumptions
    }

    /// Whether anything was ever recorded against this holding.
    pub fn exists(&self) -> bool {
        self.version > 0
    }

    /// Display view of this holding; pack quantity is derived, never stored.
    pub fn holding(&self, material: &RawMaterial) -> SectionHolding {
        let pack_quantity = material
            .pack_info()
            .and_then(|p| self.quantity.checked_div(p.units_per_pack));
        SectionHolding {
            section_id: self.section_id,
            material_id: material.id,
            material_name: material.name.clone(),
            unit: self.unit.unwrap_or_else(|| material.storage_unit()),
            quantity: self.quantity,
            reserved_quantity: self.reserved_quantity,
            available_quantity: self.unreserved_quantity(),
            pack_quantity,
            min_level: self.min_level,
            max_level: self.max_level,
            is_low_stock: self.min_level.is_some_and(|min| self.quantity <= min),
            last_allocated_at: self.last_allocated_at,
            version: self.version,
        }
    }
}

/// Read view of a section holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionHolding {
    pub section_id: Option<SectionId>,
    pub material_id: MaterialId,
    pub material_name: String,
    pub unit: Unit,
    pub quantity: Decimal,
    pub reserved_quantity: Decimal,
    pub available_quantity: Decimal,
    /// `quantity / units_per_pack` for pack materials.
    pub pack_quantity: Option<Decimal>,
    pub min_level: Option<Decimal>,
    pub max_level: Option<Decimal>,
    pub is_low_stock: bool,
    pub last_allocated_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl AggregateRoot for SectionStock {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AllocateStock (stock moved from the central ledger into the section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateStock {
    pub section_id: SectionId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub unit: Unit,
    /// Ledger movement that debited the central stock.
    pub source_movement_id: MovementId,
    pub allocated_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConsumeStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeStock {
    pub consumption_id: ConsumptionId,
    pub section_id: SectionId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub unit: Unit,
    pub reason: ConsumptionReason,
    pub order_id: Option<String>,
    pub notes: Option<String>,
    pub consumed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub section_id: SectionId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub reserved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseReservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReservation {
    pub section_id: SectionId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub released_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetStockLevels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStockLevels {
    pub section_id: SectionId,
    pub material_id: MaterialId,
    pub min_level: Decimal,
    pub max_level: Decimal,
    pub set_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionCommand {
    Allocate(AllocateStock),
    Consume(ConsumeStock),
    Reserve(ReserveStock),
    Release(ReleaseReservation),
    SetLevels(SetStockLevels),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAllocated {
    pub section_id: SectionId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub unit: Unit,
    pub source_movement_id: MovementId,
    pub allocated_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub section_id: SectionId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub reserved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReleased {
    pub section_id: SectionId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub released_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevelsSet {
    pub section_id: SectionId,
    pub material_id: MaterialId,
    pub min_level: Decimal,
    pub max_level: Decimal,
    pub set_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionEvent {
    StockAllocated(StockAllocated),
    StockConsumed(SectionConsumption),
    StockReserved(StockReserved),
    ReservationReleased(ReservationReleased),
    StockLevelsSet(StockLevelsSet),
}

impl Event for SectionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SectionEvent::StockAllocated(_) => "inventory.section.stock_allocated",
            SectionEvent::StockConsumed(_) => "inventory.section.stock_consumed",
            SectionEvent::StockReserved(_) => "inventory.section.stock_reserved",
            SectionEvent::ReservationReleased(_) => "inventory.section.reservation_released",
            SectionEvent::StockLevelsSet(_) => "inventory.section.levels_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SectionEvent::StockAllocated(e) => e.occurred_at,
            SectionEvent::StockConsumed(e) => e.consumed_at,
            SectionEvent::StockReserved(e) => e.occurred_at,
            SectionEvent::ReservationReleased(e) => e.occurred_at,
            SectionEvent::StockLevelsSet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SectionStock {
    type Command = SectionCommand;
    type Event = SectionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SectionEvent::StockAllocated(e) => {
                self.bind(e.section_id, e.material_id);
                self.unit.get_or_insert(e.unit);
                self.quantity += e.quantity;
                self.last_allocated_at = Some(e.occurred_at);
            }
            SectionEvent::StockConsumed(c) => {
                self.bind(c.section_id, c.material_id);
                self.unit.get_or_insert(c.unit);
                self.quantity -= c.quantity;
                self.consumptions.push(c.clone());
            }
            SectionEvent::StockReserved(e) => {
                self.bind(e.section_id, e.material_id);
                self.reserved_quantity += e.quantity;
            }
            SectionEvent::ReservationReleased(e) => {
                self.bind(e.section_id, e.material_id);
                self.reserved_quantity -= e.quantity;
            }
            SectionEvent::StockLevelsSet(e) => {
                self.bind(e.section_id, e.material_id);
                self.min_level = Some(e.min_level);
                self.max_level = Some(e.max_level);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SectionCommand::Allocate(cmd) => self.handle_allocate(cmd),
            SectionCommand::Consume(cmd) => self.handle_consume(cmd),
            SectionCommand::Reserve(cmd) => self.handle_reserve(cmd),
            SectionCommand::Release(cmd) => self.handle_release(cmd),
            SectionCommand::SetLevels(cmd) => self.handle_set_levels(cmd),
        }
    }
}

impl EventSourced for SectionStock {
    const AGGREGATE_TYPE: &'static str = "inventory.section_stock";

    fn empty(stream_id: AggregateId) -> Self {
        SectionStock::empty(stream_id)
    }
}

impl SectionStock {
    fn bind(&mut self, section_id: SectionId, material_id: MaterialId) {
        self.section_id.get_or_insert(section_id);
        self.material_id.get_or_insert(material_id);
    }

    fn ensure_key(&self, section_id: SectionId, material_id: MaterialId) -> Result<(), DomainError> {
        if self.id != Self::stream_id(section_id, material_id) {
            return Err(DomainError::invariant("section holding key mismatch"));
        }
        Ok(())
    }

    fn ensure_unit(&self, unit: Unit) -> Result<(), DomainError> {
        match self.unit {
            Some(existing) if existing != unit => Err(DomainError::unit_mismatch(unit, existing)),
            _ => Ok(()),
        }
    }

    fn ensure_positive(quantity: Decimal, what: &str) -> Result<(), DomainError> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!("{what} quantity must be positive")));
        }
        Ok(())
    }

    fn shortfall(&self, material_id: MaterialId, requested: Decimal, unit: Option<Unit>) -> DomainError {
        DomainError::InsufficientStock(StockShortfall {
            material_id,
            material_name: None,
            requested,
            available: self.unreserved_quantity(),
            unit: unit.or(self.unit).map(|u| u.to_string()).unwrap_or_default(),
        })
    }

    fn handle_allocate(&self, cmd: &AllocateStock) -> Result<Vec<SectionEvent>, DomainError> {
        self.ensure_key(cmd.section_id, cmd.material_id)?;
        self.ensure_unit(cmd.unit)?;
        Self::ensure_positive(cmd.quantity, "allocation")?;

        Ok(vec![SectionEvent::StockAllocated(StockAllocated {
            section_id: cmd.section_id,
            material_id: cmd.material_id,
            quantity: cmd.quantity,
            unit: cmd.unit,
            source_movement_id: cmd.source_movement_id,
            allocated_by: cmd.allocated_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_consume(&self, cmd: &ConsumeStock) -> Result<Vec<SectionEvent>, DomainError> {
        self.ensure_key(cmd.section_id, cmd.material_id)?;
        self.ensure_unit(cmd.unit)?;
        Self::ensure_positive(cmd.quantity, "consumption")?;

        // Reserved stock stays put, so quantity never drops below the reservation.
        if cmd.quantity > self.unreserved_quantity() {
            return Err(self.shortfall(cmd.material_id, cmd.quantity, Some(cmd.unit)));
        }

        Ok(vec![SectionEvent::StockConsumed(SectionConsumption {
            consumption_id: cmd.consumption_id,
            section_id: cmd.section_id,
            material_id: cmd.material_id,
            quantity: cmd.quantity,
            unit: cmd.unit,
            reason: cmd.reason,
            order_id: cmd.order_id.clone(),
            notes: cmd.notes.clone(),
            consumed_by: cmd.consumed_by,
            consumed_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<SectionEvent>, DomainError> {
        self.ensure_key(cmd.section_id, cmd.material_id)?;
        Self::ensure_positive(cmd.quantity, "reservation")?;

        if cmd.quantity > self.unreserved_quantity() {
            return Err(self.shortfall(cmd.material_id, cmd.quantity, None));
        }

        Ok(vec![SectionEvent::StockReserved(StockReserved {
            section_id: cmd.section_id,
            material_id: cmd.material_id,
            quantity: cmd.quantity,
            reserved_by: cmd.reserved_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseReservation) -> Result<Vec<SectionEvent>, DomainError> {
        self.ensure_key(cmd.section_id, cmd.material_id)?;
        Self::ensure_positive(cmd.quantity, "release")?;

        if cmd.quantity > self.reserved_quantity {
            return Err(DomainError::validation(format!(
                "cannot release {} when only {} is reserved",
                cmd.quantity, self.reserved_quantity
            )));
        }

        Ok(vec![SectionEvent::ReservationReleased(ReservationReleased {
            section_id: cmd.section_id,
            material_id: cmd.material_id,
            quantity: cmd.quantity,
            released_by: cmd.released_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_levels(&self, cmd: &SetStockLevels) -> Result<Vec<SectionEvent>, DomainError> {
        self.ensure_key(cmd.section_id, cmd.material_id)?;

        if cmd.min_level < Decimal::ZERO {
            return Err(DomainError::validation("minimum level cannot be negative"));
        }
        if cmd.max_level < cmd.min_level {
            return Err(DomainError::validation(
                "maximum level cannot be below minimum level",
            ));
        }

        Ok(vec![SectionEvent::StockLevelsSet(StockLevelsSet {
            section_id: cmd.section_id,
            material_id: cmd.material_id,
            min_level: cmd.min_level,
            max_level: cmd.max_level,
            set_by: cmd.set_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}
