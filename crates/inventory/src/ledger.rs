use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, EntryId, EventSourced, MaterialId,
    MovementId, PurchaseOrderId, StockShortfall, SupplierId, UserId,
};
use galley_events::Event;
use galley_units::Unit;

use crate::movement::{MovementReference, MovementType};

/// An immutable stock receipt, in the material's purchase unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub entry_id: EntryId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub unit: Unit,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub supplier_id: Option<SupplierId>,
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub production_date: Option<NaiveDate>,
    pub received_by: UserId,
    pub received_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// An append-only ledger movement, in the material's purchase unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub movement_id: MovementId,
    pub material_id: MaterialId,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit: Unit,
    pub reference: Option<MovementReference>,
    pub reason: Option<String>,
    pub performed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregate root: the stock ledger of one material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialLedger {
    id: MaterialId,
    unit: Option<Unit>,
    entries: Vec<StockEntry>,
    movements: Vec<StockMovement>,
    total_received: Decimal,
    total_increased: Decimal,
    total_reduced: Decimal,
    version: u64,
}

impl MaterialLedger {
    /// Create an empty ledger for rehydration.
    pub fn empty(id: MaterialId) -> Self {
        Self {
            id,
            unit: None,
            entries: Vec::new(),
            movements: Vec::new(),
            total_received: Decimal::ZERO,
            total_increased: Decimal::ZERO,
            total_reduced: Decimal::ZERO,
            version: 0,
        }
    }

    pub fn stream_id(material_id: MaterialId) -> AggregateId {
        AggregateId::from(material_id)
    }

    pub fn material_id(&self) -> MaterialId {
        self.id
    }

    /// Unit every quantity on this ledger is expressed in (set by the first event).
    pub fn unit(&self) -> Option<Unit> {
        self.unit
    }

    pub fn entries(&self) -> &[StockEntry] {
        &self.entries
    }

    pub fn movements(&self) -> &[StockMovement] {
        &self.movements
    }

    pub fn total_received(&self) -> Decimal {
        self.total_received
    }

    pub fn total_increased(&self) -> Decimal {
        self.total_increased
    }

    pub fn total_reduced(&self) -> Decimal {
        self.total_reduced
    }

    /// `received + increased - reduced`; never negative for an accepted history.
    pub fn available(&self) -> Decimal {
        self.total_received + self.total_increased - self.total_reduced
    }
}

impl AggregateRoot for MaterialLedger {
    type Id = MaterialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub entry_id: EntryId,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub unit: Unit,
    pub unit_cost: Decimal,
    pub supplier_id: Option<SupplierId>,
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub production_date: Option<NaiveDate>,
    pub received_by: UserId,
    pub received_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Command: RecordMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub movement_id: MovementId,
    pub material_id: MaterialId,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit: Unit,
    pub reference: Option<MovementReference>,
    pub reason: Option<String>,
    pub performed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    RecordEntry(RecordEntry),
    RecordMovement(RecordMovement),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    StockEntryRecorded(StockEntry),
    StockMovementRecorded(StockMovement),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::StockEntryRecorded(_) => "inventory.ledger.entry_recorded",
            LedgerEvent::StockMovementRecorded(_) => "inventory.ledger.movement_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::StockEntryRecorded(e) => e.received_at,
            LedgerEvent::StockMovementRecorded(m) => m.occurred_at,
        }
    }
}

impl Aggregate for MaterialLedger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::StockEntryRecorded(e) => {
                self.unit.get_or_insert(e.unit);
                self.total_received += e.quantity;
                self.entries.push(e.clone());
            }
            LedgerEvent::StockMovementRecorded(m) => {
                self.unit.get_or_insert(m.unit);
                let delta = m.movement_type.signed_delta(m.quantity);
                if delta < Decimal::ZERO {
                    self.total_reduced -= delta;
                } else {
                    self.total_increased += delta;
                }
                self.movements.push(m.clone());
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::RecordEntry(cmd) => self.handle_entry(cmd),
            LedgerCommand::RecordMovement(cmd) => self.handle_movement(cmd),
        }
    }
}

impl EventSourced for MaterialLedger {
    const AGGREGATE_TYPE: &'static str = "inventory.material_ledger";

    fn empty(stream_id: AggregateId) -> Self {
        MaterialLedger::empty(MaterialId::from_uuid(*stream_id.as_uuid()))
    }
}

impl MaterialLedger {
    fn ensure_material(&self, material_id: MaterialId) -> Result<(), DomainError> {
        if self.id != material_id {
            return Err(DomainError::invariant("material_id mismatch"));
        }
        Ok(())
    }

    fn ensure_unit(&self, unit: Unit) -> Result<(), DomainError> {
        match self.unit {
            Some(existing) if existing != unit => Err(DomainError::unit_mismatch(unit, existing)),
            _ => Ok(()),
        }
    }

    fn handle_entry(&self, cmd: &RecordEntry) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_material(cmd.material_id)?;
        self.ensure_unit(cmd.unit)?;

        if cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("entry quantity must be positive"));
        }
        if cmd.unit_cost < Decimal::ZERO {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }
        let total_cost = cmd
            .quantity
            .checked_mul(cmd.unit_cost)
            .ok_or_else(|| DomainError::validation("entry total cost overflows"))?;

        Ok(vec![LedgerEvent::StockEntryRecorded(StockEntry {
            entry_id: cmd.entry_id,
            material_id: cmd.material_id,
            quantity: cmd.quantity,
            unit: cmd.unit,
            unit_cost: cmd.unit_cost,
            total_cost,
            supplier_id: cmd.supplier_id,
            purchase_order_id: cmd.purchase_order_id,
            batch_number: cmd.batch_number.clone(),
            expiry_date: cmd.expiry_date,
            production_date: cmd.production_date,
            received_by: cmd.received_by,
            received_at: cmd.received_at,
            notes: cmd.notes.clone(),
        })])
    }

    fn handle_movement(&self, cmd: &RecordMovement) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_material(cmd.material_id)?;
        self.ensure_unit(cmd.unit)?;

        if cmd.quantity.is_zero() {
            return Err(DomainError::validation("movement quantity cannot be zero"));
        }
        if cmd.movement_type != MovementType::Adjustment && cmd.quantity < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "{} quantity must be positive",
                cmd.movement_type
            )));
        }

        if cmd.movement_type.is_reducing(cmd.quantity) {
            let requested = cmd.quantity.abs();
            let available = self.available();
            if requested > available {
                return Err(DomainError::InsufficientStock(StockShortfall {
                    material_id: cmd.material_id,
                    material_name: None,
                    requested,
                    available,
                    unit: cmd.unit.to_string(),
                }));
            }
        }

        Ok(vec![LedgerEvent::StockMovementRecorded(StockMovement {
            movement_id: cmd.movement_id,
            material_id: cmd.material_id,
            movement_type: cmd.movement_type,
            quantity: cmd.quantity,
            unit: cmd.unit,
            reference: cmd.reference.clone(),
            reason: cmd.reason.clone(),
            performed_by: cmd.performed_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn entry(material_id: MaterialId, quantity: Decimal) -> LedgerCommand {
        LedgerCommand::RecordEntry(RecordEntry {
            entry_id: EntryId::new(),
            material_id,
            quantity,
            unit: Unit::Packs,
            unit_cost: dec("10.00"),
            supplier_id: None,
            purchase_order_id: None,
            batch_number: Some("B-1".to_string()),
            expiry_date: None,
            production_date: None,
            received_by: UserId::new(),
            received_at: test_time(),
            notes: None,
        })
    }

    fn movement(material_id: MaterialId, movement_type: MovementType, quantity: Decimal) -> LedgerCommand {
        LedgerCommand::RecordMovement(RecordMovement {
            movement_id: MovementId::new(),
            material_id,
            movement_type,
            quantity,
            unit: Unit::Packs,
            reference: None,
            reason: None,
            performed_by: UserId::new(),
            occurred_at: test_time(),
        })
    }

    fn execute(ledger: &mut MaterialLedger, cmd: LedgerCommand) -> Result<(), DomainError> {
        let events = ledger.handle(&cmd)?;
        for e in &events {
            ledger.apply(e);
        }
        Ok(())
    }

    #[test]
    fn entry_records_total_cost_and_raises_availability() {
        let material = MaterialId::new();
        let ledger = MaterialLedger::empty(material);

        let events = ledger.handle(&entry(material, dec("5"))).unwrap();
        match &events[0] {
            LedgerEvent::StockEntryRecorded(e) => {
                assert_eq!(e.total_cost, dec("50.00"));
                assert_eq!(e.material_id, material);
            }
            _ => panic!("Expected StockEntryRecorded event"),
        }

        let mut ledger = ledger;
        ledger.apply(&events[0]);
        assert_eq!(ledger.available(), dec("5"));
        assert_eq!(ledger.version(), 1);
    }

    #[test]
    fn entry_rejects_non_positive_quantity_and_negative_cost() {
        let material = MaterialId::new();
        let ledger = MaterialLedger::empty(material);

        let err = ledger.handle(&entry(material, Decimal::ZERO)).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("positive") => {}
            _ => panic!("Expected Validation error for zero quantity"),
        }

        let mut cmd = entry(material, dec("1"));
        if let LedgerCommand::RecordEntry(e) = &mut cmd {
            e.unit_cost = dec("-1");
        }
        assert!(matches!(
            ledger.handle(&cmd),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn overdraw_fails_with_shortfall_and_changes_nothing() {
        let material = MaterialId::new();
        let mut ledger = MaterialLedger::empty(material);
        execute(&mut ledger, entry(material, dec("3"))).unwrap();

        let before = ledger.clone();
        let err = execute(&mut ledger, movement(material, MovementType::Out, dec("4"))).unwrap_err();
        match err {
            DomainError::InsufficientStock(s) => {
                assert_eq!(s.requested, dec("4"));
                assert_eq!(s.available, dec("3"));
                assert_eq!(s.unit, "PACKS");
            }
            _ => panic!("Expected InsufficientStock"),
        }
        assert_eq!(ledger, before);
    }

    #[test]
    fn adjustments_are_signed_and_non_zero() {
        let material = MaterialId::new();
        let mut ledger = MaterialLedger::empty(material);
        execute(&mut ledger, entry(material, dec("2"))).unwrap();

        execute(&mut ledger, movement(material, MovementType::Adjustment, dec("1.5"))).unwrap();
        execute(&mut ledger, movement(material, MovementType::Adjustment, dec("-0.5"))).unwrap();
        assert_eq!(ledger.available(), dec("3"));
        assert_eq!(ledger.total_increased(), dec("1.5"));
        assert_eq!(ledger.total_reduced(), dec("0.5"));

        assert!(matches!(
            execute(&mut ledger, movement(material, MovementType::Adjustment, Decimal::ZERO)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            execute(&mut ledger, movement(material, MovementType::Adjustment, dec("-4"))),
            Err(DomainError::InsufficientStock(_))
        ));
    }

    #[test]
    fn negative_quantities_only_for_adjustments() {
        let material = MaterialId::new();
        let ledger = MaterialLedger::empty(material);
        let err = ledger
            .handle(&movement(material, MovementType::In, dec("-1")))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("IN quantity") => {}
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn ledger_keeps_a_single_unit() {
        let material = MaterialId::new();
        let mut ledger = MaterialLedger::empty(material);
        execute(&mut ledger, entry(material, dec("1"))).unwrap();

        let mut cmd = movement(material, MovementType::Out, dec("1"));
        if let LedgerCommand::RecordMovement(m) = &mut cmd {
            m.unit = Unit::Grams;
        }
        assert!(matches!(
            ledger.handle(&cmd),
            Err(DomainError::UnitMismatch { .. })
        ));
    }

    #[test]
    fn commands_for_another_material_are_rejected() {
        let ledger = MaterialLedger::empty(MaterialId::new());
        let err = ledger.handle(&entry(MaterialId::new(), dec("1"))).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("material_id mismatch") => {}
            _ => panic!("Expected InvariantViolation"),
        }
    }

    #[test]
    fn rehydrate_from_stream_id_matches_material() {
        let material = MaterialId::new();
        let events = MaterialLedger::empty(material)
            .handle(&entry(material, dec("7")))
            .unwrap();
        let ledger = MaterialLedger::rehydrate(MaterialLedger::stream_id(material), &events);
        assert_eq!(ledger.material_id(), material);
        assert_eq!(ledger.available(), dec("7"));
    }

    fn movement_type() -> impl Strategy<Value = MovementType> {
        prop::sample::select(vec![
            MovementType::In,
            MovementType::Out,
            MovementType::TransferIn,
            MovementType::TransferOut,
            MovementType::Adjustment,
            MovementType::Expired,
            MovementType::Damaged,
        ])
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn prop_available_is_never_negative(
            ops in prop::collection::vec(
                (any::<bool>(), movement_type(), -500i64..500i64),
                1..40,
            )
        ) {
            let material = MaterialId::new();
            let mut ledger = MaterialLedger::empty(material);
            let mut received = Decimal::ZERO;
            let mut net_moves = Decimal::ZERO;

            for (is_entry, kind, raw) in ops {
                let qty = Decimal::new(raw, 1);
                let cmd = if is_entry {
                    entry(material, qty)
                } else {
                    movement(material, kind, qty)
                };
                if execute(&mut ledger, cmd).is_ok() {
                    if is_entry {
                        received += qty;
                    } else {
                        net_moves += kind.signed_delta(qty);
                    }
                }
                prop_assert!(ledger.available() >= Decimal::ZERO);
            }

            prop_assert_eq!(ledger.available(), received + net_moves);
        }
    }
}
