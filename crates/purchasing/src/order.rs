use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use galley_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, EventSourced, MaterialId,
    PurchaseOrderId, SupplierId, UserId,
};
use galley_events::Event;

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    PendingApproval,
    Approved,
    Sent,
    PartiallyReceived,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    /// Orders in these states represent committed spend.
    pub fn is_committed(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Sent | Self::PartiallyReceived | Self::Received
        )
    }

    pub fn can_receive(self) -> bool {
        matches!(self, Self::Sent | Self::PartiallyReceived)
    }

    pub fn can_cancel(self) -> bool {
        !matches!(self, Self::Received | Self::Cancelled)
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::PendingApproval => write!(f, "PENDING_APPROVAL"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Sent => write!(f, "SENT"),
            Self::PartiallyReceived => write!(f, "PARTIALLY_RECEIVED"),
            Self::Received => write!(f, "RECEIVED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for PurchaseOrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "pending_approval" => Ok(Self::PendingApproval),
            "approved" => Ok(Self::Approved),
            "sent" => Ok(Self::Sent),
            "partially_received" => Ok(Self::PartiallyReceived),
            "received" => Ok(Self::Received),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(DomainError::validation(format!(
                "unknown purchase order status: {s}"
            ))),
        }
    }
}

/// Purchase order line item. Quantities are in the material's purchase unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub line_no: u32,
    pub material_id: MaterialId,
    pub quantity_ordered: Decimal,
    pub quantity_received: Decimal,
    pub unit_cost: Decimal,
    pub line_total: Decimal,
}

impl PurchaseOrderItem {
    pub fn outstanding(&self) -> Decimal {
        self.quantity_ordered - self.quantity_received
    }

    pub fn is_complete(&self) -> bool {
        self.quantity_received >= self.quantity_ordered
    }
}

/// Requested line of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

/// A quantity arriving against one order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedItem {
    pub line_no: u32,
    pub quantity: Decimal,
    /// Actual invoiced cost; defaults to the line's unit cost.
    pub unit_cost: Option<Decimal>,
}

/// A resolved receipt line, as recorded on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub line_no: u32,
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

/// Human-readable order number, derived from the order date and the random
/// tail of the order id.
pub fn order_number(order_id: PurchaseOrderId, order_date: NaiveDate) -> String {
    let bytes = order_id.as_uuid().as_bytes();
    format!(
        "PO-{}-{:02X}{:02X}{:02X}{:02X}",
        order_date.format("%Y%m%d"),
        bytes[12],
        bytes[13],
        bytes[14],
        bytes[15]
    )
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    order_number: String,
    supplier_id: Option<SupplierId>,
    order_date: Option<NaiveDate>,
    expected_date: Option<NaiveDate>,
    status: PurchaseOrderStatus,
    notes: Option<String>,
    created_by: Option<UserId>,
    approved_by: Option<UserId>,
    cancellation_reason: Option<String>,
    lines: Vec<PurchaseOrderItem>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            order_number: String::new(),
            supplier_id: None,
            order_date: None,
            expected_date: None,
            status: PurchaseOrderStatus::Draft,
            notes: None,
            created_by: None,
            approved_by: None,
            cancellation_reason: None,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn order_date(&self) -> Option<NaiveDate> {
        self.order_date
    }

    pub fn expected_date(&self) -> Option<NaiveDate> {
        self.expected_date
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn lines(&self) -> &[PurchaseOrderItem] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&PurchaseOrderItem> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    /// `Σ quantity_ordered × unit_cost`.
    pub fn total_amount(&self) -> Decimal {
        self.lines.iter().map(|l| l.line_total).sum()
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub lines: Vec<NewOrderLine>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Submit (DRAFT -> PENDING_APPROVAL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submit {
    pub order_id: PurchaseOrderId,
    pub submitted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve (PENDING_APPROVAL -> APPROVED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub order_id: PurchaseOrderId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SendToSupplier (APPROVED -> SENT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendToSupplier {
    pub order_id: PurchaseOrderId,
    pub sent_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancel {
    pub order_id: PurchaseOrderId,
    pub reason: String,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveItems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveItems {
    pub order_id: PurchaseOrderId,
    pub items: Vec<ReceivedItem>,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    Submit(Submit),
    Approve(Approve),
    SendToSupplier(SendToSupplier),
    Cancel(Cancel),
    ReceiveItems(ReceiveItems),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub supplier_id: SupplierId,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub lines: Vec<PurchaseOrderItem>,
    pub total_amount: Decimal,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderSubmitted {
    pub order_id: PurchaseOrderId,
    pub submitted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderApproved {
    pub order_id: PurchaseOrderId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderSent {
    pub order_id: PurchaseOrderId,
    pub sent_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCancelled {
    pub order_id: PurchaseOrderId,
    pub previous_status: PurchaseOrderStatus,
    pub reason: String,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemsReceived.
///
/// Carries the resolved material, quantity and cost of each receipt line so
/// the matching stock entries can be recorded in the same commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsReceived {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub lines: Vec<ReceivedLine>,
    pub status: PurchaseOrderStatus,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    PurchaseOrderSubmitted(PurchaseOrderSubmitted),
    PurchaseOrderApproved(PurchaseOrderApproved),
    PurchaseOrderSent(PurchaseOrderSent),
    PurchaseOrderCancelled(PurchaseOrderCancelled),
    ItemsReceived(ItemsReceived),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::PurchaseOrderSubmitted(_) => "purchasing.order.submitted",
            PurchaseOrderEvent::PurchaseOrderApproved(_) => "purchasing.order.approved",
            PurchaseOrderEvent::PurchaseOrderSent(_) => "purchasing.order.sent",
            PurchaseOrderEvent::PurchaseOrderCancelled(_) => "purchasing.order.cancelled",
            PurchaseOrderEvent::ItemsReceived(_) => "purchasing.order.items_received",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderSubmitted(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderApproved(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderSent(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderCancelled(e) => e.occurred_at,
            PurchaseOrderEvent::ItemsReceived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number.clone();
                self.supplier_id = Some(e.supplier_id);
                self.order_date = Some(e.order_date);
                self.expected_date = e.expected_date;
                self.notes = e.notes.clone();
                self.created_by = Some(e.created_by);
                self.status = PurchaseOrderStatus::Draft;
                self.lines = e.lines.clone();
                self.created = true;
            }
            PurchaseOrderEvent::PurchaseOrderSubmitted(_) => {
                self.status = PurchaseOrderStatus::PendingApproval;
            }
            PurchaseOrderEvent::PurchaseOrderApproved(e) => {
                self.status = PurchaseOrderStatus::Approved;
                self.approved_by = Some(e.approved_by);
            }
            PurchaseOrderEvent::PurchaseOrderSent(_) => {
                self.status = PurchaseOrderStatus::Sent;
            }
            PurchaseOrderEvent::PurchaseOrderCancelled(e) => {
                self.status = PurchaseOrderStatus::Cancelled;
                self.cancellation_reason = Some(e.reason.clone());
            }
            PurchaseOrderEvent::ItemsReceived(e) => {
                for received in &e.lines {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == received.line_no) {
                        line.quantity_received += received.quantity;
                    }
                }
                self.status = e.status;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::Submit(cmd) => self.handle_submit(cmd),
            PurchaseOrderCommand::Approve(cmd) => self.handle_approve(cmd),
            PurchaseOrderCommand::SendToSupplier(cmd) => self.handle_send(cmd),
            PurchaseOrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
            PurchaseOrderCommand::ReceiveItems(cmd) => self.handle_receive(cmd),
        }
    }
}

impl EventSourced for PurchaseOrder {
    const AGGREGATE_TYPE: &'static str = "purchasing.order";

    fn empty(stream_id: AggregateId) -> Self {
        PurchaseOrder::empty(PurchaseOrderId::from_uuid(*stream_id.as_uuid()))
    }
}

impl PurchaseOrder {
    fn ensure_exists(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("purchase order {order_id}")));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: PurchaseOrderStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invalid_transition(self.status, action));
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "purchase order needs at least one line",
            ));
        }
        if let Some(expected) = cmd.expected_date {
            if expected < cmd.order_date {
                return Err(DomainError::validation(
                    "expected date cannot be before order date",
                ));
            }
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        let mut total_amount = Decimal::ZERO;
        for (idx, line) in cmd.lines.iter().enumerate() {
            let line_no = (idx as u32) + 1;
            if line.quantity <= Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "line {line_no}: quantity must be positive"
                )));
            }
            if line.unit_cost < Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "line {line_no}: unit cost cannot be negative"
                )));
            }
            let line_total = line
                .quantity
                .checked_mul(line.unit_cost)
                .ok_or_else(|| DomainError::validation("order total overflows"))?;
            total_amount = total_amount
                .checked_add(line_total)
                .ok_or_else(|| DomainError::validation("order total overflows"))?;

            lines.push(PurchaseOrderItem {
                line_no,
                material_id: line.material_id,
                quantity_ordered: line.quantity,
                quantity_received: Decimal::ZERO,
                unit_cost: line.unit_cost,
                line_total,
            });
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(
            PurchaseOrderCreated {
                order_id: cmd.order_id,
                order_number: order_number(cmd.order_id, cmd.order_date),
                supplier_id: cmd.supplier_id,
                order_date: cmd.order_date,
                expected_date: cmd.expected_date,
                notes: cmd.notes.clone(),
                lines,
                total_amount,
                created_by: cmd.created_by,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_submit(&self, cmd: &Submit) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.ensure_status(PurchaseOrderStatus::Draft, "submit")?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderSubmitted(
            PurchaseOrderSubmitted {
                order_id: cmd.order_id,
                submitted_by: cmd.submitted_by,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.ensure_status(PurchaseOrderStatus::PendingApproval, "approve")?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderApproved(
            PurchaseOrderApproved {
                order_id: cmd.order_id,
                approved_by: cmd.approved_by,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_send(&self, cmd: &SendToSupplier) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.ensure_status(PurchaseOrderStatus::Approved, "send")?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderSent(PurchaseOrderSent {
            order_id: cmd.order_id,
            sent_by: cmd.sent_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &Cancel) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        if !self.status.can_cancel() {
            return Err(DomainError::invalid_transition(self.status, "cancel"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason cannot be empty"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCancelled(
            PurchaseOrderCancelled {
                order_id: cmd.order_id,
                previous_status: self.status,
                reason: cmd.reason.trim().to_string(),
                cancelled_by: cmd.cancelled_by,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_receive(&self, cmd: &ReceiveItems) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        if !self.status.can_receive() {
            return Err(DomainError::invalid_transition(self.status, "receive"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::validation("nothing to receive"));
        }
        let supplier_id = self
            .supplier_id
            .ok_or_else(|| DomainError::invariant("supplier must be set"))?;

        let mut after = self.lines.clone();
        let mut received = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            if item.quantity <= Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "line {}: received quantity must be positive",
                    item.line_no
                )));
            }
            let line = after
                .iter_mut()
                .find(|l| l.line_no == item.line_no)
                .ok_or_else(|| DomainError::not_found(format!("order line {}", item.line_no)))?;

            if line.quantity_received + item.quantity > line.quantity_ordered {
                return Err(DomainError::validation(format!(
                    "line {}: receiving {} would exceed ordered quantity {} (already received {})",
                    item.line_no, item.quantity, line.quantity_ordered, line.quantity_received
                )));
            }
            let unit_cost = item.unit_cost.unwrap_or(line.unit_cost);
            if unit_cost < Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "line {}: unit cost cannot be negative",
                    item.line_no
                )));
            }
            line.quantity_received += item.quantity;

            received.push(ReceivedLine {
                line_no: item.line_no,
                material_id: line.material_id,
                quantity: item.quantity,
                unit_cost,
            });
        }

        let status = if after.iter().all(PurchaseOrderItem::is_complete) {
            PurchaseOrderStatus::Received
        } else {
            PurchaseOrderStatus::PartiallyReceived
        };

        Ok(vec![PurchaseOrderEvent::ItemsReceived(ItemsReceived {
            order_id: cmd.order_id,
            supplier_id,
            lines: received,
            status,
            received_by: cmd.received_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn create_cmd(order_id: PurchaseOrderId, lines: Vec<NewOrderLine>) -> PurchaseOrderCommand {
        PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
            order_id,
            supplier_id: SupplierId::new(),
            order_date: test_date(),
            expected_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            notes: None,
            lines,
            created_by: UserId::new(),
            occurred_at: test_time(),
        })
    }

    fn flour_line(material_id: MaterialId) -> NewOrderLine {
        NewOrderLine {
            material_id,
            quantity: dec("5"),
            unit_cost: dec("10.00"),
        }
    }

    fn execute(order: &mut PurchaseOrder, cmd: PurchaseOrderCommand) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        let events = order.handle(&cmd)?;
        for e in &events {
            order.apply(e);
        }
        Ok(events)
    }

    fn sent_order(material_id: MaterialId) -> PurchaseOrder {
        let order_id = PurchaseOrderId::new();
        let mut order = PurchaseOrder::empty(order_id);
        execute(&mut order, create_cmd(order_id, vec![flour_line(material_id)])).unwrap();
        execute(
            &mut order,
            PurchaseOrderCommand::Submit(Submit {
                order_id,
                submitted_by: UserId::new(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        execute(
            &mut order,
            PurchaseOrderCommand::Approve(Approve {
                order_id,
                approved_by: UserId::new(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        execute(
            &mut order,
            PurchaseOrderCommand::SendToSupplier(SendToSupplier {
                order_id,
                sent_by: UserId::new(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        order
    }

    fn receive(order_id: PurchaseOrderId, line_no: u32, qty: &str) -> PurchaseOrderCommand {
        PurchaseOrderCommand::ReceiveItems(ReceiveItems {
            order_id,
            items: vec![ReceivedItem {
                line_no,
                quantity: dec(qty),
                unit_cost: None,
            }],
            received_by: UserId::new(),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn create_emits_created_event_with_totals_and_number() {
        let order_id = PurchaseOrderId::new();
        let order = PurchaseOrder::empty(order_id);
        let events = order
            .handle(&create_cmd(order_id, vec![flour_line(MaterialId::new())]))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                assert_eq!(e.order_id, order_id);
                assert_eq!(e.total_amount, dec("50.00"));
                assert_eq!(e.lines[0].line_no, 1);
                assert_eq!(e.lines[0].line_total, dec("50.00"));
                assert!(e.order_number.starts_with("PO-20240110-"));
                assert_eq!(e.order_number, order_number(order_id, test_date()));
            }
            _ => panic!("Expected PurchaseOrderCreated event"),
        }
    }

    #[test]
    fn create_validates_lines_and_dates() {
        let order_id = PurchaseOrderId::new();
        let order = PurchaseOrder::empty(order_id);

        let err = order.handle(&create_cmd(order_id, vec![])).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("at least one line") => {}
            _ => panic!("Expected Validation for empty order"),
        }

        let mut bad = flour_line(MaterialId::new());
        bad.quantity = Decimal::ZERO;
        assert!(matches!(
            order.handle(&create_cmd(order_id, vec![bad])),
            Err(DomainError::Validation(_))
        ));

        let mut cmd = create_cmd(order_id, vec![flour_line(MaterialId::new())]);
        if let PurchaseOrderCommand::CreatePurchaseOrder(c) = &mut cmd {
            c.expected_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        }
        match order.handle(&cmd) {
            Err(DomainError::Validation(msg)) if msg.contains("expected date") => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn lifecycle_moves_through_every_status() {
        let order = sent_order(MaterialId::new());
        assert_eq!(order.status(), PurchaseOrderStatus::Sent);
        assert!(order.approved_by().is_some());
        assert_eq!(order.version(), 4);
    }

    #[test]
    fn transitions_from_the_wrong_state_are_rejected() {
        let order_id = PurchaseOrderId::new();
        let mut order = PurchaseOrder::empty(order_id);
        execute(&mut order, create_cmd(order_id, vec![flour_line(MaterialId::new())])).unwrap();

        let err = order
            .handle(&PurchaseOrderCommand::SendToSupplier(SendToSupplier {
                order_id,
                sent_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvalidStateTransition { from, action } => {
                assert_eq!(from, "DRAFT");
                assert_eq!(action, "send");
            }
            _ => panic!("Expected InvalidStateTransition"),
        }

        assert!(matches!(
            order.handle(&receive(order_id, 1, "1")),
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn partial_then_full_receipt() {
        let mut order = sent_order(MaterialId::new());
        let order_id = *order.id();

        let events = execute(&mut order, receive(order_id, 1, "3")).unwrap();
        assert_eq!(order.status(), PurchaseOrderStatus::PartiallyReceived);
        match &events[0] {
            PurchaseOrderEvent::ItemsReceived(e) => {
                assert_eq!(e.lines[0].quantity, dec("3"));
                assert_eq!(e.lines[0].unit_cost, dec("10.00"));
            }
            _ => panic!("Expected ItemsReceived event"),
        }

        execute(&mut order, receive(order_id, 1, "2")).unwrap();
        assert_eq!(order.status(), PurchaseOrderStatus::Received);
        assert_eq!(order.lines()[0].quantity_received, dec("5"));
    }

    #[test]
    fn over_receipt_is_rejected() {
        let mut order = sent_order(MaterialId::new());
        let order_id = *order.id();
        execute(&mut order, receive(order_id, 1, "4")).unwrap();

        let before = order.clone();
        match execute(&mut order, receive(order_id, 1, "2")) {
            Err(DomainError::Validation(msg)) if msg.contains("exceed ordered") => {}
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(order, before);

        assert!(matches!(
            order.handle(&receive(order_id, 9, "1")),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn cancel_before_receipt_but_not_after() {
        let mut order = sent_order(MaterialId::new());
        let order_id = *order.id();
        let cancel = |reason: &str| {
            PurchaseOrderCommand::Cancel(Cancel {
                order_id,
                reason: reason.to_string(),
                cancelled_by: UserId::new(),
                occurred_at: test_time(),
            })
        };

        assert!(matches!(
            order.handle(&cancel("  ")),
            Err(DomainError::Validation(_))
        ));

        let mut cancelled = order.clone();
        execute(&mut cancelled, cancel("supplier out of stock")).unwrap();
        assert_eq!(cancelled.status(), PurchaseOrderStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason(), Some("supplier out of stock"));
        assert!(matches!(
            cancelled.handle(&cancel("again")),
            Err(DomainError::InvalidStateTransition { .. })
        ));

        execute(&mut order, receive(order_id, 1, "5")).unwrap();
        assert!(matches!(
            order.handle(&cancel("too late")),
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn commands_on_missing_order_are_not_found() {
        let order_id = PurchaseOrderId::new();
        let order = PurchaseOrder::empty(order_id);
        let err = order
            .handle(&PurchaseOrderCommand::Submit(Submit {
                order_id,
                submitted_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn status_text_forms() {
        assert_eq!(PurchaseOrderStatus::PartiallyReceived.to_string(), "PARTIALLY_RECEIVED");
        assert_eq!(
            "canceled".parse::<PurchaseOrderStatus>().unwrap(),
            PurchaseOrderStatus::Cancelled
        );
        assert!(PurchaseOrderStatus::Sent.is_committed());
        assert!(!PurchaseOrderStatus::PendingApproval.is_committed());
    }

    mod receipts {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn received_never_exceeds_ordered(quantities in prop::collection::vec(0u32..8, 1..12)) {
                let material_id = MaterialId::new();
                let mut order = sent_order(material_id);
                let order_id = *order.id();

                for qty in quantities {
                    let _ = execute(&mut order, receive(order_id, 1, &qty.to_string()));
                    let line = order.line(1).unwrap();
                    prop_assert!(line.quantity_received <= line.quantity_ordered);
                    prop_assert_eq!(
                        order.status() == PurchaseOrderStatus::Received,
                        line.is_complete()
                    );
                }
            }
        }
    }
}
