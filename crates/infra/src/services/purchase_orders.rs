use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use galley_catalog::{Catalog, RawMaterial};
use galley_core::{AggregateId, DomainError, EntryId, PurchaseOrderId, SupplierId, UserId};
use galley_inventory::{LedgerCommand, MaterialLedger, RecordEntry};
use galley_purchasing::{
    reorder_suggestions, Approve, Cancel, CreatePurchaseOrder, NewOrderLine, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderEvent, PurchaseOrderStatus, ReceiveItems, ReceivedItem,
    ReorderSuggestion, SendToSupplier, Submit,
};

use crate::error::ServiceResult;
use crate::event_store::EventStore;
use crate::services::{named, SharedCatalog, StockLedger};
use crate::unit_of_work::{load_aggregate, load_all, Transactor};

/// Header and lines of an order to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_id: SupplierId,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

/// Purchase order lifecycle, with receipts flowing into the stock ledger.
#[derive(Clone)]
pub struct PurchaseOrderWorkflow<S> {
    tx: Transactor<S>,
    catalog: SharedCatalog,
    ledger: StockLedger<S>,
}

impl<S> PurchaseOrderWorkflow<S>
where
    S: EventStore + Clone,
{
    pub fn new(tx: Transactor<S>, catalog: SharedCatalog, ledger: StockLedger<S>) -> Self {
        Self { tx, catalog, ledger }
    }

    /// Create a DRAFT order. The id is issued here; the order number derives from it.
    #[tracing::instrument(skip_all, fields(supplier_id = %order.supplier_id))]
    pub fn create(&self, order: NewPurchaseOrder, created_by: UserId) -> ServiceResult<PurchaseOrder> {
        self.catalog.require_supplier(order.supplier_id)?;
        for line in &order.lines {
            self.catalog.require_active_material(line.material_id)?;
        }

        let order_id = PurchaseOrderId::new();
        let command = PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
            order_id,
            supplier_id: order.supplier_id,
            order_date: order.order_date,
            expected_date: order.expected_date,
            notes: order.notes,
            lines: order.lines,
            created_by,
            occurred_at: Utc::now(),
        });
        let created = self.decide("create_purchase_order", order_id, &command)?;
        tracing::info!(
            order_number = %created.order_number(),
            total_amount = %created.total_amount(),
            "purchase order created"
        );
        Ok(created)
    }

    pub fn submit(&self, order_id: PurchaseOrderId, submitted_by: UserId) -> ServiceResult<PurchaseOrder> {
        let command = PurchaseOrderCommand::Submit(Submit {
            order_id,
            submitted_by,
            occurred_at: Utc::now(),
        });
        self.transition("submit", order_id, &command)
    }

    pub fn approve(&self, order_id: PurchaseOrderId, approved_by: UserId) -> ServiceResult<PurchaseOrder> {
        let command = PurchaseOrderCommand::Approve(Approve {
            order_id,
            approved_by,
            occurred_at: Utc::now(),
        });
        self.transition("approve", order_id, &command)
    }

    pub fn send(&self, order_id: PurchaseOrderId, sent_by: UserId) -> ServiceResult<PurchaseOrder> {
        let command = PurchaseOrderCommand::SendToSupplier(SendToSupplier {
            order_id,
            sent_by,
            occurred_at: Utc::now(),
        });
        self.transition("send", order_id, &command)
    }

    pub fn cancel(
        &self,
        order_id: PurchaseOrderId,
        reason: impl Into<String>,
        cancelled_by: UserId,
    ) -> ServiceResult<PurchaseOrder> {
        let command = PurchaseOrderCommand::Cancel(Cancel {
            order_id,
            reason: reason.into(),
            cancelled_by,
            occurred_at: Utc::now(),
        });
        self.transition("cancel", order_id, &command)
    }

    /// Receive goods against order lines.
    ///
    /// Every received line becomes a stock entry on its material's ledger; the
    /// order update and the entries commit together.
    #[tracing::instrument(skip_all, fields(%order_id, lines = items.len()))]
    pub fn receive(
        &self,
        order_id: PurchaseOrderId,
        items: Vec<ReceivedItem>,
        received_by: UserId,
    ) -> ServiceResult<PurchaseOrder> {
        let stream = AggregateId::from(order_id);
        let now = Utc::now();
        let command = PurchaseOrderCommand::ReceiveItems(ReceiveItems {
            order_id,
            items,
            received_by,
            occurred_at: now,
        });

        let ((order, materials), _) = self
            .tx
            .run("receive_purchase_order", |uow| {
                let events = uow.handle::<PurchaseOrder>(stream, &command)?;
                let order_number = uow.load::<PurchaseOrder>(stream)?.order_number().to_string();

                let mut materials: Vec<RawMaterial> = Vec::new();
                for event in &events {
                    let PurchaseOrderEvent::ItemsReceived(received) = event else {
                        continue;
                    };
                    for line in &received.lines {
                        let material = self.catalog.require_material(line.material_id)?;
                        let entry = LedgerCommand::RecordEntry(RecordEntry {
                            entry_id: EntryId::new(),
                            material_id: line.material_id,
                            quantity: line.quantity,
                            unit: material.unit,
                            unit_cost: line.unit_cost,
                            supplier_id: Some(received.supplier_id),
                            purchase_order_id: Some(order_id),
                            batch_number: None,
                            expiry_date: None,
                            production_date: None,
                            received_by,
                            received_at: now,
                            notes: Some(format!("received on {order_number} line {}", line.line_no)),
                        });
                        uow.handle::<MaterialLedger>(MaterialLedger::stream_id(material.id), &entry)?;
                        materials.push(material);
                    }
                }
                Ok((uow.load::<PurchaseOrder>(stream)?.clone(), materials))
            })
            .map_err(named(&*self.catalog))?;

        for material in &materials {
            self.ledger.invalidate(material.id);
        }
        tracing::info!(
            order_number = %order.order_number(),
            status = %order.status(),
            entries = materials.len(),
            "purchase order items received"
        );
        Ok(order)
    }

    pub fn get(&self, order_id: PurchaseOrderId) -> ServiceResult<PurchaseOrder> {
        let order: PurchaseOrder = load_aggregate(self.tx.store(), AggregateId::from(order_id))?;
        if !order.is_created() {
            return Err(DomainError::not_found(format!("purchase order {order_id}")).into());
        }
        Ok(order)
    }

    /// All orders, newest order date first.
    pub fn list(&self) -> ServiceResult<Vec<PurchaseOrder>> {
        let mut orders: Vec<PurchaseOrder> = load_all(self.tx.store())?;
        orders.sort_by(|a, b| {
            b.order_date()
                .cmp(&a.order_date())
                .then_with(|| a.order_number().cmp(b.order_number()))
        });
        Ok(orders)
    }

    pub fn list_by_status(&self, status: PurchaseOrderStatus) -> ServiceResult<Vec<PurchaseOrder>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|o| o.status() == status)
            .collect())
    }

    /// Threshold-based reorder suggestions over current stock levels.
    pub fn reorder_suggestions(&self) -> ServiceResult<Vec<ReorderSuggestion>> {
        let materials: Vec<RawMaterial> = self
            .catalog
            .materials()
            .into_iter()
            .filter(|m| m.active)
            .collect();
        let levels = materials
            .iter()
            .map(|m| self.ledger.stock_level(m.id))
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(reorder_suggestions(materials.iter().zip(levels.iter()))?)
    }

    #[tracing::instrument(skip(self, command))]
    fn transition(
        &self,
        action: &str,
        order_id: PurchaseOrderId,
        command: &PurchaseOrderCommand,
    ) -> ServiceResult<PurchaseOrder> {
        let order = self.decide(action, order_id, command)?;
        tracing::info!(order_number = %order.order_number(), status = %order.status(), "purchase order {action}");
        Ok(order)
    }

    fn decide(
        &self,
        operation: &str,
        order_id: PurchaseOrderId,
        command: &PurchaseOrderCommand,
    ) -> ServiceResult<PurchaseOrder> {
        let stream = AggregateId::from(order_id);
        let (order, _) = self.tx.run(operation, |uow| {
            uow.handle::<PurchaseOrder>(stream, command)?;
            Ok(uow.load::<PurchaseOrder>(stream)?.clone())
        })?;
        Ok(order)
    }
}

impl<S> std::fmt::Debug for PurchaseOrderWorkflow<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurchaseOrderWorkflow").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal::Decimal;

    use galley_catalog::{InMemoryCatalog, MaterialCategory, NewRawMaterial, Supplier};
    use galley_core::MaterialId;
    use galley_purchasing::ReorderUrgency;
    use galley_units::Unit;

    use crate::error::ServiceError;
    use crate::event_store::InMemoryEventStore;
    use crate::read_model::TtlCache;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    struct Fixture {
        orders: PurchaseOrderWorkflow<Arc<InMemoryEventStore>>,
        ledger: StockLedger<Arc<InMemoryEventStore>>,
        supplier: SupplierId,
        oil: MaterialId,
    }

    fn test_fixture() -> Fixture {
        let catalog = InMemoryCatalog::new();
        let supplier = Supplier::new(SupplierId::new(), "Olive Co");
        let oil = RawMaterial::new(
            MaterialId::new(),
            NewRawMaterial {
                name: "Olive oil".to_string(),
                category: MaterialCategory::Oils,
                unit: Unit::Liters,
                base_unit: None,
                units_per_pack: None,
                unit_cost: dec("7.50"),
                min_stock_level: dec("4"),
                max_stock_level: dec("12"),
                preferred_supplier: Some(supplier.id),
            },
        )
        .unwrap();
        let (supplier_id, oil_id) = (supplier.id, oil.id);
        catalog.upsert_supplier(supplier).unwrap();
        catalog.upsert_material(oil).unwrap();

        let catalog: SharedCatalog = Arc::new(catalog);
        let tx = Transactor::new(Arc::new(InMemoryEventStore::new()), 3);
        let ledger = StockLedger::new(
            tx.clone(),
            catalog.clone(),
            Arc::new(TtlCache::new(Duration::from_secs(60))),
        );
        Fixture {
            orders: PurchaseOrderWorkflow::new(tx, catalog, ledger.clone()),
            ledger,
            supplier: supplier_id,
            oil: oil_id,
        }
    }

    fn sent_order(f: &Fixture, qty: &str) -> PurchaseOrder {
        let user = UserId::new();
        let order = f
            .orders
            .create(
                NewPurchaseOrder {
                    supplier_id: f.supplier,
                    order_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                    expected_date: NaiveDate::from_ymd_opt(2026, 3, 9),
                    notes: None,
                    lines: vec![NewOrderLine {
                        material_id: f.oil,
                        quantity: dec(qty),
                        unit_cost: dec("7.00"),
                    }],
                },
                user,
            )
            .unwrap();
        let id = *galley_core::AggregateRoot::id(&order);
        f.orders.submit(id, user).unwrap();
        f.orders.approve(id, user).unwrap();
        f.orders.send(id, user).unwrap()
    }

    #[test]
    fn receipts_become_ledger_entries() {
        let f = test_fixture();
        let order = sent_order(&f, "10");
        let id = *galley_core::AggregateRoot::id(&order);
        assert!(order.order_number().starts_with("PO-20260302-"));
        assert_eq!(f.ledger.stock_level(f.oil).unwrap().available_units_quantity, Decimal::ZERO);

        let order = f
            .orders
            .receive(
                id,
                vec![ReceivedItem { line_no: 1, quantity: dec("6"), unit_cost: Some(dec("6.80")) }],
                UserId::new(),
            )
            .unwrap();
        assert_eq!(order.status(), PurchaseOrderStatus::PartiallyReceived);

        let entries = f.ledger.entries(f.oil).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].unit_cost, dec("6.80"));
        assert_eq!(entries[0].purchase_order_id, Some(id));
        assert_eq!(entries[0].supplier_id, Some(f.supplier));
        assert_eq!(f.ledger.stock_level(f.oil).unwrap().available_units_quantity, dec("6"));
    }

    #[test]
    fn over_receipt_records_no_entries() {
        let f = test_fixture();
        let order = sent_order(&f, "2");
        let id = *galley_core::AggregateRoot::id(&order);

        let err = f
            .orders
            .receive(
                id,
                vec![ReceivedItem { line_no: 1, quantity: dec("3"), unit_cost: None }],
                UserId::new(),
            )
            .unwrap_err();
        match err {
            ServiceError::Domain(DomainError::Validation(msg)) if msg.contains("exceed") => {}
            other => panic!("expected Validation, got {other:?}"),
        }
        assert!(f.ledger.entries(f.oil).unwrap().is_empty());
        assert_eq!(f.orders.get(id).unwrap().status(), PurchaseOrderStatus::Sent);
    }

    #[test]
    fn receiving_a_draft_is_an_invalid_transition() {
        let f = test_fixture();
        let order = f
            .orders
            .create(
                NewPurchaseOrder {
                    supplier_id: f.supplier,
                    order_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                    expected_date: None,
                    notes: None,
                    lines: vec![NewOrderLine { material_id: f.oil, quantity: dec("1"), unit_cost: dec("7") }],
                },
                UserId::new(),
            )
            .unwrap();
        let id = *galley_core::AggregateRoot::id(&order);
        let err = f
            .orders
            .receive(id, vec![ReceivedItem { line_no: 1, quantity: dec("1"), unit_cost: None }], UserId::new())
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidStateTransition { .. })));
        assert_eq!(f.orders.list_by_status(PurchaseOrderStatus::Draft).unwrap().len(), 1);
    }

    #[test]
    fn unknown_supplier_and_order_are_not_found() {
        let f = test_fixture();
        let err = f
            .orders
            .create(
                NewPurchaseOrder {
                    supplier_id: SupplierId::new(),
                    order_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                    expected_date: None,
                    notes: None,
                    lines: vec![NewOrderLine { material_id: f.oil, quantity: dec("1"), unit_cost: dec("7") }],
                },
                UserId::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
        assert!(f.orders.get(PurchaseOrderId::new()).is_err());
    }

    #[test]
    fn empty_stock_suggests_a_high_urgency_reorder() {
        let f = test_fixture();
        let suggestions = f.orders.reorder_suggestions().unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].urgency, ReorderUrgency::High);
        assert_eq!(suggestions[0].suggested_quantity, dec("12"));
        assert_eq!(suggestions[0].preferred_supplier, Some(f.supplier));
    }
}
