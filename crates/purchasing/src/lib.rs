//! Purchasing domain module (purchase orders and reorder suggestions).
//!
//! Business rules only: no IO and no storage. Receiving goods emits
//! `ItemsReceived`, which the application layer turns into stock entries.

pub mod order;
pub mod reorder;

pub use order::{
    order_number, Approve, Cancel, CreatePurchaseOrder, ItemsReceived, NewOrderLine,
    PurchaseOrder, PurchaseOrderApproved, PurchaseOrderCancelled, PurchaseOrderCommand,
    PurchaseOrderCreated, PurchaseOrderEvent, PurchaseOrderItem, PurchaseOrderSent,
    PurchaseOrderStatus, PurchaseOrderSubmitted, ReceiveItems, ReceivedItem, ReceivedLine,
    SendToSupplier, Submit,
};
pub use reorder::{draft_order_lines, reorder_suggestions, ReorderSuggestion, ReorderUrgency};
