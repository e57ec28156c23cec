use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{MovementType, OrderStatus};

/// Events published for external observers (UI refresh, scheduling). The
/// engine never acts on its own events; emission is fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderInvoiced {
        order_id: Uuid,
        invoiced_at: DateTime<Utc>,
    },
    InventoryMoved {
        part_id: Uuid,
        movement_type: MovementType,
        qty_delta: i32,
        new_quantity_on_hand: i32,
    },
    CoreReturned {
        line_id: Uuid,
        refund_line_id: Uuid,
    },
    PurchaseOrderOpened {
        purchase_order_id: Uuid,
        vendor_id: Uuid,
    },
}

/// Sends events over an unbounded channel so emission never suspends; every
/// engine operation stays synchronous.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::UnboundedSender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a connected sender/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Best-effort emission: a dropped receiver is logged, never an error.
    pub fn emit(&self, event: Event) {
        if let Err(e) = self.send(event) {
            tracing::warn!(error = %e, "Event receiver dropped; event discarded");
        }
    }
}
