//! Order status transitions, locking, and invoicing.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{MovementType, Order, OrderLine, OrderStatus, OrderType};
use crate::services::{inventory, kits, replenishment};
use crate::store::{self, SharedStore};
use crate::timeclock::TimeClock;

/// Whether a non-invoicing status change is allowed.
///
/// Sales orders move freely among their working statuses until invoiced,
/// with CANCELLED reachable from any of them. Work orders walk
/// ESTIMATE → OPEN ⇄ IN_PROGRESS and cannot be cancelled. INVOICED is only
/// reachable through `invoice`.
pub fn valid_transition(order_type: OrderType, from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    if from == to {
        return true;
    }
    match order_type {
        OrderType::Sales => matches!(
            (from, to),
            (
                Estimate | Open | Partial | Completed,
                Estimate | Open | Partial | Completed | Cancelled
            )
        ),
        OrderType::Work => matches!((from, to), (Estimate, Open) | (Open, InProgress) | (InProgress, Open)),
    }
}

#[derive(Clone)]
pub struct OrderStatusService {
    store: SharedStore,
    event_sender: EventSender,
    time_clock: Arc<dyn TimeClock>,
}

impl OrderStatusService {
    pub fn new(
        store: SharedStore,
        event_sender: EventSender,
        time_clock: Arc<dyn TimeClock>,
    ) -> Self {
        Self {
            store,
            event_sender,
            time_clock,
        }
    }

    /// Moves an order to a new working status. Observers (e.g. scheduling,
    /// when a work order goes IN_PROGRESS) pick the change up from the
    /// emitted event; the engine never calls out itself.
    #[instrument(skip(self), fields(order_id = %order_id, %new_status))]
    pub fn set_status(&self, order_id: Uuid, new_status: OrderStatus) -> Result<Order, ServiceError> {
        if new_status == OrderStatus::Invoiced {
            return Err(ServiceError::InvalidStatus(
                "Orders are invoiced through invoice(), not a status change".to_string(),
            ));
        }

        let mut store = store::write(&self.store);
        let order = store
            .order(order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.is_locked() {
            return Err(ServiceError::LockedOrder(format!(
                "{} is {}",
                order.order_number, order.status
            )));
        }
        if !valid_transition(order.order_type, order.status, new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "{} order cannot go from {} to {}",
                order.order_type, order.status, new_status
            )));
        }

        let old_status = order.status;
        let updated = store
            .order_mut(order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        updated.status = new_status;
        updated.updated_at = Some(Utc::now());
        let result = updated.clone();
        drop(store);

        info!(order_number = %result.order_number, %old_status, %new_status, "Order status changed");
        self.event_sender.emit(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status,
        });
        Ok(result)
    }

    /// Cancels a sales order. Cancellation never reverses inventory: an
    /// un-invoiced sales order never took any.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub fn cancel(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        {
            let store = store::read(&self.store);
            let order = store
                .order(order_id)
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
            if order.order_type != OrderType::Sales {
                return Err(ServiceError::InvalidStatus(
                    "Only sales orders can be cancelled".to_string(),
                ));
            }
        }
        self.set_status(order_id, OrderStatus::Cancelled)
    }

    /// Invoices an order and locks it.
    ///
    /// Sales orders consume their committed stock here, staged across all
    /// non-refund lines and applied as one batch with a single ISSUE
    /// movement per part. Work orders already consumed stock at line-add
    /// time; invoicing closes any open technician time entry and locks.
    /// Both then run the replenishment trigger, best-effort.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub fn invoice(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        let mut store = store::write(&self.store);
        let order = store
            .order(order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        match order.status {
            OrderStatus::Invoiced => {
                return Err(ServiceError::LockedOrder(format!(
                    "{} is already invoiced",
                    order.order_number
                )));
            }
            OrderStatus::Cancelled => {
                return Err(ServiceError::LockedOrder(format!(
                    "{} is cancelled",
                    order.order_number
                )));
            }
            _ => {}
        }
        match order.order_type {
            OrderType::Sales if order.status != OrderStatus::Open => {
                return Err(ServiceError::InvalidStatus(format!(
                    "Sales order must be OPEN to invoice, {} is {}",
                    order.order_number, order.status
                )));
            }
            OrderType::Work if order.status == OrderStatus::Estimate => {
                return Err(ServiceError::InvalidStatus(format!(
                    "Work order estimate {} cannot be invoiced",
                    order.order_number
                )));
            }
            _ => {}
        }

        let now = Utc::now();

        if order.order_type == OrderType::Sales {
            // Deferred consumption: stage the whole order's demand, then
            // commit it as a unit.
            let lines: Vec<OrderLine> = store
                .part_lines_for_order(order_id)
                .into_iter()
                .filter(|l| !l.is_core_refund())
                .cloned()
                .collect();
            let mut consumption: BTreeMap<Uuid, i32> = BTreeMap::new();
            for line in &lines {
                let part = store.part(line.part_id).cloned().ok_or_else(|| {
                    ServiceError::NotFound(format!("Part {} not found", line.part_id))
                })?;
                for (part_id, qty) in kits::expand_part(&store, &part, line.quantity) {
                    *consumption.entry(part_id).or_insert(0) += qty;
                }
            }
            inventory::apply_deltas(
                &mut store,
                &self.event_sender,
                &inventory::negate(&consumption),
                MovementType::Issue,
                &format!("Invoiced {}", order.order_number),
                Some("ORDER"),
                Some(order_id),
                None,
            )?;
        } else {
            self.time_clock.clock_out_open_entries(order_id, now);
        }

        let old_status = order.status;
        let updated = store
            .order_mut(order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        updated.status = OrderStatus::Invoiced;
        updated.invoiced_at = Some(now);
        updated.updated_at = Some(now);
        let result = updated.clone();

        // Best-effort: a replenishment failure never unwinds the invoice.
        if let Err(e) = replenishment::run_after_invoice(&mut store, &self.event_sender, &result.order_number)
        {
            warn!(error = %e, order_number = %result.order_number, "Replenishment failed after invoicing; continuing");
        }
        drop(store);

        info!(order_number = %result.order_number, "Order invoiced");
        self.event_sender.emit(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status: OrderStatus::Invoiced,
        });
        self.event_sender.emit(Event::OrderInvoiced {
            order_id,
            invoiced_at: now,
        });
        Ok(result)
    }
}
