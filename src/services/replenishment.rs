//! Replenishment trigger: after invoicing, open or augment purchase orders
//! for parts whose stock was driven negative.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus};
use crate::store::{self, SharedStore, Store};

struct Shortfall {
    part_id: Uuid,
    ordered_quantity: i32,
    unit_cost: Decimal,
}

/// Scans for shortfalls and opens/augments one purchase order per vendor.
///
/// A part qualifies when its projected quantity-on-hand is negative, it has
/// a vendor, and `max_qty > 0`. Line quantities restock to the max:
/// `max_qty - projected_qoh`. Callers treat this as fire-and-forget.
pub(crate) fn run_after_invoice(
    store: &mut Store,
    events: &EventSender,
    trigger_ref: &str,
) -> Result<Vec<Uuid>, ServiceError> {
    // Group shortfalls by vendor; BTreeMap keeps the scan deterministic.
    let mut by_vendor: BTreeMap<Uuid, Vec<Shortfall>> = BTreeMap::new();
    for part in store.parts() {
        if part.quantity_on_hand >= 0 || part.max_qty <= 0 {
            continue;
        }
        let Some(vendor_id) = part.vendor_id else {
            continue;
        };
        let unit_cost = if part.last_cost > Decimal::ZERO {
            part.last_cost
        } else {
            part.cost
        };
        by_vendor.entry(vendor_id).or_default().push(Shortfall {
            part_id: part.id,
            ordered_quantity: part.max_qty - part.quantity_on_hand,
            unit_cost,
        });
    }

    let now = Utc::now();
    let mut touched = Vec::new();
    for (vendor_id, shortfalls) in by_vendor {
        let po_id = match store.open_po_for_vendor(vendor_id) {
            Some(id) => {
                let po = store.purchase_order_mut(id).ok_or_else(|| {
                    ServiceError::NotFound(format!("Purchase order {} not found", id))
                })?;
                let stamp = format!("Augmented to cover shortfall after invoicing {}", trigger_ref);
                po.notes = Some(match po.notes.take() {
                    Some(notes) => format!("{}\n{}", notes, stamp),
                    None => stamp,
                });
                po.updated_at = Some(now);
                id
            }
            None => {
                let po = PurchaseOrder {
                    id: Uuid::new_v4(),
                    po_number: store.next_po_number(),
                    vendor_id,
                    status: PurchaseOrderStatus::Open,
                    notes: Some(format!(
                        "Auto-created to cover shortfall after invoicing {}",
                        trigger_ref
                    )),
                    lines: Vec::new(),
                    created_at: now,
                    updated_at: None,
                };
                let id = po.id;
                store.insert_purchase_order(po);
                events.emit(Event::PurchaseOrderOpened {
                    purchase_order_id: id,
                    vendor_id,
                });
                id
            }
        };

        let po = store
            .purchase_order_mut(po_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase order {} not found", po_id)))?;
        for shortfall in shortfalls {
            match po.lines.iter_mut().find(|l| l.part_id == shortfall.part_id) {
                Some(line) => {
                    // The recomputed shortfall already covers what the
                    // earlier one did; never shrink a hand-edited quantity.
                    line.ordered_quantity = line.ordered_quantity.max(shortfall.ordered_quantity);
                }
                None => po.lines.push(PurchaseOrderLine {
                    id: Uuid::new_v4(),
                    part_id: shortfall.part_id,
                    ordered_quantity: shortfall.ordered_quantity,
                    unit_cost: shortfall.unit_cost,
                    created_at: now,
                }),
            }
        }
        info!(po_number = %po.po_number, vendor_id = %vendor_id, lines = po.lines.len(), "Replenishment PO updated");
        touched.push(po_id);
    }

    Ok(touched)
}

/// Read-side queries over auto-generated purchase orders.
#[derive(Clone)]
pub struct ReplenishmentService {
    store: SharedStore,
}

impl ReplenishmentService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(po_id = %po_id))]
    pub fn purchase_order(&self, po_id: Uuid) -> Result<PurchaseOrder, ServiceError> {
        let store = store::read(&self.store);
        store
            .purchase_order(po_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase order {} not found", po_id)))
    }

    pub fn purchase_orders(&self) -> Vec<PurchaseOrder> {
        let store = store::read(&self.store);
        let mut pos: Vec<PurchaseOrder> = store.purchase_orders().cloned().collect();
        pos.sort_by(|a, b| a.po_number.cmp(&b.po_number));
        pos
    }

    pub fn open_po_for_vendor(&self, vendor_id: Uuid) -> Option<PurchaseOrder> {
        let store = store::read(&self.store);
        store
            .open_po_for_vendor(vendor_id)
            .and_then(|id| store.purchase_order(id).cloned())
    }
}
