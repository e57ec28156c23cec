//! Inventory ledger: quantity mutation in lock-step with an append-only
//! movement log.
//!
//! Every stock change in the engine funnels through [`apply_deltas`], which
//! applies a staged batch as a unit: all parts are validated before any
//! quantity changes, and each affected part gets exactly one movement with
//! the net delta. There is no ledger entry without a matching quantity
//! change, and no quantity change without a ledger entry.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{InventoryMovement, MovementType};
use crate::store::{self, SharedStore, Store};

/// Applies a batch of signed quantity deltas (negative = issue, positive =
/// return/receive) and appends one movement per part.
///
/// Quantities may go negative; there is no floor here. The negative-stock
/// policy only applies to direct catalog edits, which enforce it before
/// calling in.
pub(crate) fn apply_deltas(
    store: &mut Store,
    events: &EventSender,
    deltas: &BTreeMap<Uuid, i32>,
    movement_type: MovementType,
    reason: &str,
    ref_type: Option<&str>,
    ref_id: Option<Uuid>,
    performed_by: Option<&str>,
) -> Result<Vec<InventoryMovement>, ServiceError> {
    // Stage: validate every part before touching any quantity.
    for part_id in deltas.keys() {
        if store.part(*part_id).is_none() {
            return Err(ServiceError::NotFound(format!("Part {} not found", part_id)));
        }
    }

    let now = Utc::now();
    let mut movements = Vec::with_capacity(deltas.len());
    for (&part_id, &delta) in deltas {
        if delta == 0 {
            continue;
        }
        let part = store
            .part_mut(part_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;
        part.quantity_on_hand += delta;
        part.updated_at = Some(now);
        let new_qoh = part.quantity_on_hand;

        let movement = InventoryMovement {
            id: Uuid::new_v4(),
            part_id,
            movement_type,
            qty_delta: delta,
            reason: reason.to_string(),
            ref_type: ref_type.map(str::to_string),
            ref_id,
            performed_by: performed_by.map(str::to_string),
            performed_at: now,
        };
        store.push_movement(movement.clone());
        debug!(part_id = %part_id, delta, new_qoh, movement = %movement_type, "Applied inventory delta");

        events.emit(Event::InventoryMoved {
            part_id,
            movement_type,
            qty_delta: delta,
            new_quantity_on_hand: new_qoh,
        });
        movements.push(movement);
    }

    Ok(movements)
}

/// Negates a delta map, turning line quantities into stock consumption.
pub(crate) fn negate(deltas: &BTreeMap<Uuid, i32>) -> BTreeMap<Uuid, i32> {
    deltas.iter().map(|(&id, &qty)| (id, -qty)).collect()
}

/// Read-side queries over stock levels and the movement log.
#[derive(Clone)]
pub struct InventoryService {
    store: SharedStore,
}

impl InventoryService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(part_id = %part_id))]
    pub fn quantity_on_hand(&self, part_id: Uuid) -> Result<i32, ServiceError> {
        let store = store::read(&self.store);
        let part = store
            .part(part_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;
        Ok(part.quantity_on_hand)
    }

    #[instrument(skip(self), fields(part_id = %part_id))]
    pub fn movements_for_part(&self, part_id: Uuid) -> Vec<InventoryMovement> {
        let store = store::read(&self.store);
        store
            .movements_for_part(part_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Net ledger delta for a part since the beginning of the log. For a
    /// part created with zero stock this reconciles with its current QOH.
    pub fn net_movement(&self, part_id: Uuid) -> i32 {
        let store = store::read(&self.store);
        store
            .movements_for_part(part_id)
            .iter()
            .map(|m| m.qty_delta)
            .sum()
    }
}
