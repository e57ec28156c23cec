//! Kit expansion: maps a kit part plus a quantity to per-component deltas.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::models::Part;
use crate::store::Store;

/// Accumulates `qty × component.quantity` for every active component of the
/// kit. Signs carry through, so a negative `qty` expands to negative deltas.
pub fn expand(store: &Store, kit_part_id: Uuid, qty: i32) -> BTreeMap<Uuid, i32> {
    let mut deltas = BTreeMap::new();
    for component in store.active_components_of(kit_part_id) {
        *deltas.entry(component.component_part_id).or_insert(0) += component.quantity * qty;
    }
    deltas
}

/// Expands one part line into the per-part quantities it consumes.
///
/// Kits fan out into their components; the kit's own stock is never touched.
/// Expansion is single-level: a component that is itself a kit is consumed
/// as-is. A kit with no active components consumes nothing.
pub fn expand_part(store: &Store, part: &Part, qty: i32) -> BTreeMap<Uuid, i32> {
    if part.is_kit {
        expand(store, part.id, qty)
    } else {
        BTreeMap::from([(part.id, qty)])
    }
}
