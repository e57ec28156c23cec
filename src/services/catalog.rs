//! Part catalog: part and kit-definition CRUD plus direct stock operations.
//!
//! Direct stock edits are the one place the negative-inventory policy can
//! block: order-driven issuance always goes through so the replenishment
//! trigger can see the shortfall.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::models::{KitComponent, MovementType, NegativeInventoryPolicy, Part};
use crate::services::inventory;
use crate::store::{self, SharedStore};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePartRequest {
    #[validate(length(min = 1, message = "Part number is required"))]
    pub part_number: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub cost: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    pub core_required: bool,
    #[serde(default)]
    pub core_charge: Decimal,
    #[serde(default)]
    pub is_kit: bool,
    pub vendor_id: Option<Uuid>,
    #[validate(range(min = 0, message = "Max quantity cannot be negative"))]
    #[serde(default)]
    pub max_qty: i32,
    #[validate(range(min = 0, message = "Initial quantity cannot be negative"))]
    #[serde(default)]
    pub initial_quantity: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePartRequest {
    pub description: Option<String>,
    pub cost: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub core_required: Option<bool>,
    pub core_charge: Option<Decimal>,
    pub vendor_id: Option<Uuid>,
    pub max_qty: Option<i32>,
}

#[derive(Clone)]
pub struct CatalogService {
    store: SharedStore,
    event_sender: EventSender,
}

impl CatalogService {
    pub fn new(store: SharedStore, event_sender: EventSender) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(part_number = %request.part_number))]
    pub fn create_part(&self, request: CreatePartRequest) -> Result<Part, ServiceError> {
        request.validate()?;
        if request.core_charge < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Core charge cannot be negative".to_string(),
            ));
        }
        if request.selling_price < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Selling price cannot be negative".to_string(),
            ));
        }

        let part = Part {
            id: Uuid::new_v4(),
            part_number: request.part_number,
            description: request.description,
            cost: request.cost,
            avg_cost: request.cost,
            last_cost: request.cost,
            selling_price: request.selling_price,
            quantity_on_hand: 0,
            core_required: request.core_required,
            core_charge: request.core_charge,
            is_kit: request.is_kit,
            vendor_id: request.vendor_id,
            max_qty: request.max_qty,
            created_at: Utc::now(),
            updated_at: None,
        };

        let mut store = store::write(&self.store);
        let part_id = part.id;
        store.insert_part(part);
        if request.initial_quantity != 0 {
            inventory::apply_deltas(
                &mut store,
                &self.event_sender,
                &BTreeMap::from([(part_id, request.initial_quantity)]),
                MovementType::Adjust,
                "Initial stock",
                Some("CATALOG"),
                Some(part_id),
                None,
            )?;
        }
        let part = store
            .part(part_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;
        info!(part_id = %part.id, part_number = %part.part_number, "Part created");
        Ok(part)
    }

    /// Edits catalog attributes. Quantity is not editable here: stock only
    /// moves through the ledger operations below.
    #[instrument(skip(self, request), fields(part_id = %part_id))]
    pub fn update_part(&self, part_id: Uuid, request: UpdatePartRequest) -> Result<Part, ServiceError> {
        if let Some(charge) = request.core_charge {
            if charge < Decimal::ZERO {
                return Err(ServiceError::InvalidInput(
                    "Core charge cannot be negative".to_string(),
                ));
            }
        }
        if let Some(price) = request.selling_price {
            if price < Decimal::ZERO {
                return Err(ServiceError::InvalidInput(
                    "Selling price cannot be negative".to_string(),
                ));
            }
        }
        if let Some(max_qty) = request.max_qty {
            if max_qty < 0 {
                return Err(ServiceError::InvalidInput(
                    "Max quantity cannot be negative".to_string(),
                ));
            }
        }

        let mut store = store::write(&self.store);
        let part = store
            .part_mut(part_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;
        if let Some(description) = request.description {
            part.description = description;
        }
        if let Some(cost) = request.cost {
            part.cost = cost;
        }
        if let Some(selling_price) = request.selling_price {
            part.selling_price = selling_price;
        }
        if let Some(core_required) = request.core_required {
            part.core_required = core_required;
        }
        if let Some(core_charge) = request.core_charge {
            part.core_charge = core_charge;
        }
        if let Some(vendor_id) = request.vendor_id {
            part.vendor_id = Some(vendor_id);
        }
        if let Some(max_qty) = request.max_qty {
            part.max_qty = max_qty;
        }
        part.updated_at = Some(Utc::now());
        Ok(part.clone())
    }

    pub fn get_part(&self, part_id: Uuid) -> Result<Part, ServiceError> {
        let store = store::read(&self.store);
        store
            .part(part_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))
    }

    /// Defines (or redefines) one component row of a kit.
    #[instrument(skip(self), fields(kit_part_id = %kit_part_id, component_part_id = %component_part_id))]
    pub fn upsert_kit_component(
        &self,
        kit_part_id: Uuid,
        component_part_id: Uuid,
        quantity: i32,
        is_active: bool,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Component quantity must be positive".to_string(),
            ));
        }
        if kit_part_id == component_part_id {
            return Err(ServiceError::InvalidInput(
                "A kit cannot contain itself".to_string(),
            ));
        }

        let mut store = store::write(&self.store);
        let kit = store
            .part(kit_part_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", kit_part_id)))?;
        if !kit.is_kit {
            return Err(ServiceError::InvalidInput(format!(
                "Part {} is not a kit",
                kit.part_number
            )));
        }
        if store.part(component_part_id).is_none() {
            return Err(ServiceError::NotFound(format!(
                "Part {} not found",
                component_part_id
            )));
        }

        store.upsert_kit_component(KitComponent {
            kit_part_id,
            component_part_id,
            quantity,
            is_active,
        });
        Ok(())
    }

    /// Direct stock adjustment, gated by the negative-inventory policy.
    #[instrument(skip(self), fields(part_id = %part_id, delta))]
    pub fn adjust_quantity(
        &self,
        part_id: Uuid,
        delta: i32,
        reason: &str,
        performed_by: Option<&str>,
    ) -> Result<Part, ServiceError> {
        if delta == 0 {
            return Err(ServiceError::InvalidInput(
                "Adjustment delta cannot be zero".to_string(),
            ));
        }

        let mut store = store::write(&self.store);
        let part = store
            .part(part_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;

        let projected = part.quantity_on_hand + delta;
        if projected < 0 {
            match store.settings().negative_inventory_policy {
                NegativeInventoryPolicy::Block => {
                    return Err(ServiceError::ValidationBlocked(format!(
                        "Adjustment would take {} to {}",
                        part.part_number, projected
                    )));
                }
                NegativeInventoryPolicy::Warn => {
                    warn!(part_number = %part.part_number, projected, "Adjustment takes stock negative");
                }
            }
        }

        inventory::apply_deltas(
            &mut store,
            &self.event_sender,
            &BTreeMap::from([(part_id, delta)]),
            MovementType::Adjust,
            reason,
            Some("CATALOG"),
            Some(part_id),
            performed_by,
        )?;
        store
            .part(part_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))
    }

    /// Receives vendor stock, updating the last and rolling-average costs.
    #[instrument(skip(self), fields(part_id = %part_id, qty))]
    pub fn receive_stock(
        &self,
        part_id: Uuid,
        qty: i32,
        unit_cost: Decimal,
        performed_by: Option<&str>,
    ) -> Result<Part, ServiceError> {
        if qty <= 0 {
            return Err(ServiceError::InvalidInput(
                "Receipt quantity must be positive".to_string(),
            ));
        }
        if unit_cost < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Unit cost cannot be negative".to_string(),
            ));
        }

        let mut store = store::write(&self.store);
        let part = store
            .part(part_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;

        inventory::apply_deltas(
            &mut store,
            &self.event_sender,
            &BTreeMap::from([(part_id, qty)]),
            MovementType::Receive,
            "Stock received",
            Some("CATALOG"),
            Some(part_id),
            performed_by,
        )?;

        // Weighted average over the non-negative portion of prior stock;
        // backordered quantity does not dilute the cost basis.
        let prior = Decimal::from(part.quantity_on_hand.max(0));
        let received = Decimal::from(qty);
        let updated = store
            .part_mut(part_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;
        updated.avg_cost = ((updated.avg_cost * prior + unit_cost * received)
            / (prior + received))
            .round_dp(4);
        updated.last_cost = unit_cost;
        Ok(updated.clone())
    }

    /// Records a physical count, issuing a COUNT movement for the difference.
    #[instrument(skip(self), fields(part_id = %part_id, counted_qty))]
    pub fn record_count(
        &self,
        part_id: Uuid,
        counted_qty: i32,
        performed_by: Option<&str>,
    ) -> Result<Part, ServiceError> {
        if counted_qty < 0 {
            return Err(ServiceError::InvalidInput(
                "Counted quantity cannot be negative".to_string(),
            ));
        }

        let mut store = store::write(&self.store);
        let part = store
            .part(part_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;

        let delta = counted_qty - part.quantity_on_hand;
        if delta != 0 {
            inventory::apply_deltas(
                &mut store,
                &self.event_sender,
                &BTreeMap::from([(part_id, delta)]),
                MovementType::Count,
                "Physical count",
                Some("CATALOG"),
                Some(part_id),
                performed_by,
            )?;
        }
        store
            .part(part_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))
    }
}
