//! Order line engine: add/update/remove/price part, labor, and charge lines
//! for sales and work orders.
//!
//! Every mutation follows the same shape: check the lock gate, mutate lines,
//! move inventory (work orders immediately, sales orders deferred to
//! invoicing), append ledger entries, recalculate totals. The whole sequence
//! runs under one store write guard, so a failure is a no-op and readers
//! never see a half-applied call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    ChargeLine, CoreStatus, Customer, LaborLine, LineKind, MovementType, Order, OrderLine,
    OrderStatus, OrderType,
};
use crate::pricing::PriceCalculator;
use crate::services::{cores, inventory, kits, totals};
use crate::store::{self, SharedStore};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub order_type: OrderType,
    pub technician_id: Option<Uuid>,
    pub priority: Option<i32>,
    pub promised_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub name: String,
    #[serde(default)]
    pub tax_exempt: bool,
    pub tax_rate_override: Option<Decimal>,
    pub price_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddLaborRequest {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub hours: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLaborRequest {
    pub description: Option<String>,
    pub hours: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertChargeRequest {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Originating record (e.g. a fabrication or plasma job) for idempotent
    /// upsert; both fields must be set for dedup to apply.
    pub source_ref_type: Option<String>,
    pub source_ref_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub default_tax_rate: Option<Decimal>,
    pub default_labor_rate: Option<Decimal>,
    pub negative_inventory_policy: Option<crate::models::NegativeInventoryPolicy>,
}

/// Rejects mutations on invoiced or cancelled orders.
pub(crate) fn ensure_unlocked(order: &Order) -> Result<(), ServiceError> {
    if order.is_locked() {
        return Err(ServiceError::LockedOrder(format!(
            "{} is {}",
            order.order_number, order.status
        )));
    }
    Ok(())
}

/// Service for creating orders and mutating their lines.
#[derive(Clone)]
pub struct OrderService {
    store: SharedStore,
    event_sender: EventSender,
    pricing: Arc<dyn PriceCalculator>,
}

impl OrderService {
    pub fn new(
        store: SharedStore,
        event_sender: EventSender,
        pricing: Arc<dyn PriceCalculator>,
    ) -> Self {
        Self {
            store,
            event_sender,
            pricing,
        }
    }

    // ---- customers & settings ----

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub fn create_customer(&self, request: CreateCustomerRequest) -> Result<Customer, ServiceError> {
        request.validate()?;
        let customer = Customer {
            id: Uuid::new_v4(),
            name: request.name,
            tax_exempt: request.tax_exempt,
            tax_rate_override: request.tax_rate_override,
            price_level: request.price_level,
            created_at: Utc::now(),
        };
        let mut store = store::write(&self.store);
        store.insert_customer(customer.clone());
        Ok(customer)
    }

    /// Updates a customer's tax attributes and refreshes totals on their
    /// open orders.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub fn set_customer_tax(
        &self,
        customer_id: Uuid,
        tax_exempt: bool,
        tax_rate_override: Option<Decimal>,
    ) -> Result<(), ServiceError> {
        let mut store = store::write(&self.store);
        let customer = store
            .customer_mut(customer_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;
        customer.tax_exempt = tax_exempt;
        customer.tax_rate_override = tax_rate_override;

        for order_id in store.unlocked_order_ids_for_customer(customer_id) {
            totals::recalculate(&mut store, order_id)?;
        }
        Ok(())
    }

    /// Updates shop settings. A tax-rate change recomputes totals on every
    /// open order; the labor rate only affects labor lines created later.
    #[instrument(skip(self, request))]
    pub fn update_settings(&self, request: UpdateSettingsRequest) -> Result<(), ServiceError> {
        if let Some(rate) = request.default_tax_rate {
            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                return Err(ServiceError::InvalidInput(
                    "Tax rate must be between 0 and 100".to_string(),
                ));
            }
        }
        if let Some(rate) = request.default_labor_rate {
            if rate < Decimal::ZERO {
                return Err(ServiceError::InvalidInput(
                    "Labor rate cannot be negative".to_string(),
                ));
            }
        }

        let mut store = store::write(&self.store);
        let settings = store.settings_mut();
        let tax_changed = matches!(request.default_tax_rate, Some(r) if r != settings.default_tax_rate);
        if let Some(rate) = request.default_tax_rate {
            settings.default_tax_rate = rate;
        }
        if let Some(rate) = request.default_labor_rate {
            settings.default_labor_rate = rate;
        }
        if let Some(policy) = request.negative_inventory_policy {
            settings.negative_inventory_policy = policy;
        }

        if tax_changed {
            for order_id in store.unlocked_order_ids() {
                totals::recalculate(&mut store, order_id)?;
            }
        }
        Ok(())
    }

    // ---- orders ----

    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, order_type = %request.order_type))]
    pub fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ServiceError> {
        let mut store = store::write(&self.store);
        if store.customer(request.customer_id).is_none() {
            return Err(ServiceError::NotFound(format!(
                "Customer {} not found",
                request.customer_id
            )));
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            order_number: store.next_order_number(request.order_type),
            order_type: request.order_type,
            status: OrderStatus::Estimate,
            customer_id: request.customer_id,
            tax_rate: Decimal::ZERO,
            parts_subtotal: Decimal::ZERO,
            labor_subtotal: Decimal::ZERO,
            charge_subtotal: Decimal::ZERO,
            core_charges_total: Decimal::ZERO,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total: Decimal::ZERO,
            technician_id: request.technician_id,
            priority: request.priority,
            promised_at: request.promised_at,
            invoiced_at: None,
            created_at: now,
            updated_at: None,
        };
        store.insert_order(order.clone());
        totals::recalculate(&mut store, order.id)?;
        let order = store
            .order(order.id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order.id)))?;
        drop(store);

        info!(order_id = %order.id, order_number = %order.order_number, "Order created");
        self.event_sender.emit(Event::OrderCreated(order.id));
        Ok(order)
    }

    pub fn get_order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        let store = store::read(&self.store);
        store
            .order(order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    pub fn part_lines(&self, order_id: Uuid) -> Vec<OrderLine> {
        let store = store::read(&self.store);
        store
            .part_lines_for_order(order_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn labor_lines(&self, order_id: Uuid) -> Vec<LaborLine> {
        let store = store::read(&self.store);
        store
            .labor_lines_for_order(order_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn charge_lines(&self, order_id: Uuid) -> Vec<ChargeLine> {
        let store = store::read(&self.store);
        store
            .charge_lines_for_order(order_id)
            .into_iter()
            .cloned()
            .collect()
    }

    // ---- part lines ----

    /// Adds a part to an order, merging into an existing line for the same
    /// part (and job reference) instead of duplicating.
    ///
    /// Work orders consume inventory immediately, kit-expanded, with one
    /// ISSUE movement per affected part. Sales orders take nothing until
    /// invoicing: a quote must not move stock.
    #[instrument(skip(self), fields(order_id = %order_id, part_id = %part_id, qty))]
    pub fn add_part_line(
        &self,
        order_id: Uuid,
        part_id: Uuid,
        qty: i32,
        job_ref: Option<&str>,
    ) -> Result<OrderLine, ServiceError> {
        if qty <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be positive".to_string(),
            ));
        }

        let mut store = store::write(&self.store);
        let order = store
            .order(order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        ensure_unlocked(&order)?;
        let part = store
            .part(part_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;

        let price_level = store
            .customer(order.customer_id)
            .and_then(|c| c.price_level.clone());
        let unit_price = self
            .pricing
            .suggested_unit_price(&part, store.settings(), price_level.as_deref())
            .unwrap_or(part.selling_price);

        // Work orders represent parts physically consumed now; stock moves
        // before the line lands, all under the same guard.
        if order.order_type == OrderType::Work {
            let consumption = kits::expand_part(&store, &part, qty);
            inventory::apply_deltas(
                &mut store,
                &self.event_sender,
                &inventory::negate(&consumption),
                MovementType::Issue,
                &format!("Issued on {}", order.order_number),
                Some("ORDER"),
                Some(order_id),
                None,
            )?;
        }

        let now = Utc::now();
        let line_id = match store.mergeable_line_id(order_id, part_id, job_ref) {
            Some(existing_id) => {
                let line = store.part_line_mut(existing_id).ok_or_else(|| {
                    ServiceError::NotFound(format!("Line {} not found", existing_id))
                })?;
                line.quantity += qty;
                line.line_total = line.unit_price * Decimal::from(line.quantity);
                line.updated_at = Some(now);
                existing_id
            }
            None => {
                let mut line = OrderLine {
                    id: Uuid::new_v4(),
                    order_id,
                    part_id,
                    description: part.description.clone(),
                    quantity: qty,
                    unit_price,
                    line_total: unit_price * Decimal::from(qty),
                    is_warranty: false,
                    core_charge: Decimal::ZERO,
                    core_status: CoreStatus::NotApplicable,
                    core_returned_at: None,
                    kind: LineKind::Normal,
                    job_ref: job_ref.map(str::to_string),
                    created_at: now,
                    updated_at: None,
                };
                cores::init_core_state(&part, &mut line);
                let id = line.id;
                store.insert_part_line(line);
                id
            }
        };

        totals::recalculate(&mut store, order_id)?;
        let line = store
            .part_line(line_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Line {} not found", line_id)))?;
        info!(order_number = %order.order_number, line_id = %line.id, qty = line.quantity, "Part line added");
        Ok(line)
    }

    /// Changes a line's quantity. Work orders move the signed difference
    /// through the ledger: more issued, or the excess returned.
    #[instrument(skip(self), fields(line_id = %line_id, new_qty))]
    pub fn update_part_qty(&self, line_id: Uuid, new_qty: i32) -> Result<OrderLine, ServiceError> {
        if new_qty <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be positive; remove the line instead".to_string(),
            ));
        }

        let mut store = store::write(&self.store);
        let line = store
            .part_line(line_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Line {} not found", line_id)))?;
        if line.is_core_refund() {
            return Err(ServiceError::InvalidInput(
                "Core refund lines cannot be edited".to_string(),
            ));
        }
        // The refund line's quantity mirrors its parent's; a credited parent
        // can no longer be resized.
        if line.core_status == CoreStatus::CoreCredited {
            return Err(ServiceError::InvalidInput(
                "Line has a core refund attached and cannot be resized".to_string(),
            ));
        }
        let order = store
            .order(line.order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", line.order_id)))?;
        ensure_unlocked(&order)?;

        let qty_delta = new_qty - line.quantity;
        if qty_delta == 0 {
            return Ok(line);
        }

        if order.order_type == OrderType::Work {
            let part = store
                .part(line.part_id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", line.part_id)))?;
            let expansion = kits::expand_part(&store, &part, qty_delta);
            let movement_type = if qty_delta > 0 {
                MovementType::Issue
            } else {
                MovementType::Return
            };
            inventory::apply_deltas(
                &mut store,
                &self.event_sender,
                &inventory::negate(&expansion),
                movement_type,
                &format!("Quantity change on {}", order.order_number),
                Some("ORDER"),
                Some(order.id),
                None,
            )?;
        }

        let updated = store
            .part_line_mut(line_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Line {} not found", line_id)))?;
        updated.quantity = new_qty;
        updated.line_total = updated.unit_price * Decimal::from(new_qty);
        updated.updated_at = Some(Utc::now());
        let result = updated.clone();

        totals::recalculate(&mut store, order.id)?;
        Ok(result)
    }

    /// Removes a part line. Work orders put the remaining quantity back with
    /// a compensating RETURN movement; sales orders never took stock, so the
    /// line simply goes away.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub fn remove_part_line(&self, line_id: Uuid) -> Result<(), ServiceError> {
        let mut store = store::write(&self.store);
        let line = store
            .part_line(line_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Line {} not found", line_id)))?;
        if line.is_core_refund() {
            return Err(ServiceError::InvalidInput(
                "Core refund lines cannot be removed independently".to_string(),
            ));
        }
        if line.core_status == CoreStatus::CoreCredited {
            return Err(ServiceError::InvalidInput(
                "Line has a core refund attached and cannot be removed".to_string(),
            ));
        }
        let order = store
            .order(line.order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", line.order_id)))?;
        ensure_unlocked(&order)?;

        if order.order_type == OrderType::Work {
            let part = store
                .part(line.part_id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", line.part_id)))?;
            let restored = kits::expand_part(&store, &part, line.quantity);
            inventory::apply_deltas(
                &mut store,
                &self.event_sender,
                &restored,
                MovementType::Return,
                &format!("Removed from {}", order.order_number),
                Some("ORDER"),
                Some(order.id),
                None,
            )?;
        }

        store.remove_part_line(line_id);
        totals::recalculate(&mut store, order.id)?;
        info!(order_number = %order.order_number, line_id = %line_id, "Part line removed");
        Ok(())
    }

    /// Overrides a line's unit price. No inventory effect.
    #[instrument(skip(self), fields(line_id = %line_id, %new_price))]
    pub fn update_line_unit_price(
        &self,
        line_id: Uuid,
        new_price: Decimal,
    ) -> Result<OrderLine, ServiceError> {
        if new_price < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Unit price cannot be negative".to_string(),
            ));
        }

        let mut store = store::write(&self.store);
        let line = store
            .part_line(line_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Line {} not found", line_id)))?;
        if line.is_core_refund() {
            return Err(ServiceError::InvalidInput(
                "Core refund lines cannot be repriced".to_string(),
            ));
        }
        let order = store
            .order(line.order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", line.order_id)))?;
        ensure_unlocked(&order)?;

        let updated = store
            .part_line_mut(line_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Line {} not found", line_id)))?;
        updated.unit_price = new_price;
        updated.line_total = new_price * Decimal::from(updated.quantity);
        updated.updated_at = Some(Utc::now());
        let result = updated.clone();

        totals::recalculate(&mut store, order.id)?;
        Ok(result)
    }

    /// Flips the warranty flag: billing-only, the line's inventory
    /// consumption stands.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub fn toggle_warranty(&self, line_id: Uuid) -> Result<OrderLine, ServiceError> {
        let mut store = store::write(&self.store);
        let line = store
            .part_line(line_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Line {} not found", line_id)))?;
        if line.is_core_refund() {
            return Err(ServiceError::InvalidInput(
                "Core refund lines cannot be toggled".to_string(),
            ));
        }
        let order = store
            .order(line.order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", line.order_id)))?;
        ensure_unlocked(&order)?;

        let updated = store
            .part_line_mut(line_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Line {} not found", line_id)))?;
        updated.is_warranty = !updated.is_warranty;
        updated.updated_at = Some(Utc::now());
        let result = updated.clone();

        totals::recalculate(&mut store, order.id)?;
        Ok(result)
    }

    // ---- labor lines ----

    /// Adds a labor line. The rate is snapshotted from shop settings at
    /// creation; later settings changes leave existing lines alone.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub fn add_labor_line(
        &self,
        order_id: Uuid,
        request: AddLaborRequest,
    ) -> Result<LaborLine, ServiceError> {
        request.validate()?;
        if request.hours <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Hours must be positive".to_string(),
            ));
        }

        let mut store = store::write(&self.store);
        let order = store
            .order(order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        ensure_unlocked(&order)?;

        let rate = store.settings().default_labor_rate;
        let line = LaborLine {
            id: Uuid::new_v4(),
            order_id,
            description: request.description,
            hours: request.hours,
            rate,
            line_total: (request.hours * rate).round_dp(2),
            is_warranty: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        store.insert_labor_line(line.clone());
        totals::recalculate(&mut store, order_id)?;
        Ok(line)
    }

    #[instrument(skip(self, request), fields(line_id = %line_id))]
    pub fn update_labor_line(
        &self,
        line_id: Uuid,
        request: UpdateLaborRequest,
    ) -> Result<LaborLine, ServiceError> {
        if let Some(hours) = request.hours {
            if hours <= Decimal::ZERO {
                return Err(ServiceError::InvalidInput(
                    "Hours must be positive".to_string(),
                ));
            }
        }

        let mut store = store::write(&self.store);
        let line = store
            .labor_line(line_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Labor line {} not found", line_id)))?;
        let order = store
            .order(line.order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", line.order_id)))?;
        ensure_unlocked(&order)?;

        let updated = store
            .labor_line_mut(line_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Labor line {} not found", line_id)))?;
        if let Some(description) = request.description {
            updated.description = description;
        }
        if let Some(hours) = request.hours {
            updated.hours = hours;
            // Recompute against the snapshotted rate, not current settings.
            updated.line_total = (hours * updated.rate).round_dp(2);
        }
        updated.updated_at = Some(Utc::now());
        let result = updated.clone();

        totals::recalculate(&mut store, order.id)?;
        Ok(result)
    }

    #[instrument(skip(self), fields(line_id = %line_id))]
    pub fn remove_labor_line(&self, line_id: Uuid) -> Result<(), ServiceError> {
        let mut store = store::write(&self.store);
        let line = store
            .labor_line(line_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Labor line {} not found", line_id)))?;
        let order = store
            .order(line.order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", line.order_id)))?;
        ensure_unlocked(&order)?;

        store.remove_labor_line(line_id);
        totals::recalculate(&mut store, order.id)?;
        Ok(())
    }

    #[instrument(skip(self), fields(line_id = %line_id))]
    pub fn toggle_labor_warranty(&self, line_id: Uuid) -> Result<LaborLine, ServiceError> {
        let mut store = store::write(&self.store);
        let line = store
            .labor_line(line_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Labor line {} not found", line_id)))?;
        let order = store
            .order(line.order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", line.order_id)))?;
        ensure_unlocked(&order)?;

        let updated = store
            .labor_line_mut(line_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Labor line {} not found", line_id)))?;
        updated.is_warranty = !updated.is_warranty;
        updated.updated_at = Some(Utc::now());
        let result = updated.clone();

        totals::recalculate(&mut store, order.id)?;
        Ok(result)
    }

    // ---- charge lines ----

    /// Inserts or updates a pass-through charge. When the request carries a
    /// source reference, a repeated push from the same originating record
    /// updates the existing line instead of duplicating it.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub fn upsert_charge_line(
        &self,
        order_id: Uuid,
        request: UpsertChargeRequest,
    ) -> Result<ChargeLine, ServiceError> {
        request.validate()?;
        if request.unit_price < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Unit price cannot be negative".to_string(),
            ));
        }

        let mut store = store::write(&self.store);
        let order = store
            .order(order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        ensure_unlocked(&order)?;

        let total_price = (request.unit_price * Decimal::from(request.quantity)).round_dp(2);
        let now = Utc::now();

        let existing_id = match (&request.source_ref_type, request.source_ref_id) {
            (Some(ref_type), Some(ref_id)) => store.charge_line_by_source(order_id, ref_type, ref_id),
            _ => None,
        };

        let line_id = match existing_id {
            Some(id) => {
                let line = store
                    .charge_line_mut(id)
                    .ok_or_else(|| ServiceError::NotFound(format!("Charge line {} not found", id)))?;
                line.description = request.description;
                line.quantity = request.quantity;
                line.unit_price = request.unit_price;
                line.total_price = total_price;
                line.updated_at = Some(now);
                id
            }
            None => {
                let line = ChargeLine {
                    id: Uuid::new_v4(),
                    order_id,
                    description: request.description,
                    quantity: request.quantity,
                    unit_price: request.unit_price,
                    total_price,
                    source_ref_type: request.source_ref_type,
                    source_ref_id: request.source_ref_id,
                    created_at: now,
                    updated_at: None,
                };
                let id = line.id;
                store.insert_charge_line(line);
                id
            }
        };

        totals::recalculate(&mut store, order_id)?;
        store
            .charge_line(line_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Charge line {} not found", line_id)))
    }

    #[instrument(skip(self), fields(line_id = %line_id))]
    pub fn remove_charge_line(&self, line_id: Uuid) -> Result<(), ServiceError> {
        let mut store = store::write(&self.store);
        let line = store
            .charge_line(line_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Charge line {} not found", line_id)))?;
        let order = store
            .order(line.order_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", line.order_id)))?;
        ensure_unlocked(&order)?;

        store.remove_charge_line(line_id);
        totals::recalculate(&mut store, order.id)?;
        Ok(())
    }
}
