//! In-memory aggregate repository backing the engine.
//!
//! The store plays the role of the durable backend: one write guard spans
//! each engine operation, so readers of the shared snapshot never observe a
//! partially applied mutation. Entities live in flat per-type collections,
//! with the inventory movement log kept append-only.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::models::{
    ChargeLine, CoreStatus, Customer, InventoryMovement, KitComponent, LaborLine, Order, OrderLine,
    OrderType, Part, PurchaseOrder, PurchaseOrderStatus, ShopSettings,
};

pub type SharedStore = Arc<RwLock<Store>>;

/// Acquires a read guard, recovering from poisoning (a panicked writer in
/// another thread must not wedge the whole engine).
pub fn read(store: &SharedStore) -> RwLockReadGuard<'_, Store> {
    store.read().unwrap_or_else(PoisonError::into_inner)
}

/// Acquires a write guard, recovering from poisoning.
pub fn write(store: &SharedStore) -> RwLockWriteGuard<'_, Store> {
    store.write().unwrap_or_else(PoisonError::into_inner)
}

pub struct Store {
    settings: ShopSettings,
    parts: HashMap<Uuid, Part>,
    kit_components: Vec<KitComponent>,
    customers: HashMap<Uuid, Customer>,
    orders: HashMap<Uuid, Order>,
    part_lines: HashMap<Uuid, OrderLine>,
    labor_lines: HashMap<Uuid, LaborLine>,
    charge_lines: HashMap<Uuid, ChargeLine>,
    movements: Vec<InventoryMovement>,
    purchase_orders: HashMap<Uuid, PurchaseOrder>,
    next_sales_order_seq: u32,
    next_work_order_seq: u32,
    next_po_seq: u32,
}

impl Store {
    pub fn new(settings: ShopSettings) -> Self {
        Self {
            settings,
            parts: HashMap::new(),
            kit_components: Vec::new(),
            customers: HashMap::new(),
            orders: HashMap::new(),
            part_lines: HashMap::new(),
            labor_lines: HashMap::new(),
            charge_lines: HashMap::new(),
            movements: Vec::new(),
            purchase_orders: HashMap::new(),
            next_sales_order_seq: 1000,
            next_work_order_seq: 1000,
            next_po_seq: 1000,
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    // ---- settings ----

    pub fn settings(&self) -> &ShopSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ShopSettings {
        &mut self.settings
    }

    // ---- parts & kit components ----

    pub fn insert_part(&mut self, part: Part) {
        self.parts.insert(part.id, part);
    }

    pub fn part(&self, id: Uuid) -> Option<&Part> {
        self.parts.get(&id)
    }

    pub fn part_mut(&mut self, id: Uuid) -> Option<&mut Part> {
        self.parts.get_mut(&id)
    }

    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// Inserts or replaces the row keyed by (kit, component).
    pub fn upsert_kit_component(&mut self, component: KitComponent) {
        if let Some(existing) = self.kit_components.iter_mut().find(|c| {
            c.kit_part_id == component.kit_part_id
                && c.component_part_id == component.component_part_id
        }) {
            *existing = component;
        } else {
            self.kit_components.push(component);
        }
    }

    pub fn active_components_of(&self, kit_part_id: Uuid) -> impl Iterator<Item = &KitComponent> {
        self.kit_components
            .iter()
            .filter(move |c| c.kit_part_id == kit_part_id && c.is_active)
    }

    // ---- customers ----

    pub fn insert_customer(&mut self, customer: Customer) {
        self.customers.insert(customer.id, customer);
    }

    pub fn customer(&self, id: Uuid) -> Option<&Customer> {
        self.customers.get(&id)
    }

    pub fn customer_mut(&mut self, id: Uuid) -> Option<&mut Customer> {
        self.customers.get_mut(&id)
    }

    // ---- orders ----

    pub fn insert_order(&mut self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn order(&self, id: Uuid) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn order_mut(&mut self, id: Uuid) -> Option<&mut Order> {
        self.orders.get_mut(&id)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Ids of non-terminal orders, used when a tax attribute changes and
    /// open orders need their totals refreshed.
    pub fn unlocked_order_ids(&self) -> Vec<Uuid> {
        self.orders
            .values()
            .filter(|o| !o.is_locked())
            .map(|o| o.id)
            .collect()
    }

    pub fn unlocked_order_ids_for_customer(&self, customer_id: Uuid) -> Vec<Uuid> {
        self.orders
            .values()
            .filter(|o| o.customer_id == customer_id && !o.is_locked())
            .map(|o| o.id)
            .collect()
    }

    // ---- part lines ----

    pub fn insert_part_line(&mut self, line: OrderLine) {
        self.part_lines.insert(line.id, line);
    }

    pub fn part_line(&self, id: Uuid) -> Option<&OrderLine> {
        self.part_lines.get(&id)
    }

    pub fn part_line_mut(&mut self, id: Uuid) -> Option<&mut OrderLine> {
        self.part_lines.get_mut(&id)
    }

    pub fn remove_part_line(&mut self, id: Uuid) -> Option<OrderLine> {
        self.part_lines.remove(&id)
    }

    pub fn part_lines_for_order(&self, order_id: Uuid) -> Vec<&OrderLine> {
        let mut lines: Vec<&OrderLine> = self
            .part_lines
            .values()
            .filter(|l| l.order_id == order_id)
            .collect();
        lines.sort_by_key(|l| (l.created_at, l.id));
        lines
    }

    /// An existing non-refund line for the same part (and job reference, for
    /// work orders) that a new add should merge into. Credited-core parents
    /// are skipped: their quantity is pinned to the refund line's, so a new
    /// add gets a fresh sibling line instead.
    pub fn mergeable_line_id(
        &self,
        order_id: Uuid,
        part_id: Uuid,
        job_ref: Option<&str>,
    ) -> Option<Uuid> {
        self.part_lines
            .values()
            .find(|l| {
                l.order_id == order_id
                    && l.part_id == part_id
                    && !l.is_core_refund()
                    && l.core_status != CoreStatus::CoreCredited
                    && l.job_ref.as_deref() == job_ref
            })
            .map(|l| l.id)
    }

    pub fn refund_line_for(&self, parent_line_id: Uuid) -> Option<&OrderLine> {
        self.part_lines.values().find(|l| {
            matches!(l.kind, crate::models::LineKind::CoreRefund { parent_line_id: p } if p == parent_line_id)
        })
    }

    // ---- labor lines ----

    pub fn insert_labor_line(&mut self, line: LaborLine) {
        self.labor_lines.insert(line.id, line);
    }

    pub fn labor_line(&self, id: Uuid) -> Option<&LaborLine> {
        self.labor_lines.get(&id)
    }

    pub fn labor_line_mut(&mut self, id: Uuid) -> Option<&mut LaborLine> {
        self.labor_lines.get_mut(&id)
    }

    pub fn remove_labor_line(&mut self, id: Uuid) -> Option<LaborLine> {
        self.labor_lines.remove(&id)
    }

    pub fn labor_lines_for_order(&self, order_id: Uuid) -> Vec<&LaborLine> {
        let mut lines: Vec<&LaborLine> = self
            .labor_lines
            .values()
            .filter(|l| l.order_id == order_id)
            .collect();
        lines.sort_by_key(|l| (l.created_at, l.id));
        lines
    }

    // ---- charge lines ----

    pub fn insert_charge_line(&mut self, line: ChargeLine) {
        self.charge_lines.insert(line.id, line);
    }

    pub fn charge_line(&self, id: Uuid) -> Option<&ChargeLine> {
        self.charge_lines.get(&id)
    }

    pub fn charge_line_mut(&mut self, id: Uuid) -> Option<&mut ChargeLine> {
        self.charge_lines.get_mut(&id)
    }

    pub fn remove_charge_line(&mut self, id: Uuid) -> Option<ChargeLine> {
        self.charge_lines.remove(&id)
    }

    pub fn charge_lines_for_order(&self, order_id: Uuid) -> Vec<&ChargeLine> {
        let mut lines: Vec<&ChargeLine> = self
            .charge_lines
            .values()
            .filter(|l| l.order_id == order_id)
            .collect();
        lines.sort_by_key(|l| (l.created_at, l.id));
        lines
    }

    /// Looks up a charge line by its originating record for idempotent upsert.
    pub fn charge_line_by_source(
        &self,
        order_id: Uuid,
        source_ref_type: &str,
        source_ref_id: Uuid,
    ) -> Option<Uuid> {
        self.charge_lines
            .values()
            .find(|l| {
                l.order_id == order_id
                    && l.source_ref_type.as_deref() == Some(source_ref_type)
                    && l.source_ref_id == Some(source_ref_id)
            })
            .map(|l| l.id)
    }

    // ---- inventory movements ----

    pub fn push_movement(&mut self, movement: InventoryMovement) {
        self.movements.push(movement);
    }

    pub fn movements(&self) -> &[InventoryMovement] {
        &self.movements
    }

    pub fn movements_for_part(&self, part_id: Uuid) -> Vec<&InventoryMovement> {
        self.movements
            .iter()
            .filter(|m| m.part_id == part_id)
            .collect()
    }

    // ---- purchase orders ----

    pub fn insert_purchase_order(&mut self, po: PurchaseOrder) {
        self.purchase_orders.insert(po.id, po);
    }

    pub fn purchase_order(&self, id: Uuid) -> Option<&PurchaseOrder> {
        self.purchase_orders.get(&id)
    }

    pub fn purchase_order_mut(&mut self, id: Uuid) -> Option<&mut PurchaseOrder> {
        self.purchase_orders.get_mut(&id)
    }

    pub fn purchase_orders(&self) -> impl Iterator<Item = &PurchaseOrder> {
        self.purchase_orders.values()
    }

    pub fn open_po_for_vendor(&self, vendor_id: Uuid) -> Option<Uuid> {
        self.purchase_orders
            .values()
            .find(|po| po.vendor_id == vendor_id && po.status == PurchaseOrderStatus::Open)
            .map(|po| po.id)
    }

    // ---- numbering ----

    pub fn next_order_number(&mut self, order_type: OrderType) -> String {
        match order_type {
            OrderType::Sales => {
                let seq = self.next_sales_order_seq;
                self.next_sales_order_seq += 1;
                format!("SO-{}", seq)
            }
            OrderType::Work => {
                let seq = self.next_work_order_seq;
                self.next_work_order_seq += 1;
                format!("WO-{}", seq)
            }
        }
    }

    pub fn next_po_number(&mut self) -> String {
        let seq = self.next_po_seq;
        self.next_po_seq += 1;
        format!("PO-{}", seq)
    }
}
