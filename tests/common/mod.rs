//! Shared fixtures for integration tests.

use std::sync::Once;

use rust_decimal::Decimal;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use shopcore::config::EngineConfig;
use shopcore::events::Event;
use shopcore::models::{Order, OrderStatus, OrderType, Part};
use shopcore::services::catalog::CreatePartRequest;
use shopcore::services::orders::{CreateCustomerRequest, CreateOrderRequest};
use shopcore::ShopEngine;

pub struct TestShop {
    pub engine: ShopEngine,
    pub events: UnboundedReceiver<Event>,
    pub customer_id: Uuid,
}

impl TestShop {
    /// A shop with tax zeroed out so line arithmetic stays legible.
    pub fn new() -> Self {
        Self::with_config(EngineConfig {
            default_tax_rate: Decimal::ZERO,
            ..EngineConfig::default()
        })
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let (engine, events) = ShopEngine::new(config);
        let customer = engine
            .orders
            .create_customer(CreateCustomerRequest {
                name: "Walk-in".to_string(),
                tax_exempt: false,
                tax_rate_override: None,
                price_level: None,
            })
            .expect("seed customer");
        Self {
            engine,
            events,
            customer_id: customer.id,
        }
    }

    pub fn seed_part(&self, part_number: &str, selling_price: Decimal, qoh: i32) -> Part {
        self.engine
            .catalog
            .create_part(CreatePartRequest {
                part_number: part_number.to_string(),
                description: format!("{} description", part_number),
                cost: selling_price / Decimal::from(2),
                selling_price,
                core_required: false,
                core_charge: Decimal::ZERO,
                is_kit: false,
                vendor_id: None,
                max_qty: 0,
                initial_quantity: qoh,
            })
            .expect("seed part")
    }

    pub fn seed_core_part(
        &self,
        part_number: &str,
        selling_price: Decimal,
        core_charge: Decimal,
        qoh: i32,
    ) -> Part {
        self.engine
            .catalog
            .create_part(CreatePartRequest {
                part_number: part_number.to_string(),
                description: format!("{} description", part_number),
                cost: selling_price / Decimal::from(2),
                selling_price,
                core_required: true,
                core_charge,
                is_kit: false,
                vendor_id: None,
                max_qty: 0,
                initial_quantity: qoh,
            })
            .expect("seed core part")
    }

    pub fn seed_vendor_part(
        &self,
        part_number: &str,
        selling_price: Decimal,
        qoh: i32,
        max_qty: i32,
        vendor_id: Uuid,
    ) -> Part {
        self.engine
            .catalog
            .create_part(CreatePartRequest {
                part_number: part_number.to_string(),
                description: format!("{} description", part_number),
                cost: selling_price / Decimal::from(2),
                selling_price,
                core_required: false,
                core_charge: Decimal::ZERO,
                is_kit: false,
                vendor_id: Some(vendor_id),
                max_qty,
                initial_quantity: qoh,
            })
            .expect("seed vendor part")
    }

    /// A kit whose components are existing parts, at the given per-kit
    /// quantities.
    pub fn seed_kit(&self, part_number: &str, selling_price: Decimal, components: &[(Uuid, i32)]) -> Part {
        let kit = self
            .engine
            .catalog
            .create_part(CreatePartRequest {
                part_number: part_number.to_string(),
                description: format!("{} kit", part_number),
                cost: Decimal::ZERO,
                selling_price,
                core_required: false,
                core_charge: Decimal::ZERO,
                is_kit: true,
                vendor_id: None,
                max_qty: 0,
                initial_quantity: 0,
            })
            .expect("seed kit");
        for (component_part_id, quantity) in components {
            self.engine
                .catalog
                .upsert_kit_component(kit.id, *component_part_id, *quantity, true)
                .expect("seed kit component");
        }
        kit
    }

    pub fn work_order(&self) -> Order {
        let order = self
            .engine
            .orders
            .create_order(CreateOrderRequest {
                customer_id: self.customer_id,
                order_type: OrderType::Work,
                technician_id: None,
                priority: None,
                promised_at: None,
            })
            .expect("create work order");
        self.engine
            .status
            .set_status(order.id, OrderStatus::Open)
            .expect("open work order")
    }

    pub fn sales_order(&self) -> Order {
        let order = self
            .engine
            .orders
            .create_order(CreateOrderRequest {
                customer_id: self.customer_id,
                order_type: OrderType::Sales,
                technician_id: None,
                priority: None,
                promised_at: None,
            })
            .expect("create sales order");
        self.engine
            .status
            .set_status(order.id, OrderStatus::Open)
            .expect("open sales order")
    }

    pub fn qoh(&self, part_id: Uuid) -> i32 {
        self.engine
            .inventory
            .quantity_on_hand(part_id)
            .expect("quantity on hand")
    }
}

/// Honors RUST_LOG so a failing test can be re-run with engine traces.
fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
