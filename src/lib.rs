//! Order lifecycle and inventory ledger engine.
//!
//! Turns a sales or work order's line items into priced totals, moves
//! inventory in lock-step with those lines (including kit decomposition),
//! tracks refundable core deposits, enforces locking once an order is
//! invoiced, and auto-generates replenishment purchase orders when invoicing
//! drives stock negative.
//!
//! The engine is synchronous and single-writer per call: every public
//! operation reads, validates, mutates, and returns under one store guard,
//! so a failure is always a no-op and readers never observe partial writes.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod pricing;
pub mod services;
pub mod store;
pub mod timeclock;

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use config::EngineConfig;
use events::{Event, EventSender};
use pricing::{ListPricing, PriceCalculator};
use services::catalog::CatalogService;
use services::cores::CoreService;
use services::inventory::InventoryService;
use services::order_status::OrderStatusService;
use services::orders::OrderService;
use services::replenishment::ReplenishmentService;
use store::{SharedStore, Store};
use timeclock::{NoopTimeClock, TimeClock};

pub use errors::ServiceError;

/// The assembled engine: one shared store and a service per concern.
#[derive(Clone)]
pub struct ShopEngine {
    store: SharedStore,
    pub catalog: CatalogService,
    pub inventory: InventoryService,
    pub orders: OrderService,
    pub cores: CoreService,
    pub status: OrderStatusService,
    pub replenishment: ReplenishmentService,
}

impl ShopEngine {
    /// Builds an engine with default collaborators (list pricing, no time
    /// clock), returning the event stream for external observers.
    pub fn new(config: EngineConfig) -> (Self, UnboundedReceiver<Event>) {
        let (event_sender, receiver) = EventSender::channel();
        let engine = Self::with_collaborators(
            config,
            Arc::new(ListPricing),
            Arc::new(NoopTimeClock),
            event_sender,
        );
        (engine, receiver)
    }

    /// Builds an engine with injected pricing, time-clock, and event
    /// collaborators.
    pub fn with_collaborators(
        config: EngineConfig,
        pricing: Arc<dyn PriceCalculator>,
        time_clock: Arc<dyn TimeClock>,
        event_sender: EventSender,
    ) -> Self {
        let store = Store::new(config.initial_settings()).into_shared();
        Self {
            catalog: CatalogService::new(store.clone(), event_sender.clone()),
            inventory: InventoryService::new(store.clone()),
            orders: OrderService::new(store.clone(), event_sender.clone(), pricing),
            cores: CoreService::new(store.clone(), event_sender.clone()),
            status: OrderStatusService::new(store.clone(), event_sender, time_clock),
            replenishment: ReplenishmentService::new(store.clone()),
            store,
        }
    }

    /// Direct access to the shared store, for callers that need to read the
    /// snapshot (the reactive state container, test assertions).
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }
}
