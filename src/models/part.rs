use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog part.
///
/// `quantity_on_hand` is the single source of truth for stock level. It is a
/// signed quantity and is allowed to go negative: order-driven issuance is
/// never blocked, and the resulting shortfall is what drives replenishment
/// after invoicing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: Uuid,
    pub part_number: String,
    pub description: String,
    /// Base cost used for margin reporting.
    pub cost: Decimal,
    /// Rolling weighted-average cost, maintained on stock receipt.
    pub avg_cost: Decimal,
    /// Unit cost of the most recent receipt.
    pub last_cost: Decimal,
    pub selling_price: Decimal,
    pub quantity_on_hand: i32,
    /// Whether selling this part requires the customer to return a core.
    pub core_required: bool,
    /// Refundable deposit charged per unit while the core is outstanding.
    pub core_charge: Decimal,
    /// Kits consume their components' stock, never their own.
    pub is_kit: bool,
    pub vendor_id: Option<Uuid>,
    /// Target stock level used to size replenishment orders. Zero disables
    /// auto-replenishment for this part.
    pub max_qty: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Part {
    pub fn core_applies(&self) -> bool {
        self.core_required && self.core_charge > Decimal::ZERO
    }
}

/// One row of the kit expansion table: building `kit_part_id` takes
/// `quantity` units of `component_part_id` per kit.
///
/// Expansion is single-level. A component that is itself a kit is consumed
/// as-is; its own components are not expanded further.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KitComponent {
    pub kit_part_id: Uuid,
    pub component_part_id: Uuid,
    pub quantity: i32,
    pub is_active: bool,
}
