use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Open,
    Closed,
}

/// A vendor purchase order. Replenishment keeps at most one OPEN order per
/// vendor, reusing it for successive shortfalls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub po_number: String,
    pub vendor_id: Uuid,
    pub status: PurchaseOrderStatus,
    pub notes: Option<String>,
    pub lines: Vec<PurchaseOrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub id: Uuid,
    pub part_id: Uuid,
    /// Sized to restock to the part's max: `max_qty - projected_qoh`.
    pub ordered_quantity: i32,
    pub unit_cost: Decimal,
    pub created_at: DateTime<Utc>,
}
