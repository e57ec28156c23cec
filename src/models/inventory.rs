use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Stock consumed by an order line or invoicing.
    Issue,
    /// Stock restored by a quantity decrease or line removal.
    Return,
    /// Stock received from a vendor.
    Receive,
    /// Direct catalog adjustment.
    Adjust,
    /// Physical count correction.
    Count,
}

/// One append-only ledger entry. Movements are never edited or deleted;
/// the running sum of `qty_delta` per part reconciles with that part's
/// quantity-on-hand history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: Uuid,
    pub part_id: Uuid,
    pub movement_type: MovementType,
    /// Signed: negative takes stock, positive puts it back.
    pub qty_delta: i32,
    pub reason: String,
    pub ref_type: Option<String>,
    pub ref_id: Option<Uuid>,
    pub performed_by: Option<String>,
    pub performed_at: DateTime<Utc>,
}
