use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Core-deposit state of a part line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreStatus {
    NotApplicable,
    /// Deposit charged; customer still owes the old unit.
    CoreOwed,
    /// Old unit came back; a refund line was issued.
    CoreCredited,
}

/// Distinguishes ordinary part lines from the credit line generated when a
/// core comes back. Refund lines live in the same flat line collection as
/// their parent but cannot be edited, toggled, or removed on their own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineKind {
    Normal,
    CoreRefund { parent_line_id: Uuid },
}

/// A part line on an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub part_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// Billing-only flag: a warranty line contributes zero to the customer
    /// subtotal but its inventory consumption stands.
    pub is_warranty: bool,
    pub core_charge: Decimal,
    pub core_status: CoreStatus,
    pub core_returned_at: Option<DateTime<Utc>>,
    pub kind: LineKind,
    /// Work orders may pin a part line to a job line so the same part can
    /// appear once per job.
    pub job_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderLine {
    pub fn is_core_refund(&self) -> bool {
        matches!(self.kind, LineKind::CoreRefund { .. })
    }

    /// What this line contributes to the customer-facing subtotal.
    pub fn billable_total(&self) -> Decimal {
        if self.is_warranty {
            Decimal::ZERO
        } else {
            self.line_total
        }
    }
}

/// A labor line. `rate` is a snapshot of the shop default at creation time,
/// not a live link to settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaborLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub description: String,
    pub hours: Decimal,
    pub rate: Decimal,
    pub line_total: Decimal,
    pub is_warranty: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LaborLine {
    pub fn billable_total(&self) -> Decimal {
        if self.is_warranty {
            Decimal::ZERO
        } else {
            self.line_total
        }
    }
}

/// A generic fee or pass-through charge (fabrication, plasma cutting, shop
/// supplies). `source_ref_type`/`source_ref_id` identify the originating
/// record so repeated pushes upsert instead of duplicating.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChargeLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub source_ref_type: Option<String>,
    pub source_ref_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
