use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Sales orders quote parts and take stock at invoicing; work orders consume
/// stock as lines are added.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Sales,
    Work,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Estimate,
    Open,
    InProgress,
    Partial,
    Completed,
    Invoiced,
    Cancelled,
}

impl OrderStatus {
    /// Terminal statuses reject every further line mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Invoiced | OrderStatus::Cancelled)
    }
}

/// A sales or work order. Totals are derived fields, recomputed after every
/// line, customer-tax, or settings mutation; `status` is the lock gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub customer_id: Uuid,
    /// Resolved tax rate in percent, stamped by the totals calculator.
    pub tax_rate: Decimal,
    pub parts_subtotal: Decimal,
    pub labor_subtotal: Decimal,
    pub charge_subtotal: Decimal,
    pub core_charges_total: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub technician_id: Option<Uuid>,
    pub priority: Option<i32>,
    pub promised_at: Option<DateTime<Utc>>,
    pub invoiced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_locked(&self) -> bool {
        self.status.is_terminal()
    }
}
