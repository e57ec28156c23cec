use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Customer billing attributes the engine needs for pricing and tax.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub tax_exempt: bool,
    /// Per-customer tax rate in percent. Overrides the shop default when set
    /// and non-negative.
    pub tax_rate_override: Option<Decimal>,
    /// Price level passed to the external price calculator.
    pub price_level: Option<String>,
    pub created_at: DateTime<Utc>,
}
