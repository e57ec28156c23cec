use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a direct catalog adjustment does when it would drive stock negative.
/// Order-driven issuance is exempt: adding a part to an order always goes
/// through, and the shortfall feeds the replenishment trigger instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NegativeInventoryPolicy {
    Block,
    #[default]
    Warn,
}

/// Editable shop-wide defaults. Changing the tax rate recomputes totals on
/// open orders; the labor rate is only a snapshot source for new labor lines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShopSettings {
    /// Default tax rate in percent.
    pub default_tax_rate: Decimal,
    /// Default hourly labor rate.
    pub default_labor_rate: Decimal,
    pub negative_inventory_policy: NegativeInventoryPolicy,
}
