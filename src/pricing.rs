use rust_decimal::Decimal;

use crate::models::{Part, ShopSettings};

/// External price-suggestion calculator, injected at engine construction.
///
/// Returning `None` tells the line engine to fall back to the part's selling
/// price; returning a value prices the line for the customer's price level.
pub trait PriceCalculator: Send + Sync {
    fn suggested_unit_price(
        &self,
        part: &Part,
        settings: &ShopSettings,
        price_level: Option<&str>,
    ) -> Option<Decimal>;
}

/// Default calculator: always defer to the catalog selling price.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListPricing;

impl PriceCalculator for ListPricing {
    fn suggested_unit_price(
        &self,
        _part: &Part,
        _settings: &ShopSettings,
        _price_level: Option<&str>,
    ) -> Option<Decimal> {
        None
    }
}
