use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{NegativeInventoryPolicy, ShopSettings};

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_TAX_RATE_PERCENT: &str = "8.25";
const DEFAULT_LABOR_RATE: &str = "95.00";

/// Engine configuration: shop-wide defaults seeded into the store at startup
/// plus logging preferences.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Default tax rate in percent, applied unless the customer is exempt or
    /// carries an override.
    #[serde(default = "default_tax_rate")]
    #[validate(custom = "validate_percent")]
    pub default_tax_rate: Decimal,

    /// Default hourly labor rate snapshotted onto new labor lines.
    #[serde(default = "default_labor_rate")]
    #[validate(custom = "validate_non_negative")]
    pub default_labor_rate: Decimal,

    /// Negative-stock policy for direct catalog adjustments.
    #[serde(default)]
    pub negative_inventory_policy: NegativeInventoryPolicy,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_tax_rate: default_tax_rate(),
            default_labor_rate: default_labor_rate(),
            negative_inventory_policy: NegativeInventoryPolicy::default(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Shop settings seeded into a fresh store.
    pub fn initial_settings(&self) -> ShopSettings {
        ShopSettings {
            default_tax_rate: self.default_tax_rate,
            default_labor_rate: self.default_labor_rate,
            negative_inventory_policy: self.negative_inventory_policy,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Loads configuration from `config/default`, `config/{RUN_ENV}`, and
/// `SHOP__`-prefixed environment variables, in that order of precedence.
pub fn load_config() -> Result<EngineConfig, EngineConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("default_tax_rate", DEFAULT_TAX_RATE_PERCENT)?
        .set_default("default_labor_rate", DEFAULT_LABOR_RATE)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("SHOP").separator("__"))
        .build()?;

    let engine_config: EngineConfig = config.try_deserialize()?;

    engine_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        EngineConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(engine_config)
}

fn default_tax_rate() -> Decimal {
    DEFAULT_TAX_RATE_PERCENT.parse().unwrap_or(Decimal::ZERO)
}

fn default_labor_rate() -> Decimal {
    DEFAULT_LABOR_RATE.parse().unwrap_or(Decimal::ZERO)
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn validate_percent(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("percent_out_of_range"));
    }
    Ok(())
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("negative_rate"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_tax_rate, dec!(8.25));
        assert_eq!(
            config.negative_inventory_policy,
            NegativeInventoryPolicy::Warn
        );
    }

    #[test]
    fn rejects_out_of_range_tax_rate() {
        let config = EngineConfig {
            default_tax_rate: dec!(150),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
