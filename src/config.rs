use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};

/// billing configuration
///
/// Recognized options consumed from an external settings store. Every field
/// has a documented default used when the store carries no value; the engine
/// never hard-codes these amounts anywhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// charge per consumed electricity unit (default 11.00)
    pub electric_rate_per_kwh: Money,
    /// fixed water charge per billing period (default 200.00)
    pub water_fixed_amount: Money,
    /// late-payment penalty, percentage of the bill total (default 1%)
    pub penalty_fee_percentage: Rate,
    /// days past the period end before the penalty applies (default 10)
    pub payment_grace_days: u32,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            electric_rate_per_kwh: Money::from_decimal(dec!(11.0)),
            water_fixed_amount: Money::from_decimal(dec!(200.0)),
            penalty_fee_percentage: Rate::from_percentage(1),
            payment_grace_days: 10,
        }
    }
}

impl BillingConfig {
    /// configuration with explicit values for every option
    pub fn new(
        electric_rate_per_kwh: Money,
        water_fixed_amount: Money,
        penalty_fee_percentage: Rate,
        payment_grace_days: u32,
    ) -> Self {
        Self {
            electric_rate_per_kwh,
            water_fixed_amount,
            penalty_fee_percentage,
            payment_grace_days,
        }
    }
}
