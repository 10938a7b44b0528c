use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::BillingConfig;
use crate::decimal::Money;
use crate::errors::{BillingError, Result};

/// the date range a single bill covers, inclusive of both endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BillingPeriod {
    /// create a period, rejecting `end < start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(BillingError::InvalidPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// number of days covered, counting both endpoints
    pub fn days(&self) -> u32 {
        (self.end - self.start).num_days() as u32 + 1
    }
}

/// monthly rent scaled to the period by elapsed days over a 30-day basis,
/// rounded to the nearest whole currency unit
///
/// The ratio is taken on raw decimals with a single final rounding; rounding
/// the quotient first would shift midpoint-adjacent results by a whole unit.
pub fn prorate_rent(monthly_rent: Money, period: BillingPeriod) -> Money {
    let exact = monthly_rent.as_decimal() * Decimal::from(period.days()) / Decimal::from(30);
    Money::from_decimal(exact.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}

/// consumed electricity units; a lower current reading clamps to zero
/// rather than erroring (meters get replaced)
pub fn electric_consumption(previous: Decimal, current: Decimal) -> Decimal {
    (current - previous).max(Decimal::ZERO)
}

/// raw inputs for one bill's charges
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeInputs {
    pub period: BillingPeriod,
    pub monthly_rent: Money,
    pub electric_previous: Decimal,
    pub electric_current: Decimal,
    pub extra_fee: Money,
    pub extra_fee_description: Option<String>,
}

/// computed charge breakdown for one billing period
///
/// The total here never includes a penalty; penalties are assessed at
/// payment time by the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillCharges {
    pub rent: Money,
    pub electric_consumption: Decimal,
    pub electric_rate: Money,
    pub electric_amount: Money,
    pub water_amount: Money,
    pub extra_fee: Money,
    pub total: Money,
}

impl BillCharges {
    /// compute all charges for a period; pure, no I/O
    pub fn compute(inputs: &ChargeInputs, config: &BillingConfig) -> Self {
        let rent = prorate_rent(inputs.monthly_rent, inputs.period);
        let consumption = electric_consumption(inputs.electric_previous, inputs.electric_current);
        let electric_amount = config.electric_rate_per_kwh * consumption;
        let total = rent + electric_amount + config.water_fixed_amount + inputs.extra_fee;

        Self {
            rent,
            electric_consumption: consumption,
            electric_rate: config.electric_rate_per_kwh,
            electric_amount,
            water_amount: config.water_fixed_amount,
            extra_fee: inputs.extra_fee,
            total,
        }
    }
}
