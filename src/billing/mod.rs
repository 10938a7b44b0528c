pub mod calculator;
pub mod penalty;

pub use calculator::{
    electric_consumption, prorate_rent, BillCharges, BillingPeriod, ChargeInputs,
};
pub use penalty::{PenaltyAssessment, PenaltyPolicy};
