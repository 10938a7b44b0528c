pub mod allocation;
pub mod state_machine;

use chrono::NaiveDate;

use crate::decimal::Money;
use crate::types::PaymentMethod;

pub use allocation::{allocate, AllocationInput, DepositAllocation};
pub use state_machine::{decide_payment, PaymentDecision, PenaltyCharge};

/// a payment as requested by the caller, before any persistence
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInput {
    pub amount: Money,
    /// date the payer declared
    pub declared_date: NaiveDate,
    /// date the money actually arrived; drives penalty assessment
    pub actual_date: NaiveDate,
    pub method: PaymentMethod,
    pub note: Option<String>,
}

impl PaymentInput {
    pub fn cash(amount: Money, date: NaiveDate) -> Self {
        Self {
            amount,
            declared_date: date,
            actual_date: date,
            method: PaymentMethod::Cash,
            note: None,
        }
    }
}
