use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::BillingConfig;
use crate::decimal::{Money, Rate};

/// late-payment penalty policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyPolicy {
    /// penalty as a percentage of the bill total
    pub percentage: Rate,
    /// days past the period end before penalties apply
    pub grace_days: u32,
}

impl PenaltyPolicy {
    pub fn new(percentage: Rate, grace_days: u32) -> Self {
        Self {
            percentage,
            grace_days,
        }
    }

    /// assess the penalty for a payment landing on `paid_on`
    ///
    /// The base is the pre-penalty bill total; the amount rounds to the
    /// nearest whole currency unit. Inside the grace window the assessment
    /// is zero.
    pub fn assess(
        &self,
        pre_penalty_total: Money,
        period_end: NaiveDate,
        paid_on: NaiveDate,
    ) -> PenaltyAssessment {
        let days_overdue = (paid_on - period_end).num_days().max(0) as u32;
        if days_overdue <= self.grace_days {
            return PenaltyAssessment {
                amount: Money::ZERO,
                days_overdue,
                grace_applied: true,
            };
        }

        PenaltyAssessment {
            amount: pre_penalty_total.percentage(self.percentage).round_whole(),
            days_overdue,
            grace_applied: false,
        }
    }
}

impl From<&BillingConfig> for PenaltyPolicy {
    fn from(config: &BillingConfig) -> Self {
        Self {
            percentage: config.penalty_fee_percentage,
            grace_days: config.payment_grace_days,
        }
    }
}

/// penalty assessment result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyAssessment {
    pub amount: Money,
    pub days_overdue: u32,
    pub grace_applied: bool,
}

impl PenaltyAssessment {
    /// whether the assessment actually charges anything
    pub fn is_charged(&self) -> bool {
        self.amount.is_positive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn policy() -> PenaltyPolicy {
        PenaltyPolicy::from(&BillingConfig::default())
    }

    #[test]
    fn test_on_time_payment_no_penalty() {
        let result = policy().assess(Money::from_major(4_162), date(2024, 1, 30), date(2024, 1, 30));
        assert_eq!(result.amount, Money::ZERO);
        assert!(result.grace_applied);
        assert_eq!(result.days_overdue, 0);
    }

    #[test]
    fn test_within_grace_no_penalty() {
        // 10 days late with a 10-day grace window
        let result = policy().assess(Money::from_major(4_162), date(2024, 1, 30), date(2024, 2, 9));
        assert_eq!(result.amount, Money::ZERO);
        assert!(result.grace_applied);
        assert_eq!(result.days_overdue, 10);
    }

    #[test]
    fn test_past_grace_charges_rounded_penalty() {
        // 11 days late, 1% of 4162 = 41.62 -> 42
        let result = policy().assess(Money::from_major(4_162), date(2024, 1, 30), date(2024, 2, 10));
        assert_eq!(result.amount, Money::from_major(42));
        assert!(!result.grace_applied);
        assert!(result.is_charged());
        assert_eq!(result.days_overdue, 11);
    }

    #[test]
    fn test_backdated_payment_not_overdue() {
        let result = policy().assess(Money::from_major(4_162), date(2024, 1, 30), date(2024, 1, 5));
        assert_eq!(result.days_overdue, 0);
        assert!(result.grace_applied);
    }
}
