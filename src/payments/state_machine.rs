//! Bill state machine.
//!
//! A bill moves `Unpaid -> Partial -> Paid` and never backward; `Paid` is
//! terminal and triggers archival. The decision function here is pure: it
//! inspects the bill, its payment history, and one new payment, and reports
//! what the caller must persist. Payments are never retracted.

use crate::billing::penalty::PenaltyPolicy;
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::records::{Bill, Payment};
use crate::types::BillStatus;

use super::PaymentInput;

/// penalty newly incurred by this payment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyCharge {
    pub amount: Money,
    pub days_overdue: u32,
}

/// outcome of applying one payment to a bill
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDecision {
    pub new_status: BillStatus,
    /// set only when this payment newly incurred the penalty
    pub penalty: Option<PenaltyCharge>,
    /// bill total after any penalty
    pub new_total: Money,
    /// sum of all payments including the new one
    pub total_paid: Money,
    /// whether settlement (archival) should fire
    pub settles: bool,
}

/// decide how a new payment changes a bill
///
/// Refund bills carry negative totals and take negative payments; all
/// balance comparisons there run on absolute values. A small tolerance
/// absorbs floating rounding in the sum check.
pub fn decide_payment(
    bill: &Bill,
    existing: &[Payment],
    new_payment: &PaymentInput,
    policy: &PenaltyPolicy,
) -> Result<PaymentDecision> {
    if bill.status == BillStatus::Paid {
        return Err(BillingError::Validation {
            message: format!("bill {} is already settled", bill.id),
        });
    }

    if new_payment.amount.is_zero() {
        return Err(BillingError::InvalidPaymentAmount {
            amount: new_payment.amount,
        });
    }

    // a refund bill is paid out, a charge bill is paid in; signs must agree
    let refund_bill = bill.total_amount.is_negative();
    if refund_bill != new_payment.amount.is_negative() {
        return Err(BillingError::InvalidPaymentAmount {
            amount: new_payment.amount,
        });
    }

    // penalty is assessed once, guarded by the applied flag
    let mut new_total = bill.total_amount;
    let mut penalty = None;
    if !bill.penalty_applied && !refund_bill {
        let assessment = policy.assess(bill.total_amount, bill.period_end, new_payment.actual_date);
        if assessment.is_charged() {
            new_total += assessment.amount;
            penalty = Some(PenaltyCharge {
                amount: assessment.amount,
                days_overdue: assessment.days_overdue,
            });
        }
    }

    let already_paid: Money = existing.iter().map(|p| p.amount).sum();
    let remaining = new_total - already_paid;
    if new_payment.amount.abs() > remaining.abs() + Money::TOLERANCE {
        return Err(BillingError::AmountExceedsBalance {
            remaining,
            requested: new_payment.amount,
        });
    }

    let total_paid = already_paid + new_payment.amount;
    let new_status = if total_paid.abs() >= new_total.abs() {
        BillStatus::Paid
    } else if !total_paid.is_zero() {
        BillStatus::Partial
    } else {
        BillStatus::Unpaid
    };

    Ok(PaymentDecision {
        new_status,
        penalty,
        new_total,
        total_paid,
        settles: new_status == BillStatus::Paid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BillingConfig;
    use crate::types::{BillKind, PaymentMethod};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_bill(total: i64) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 30),
            rent_amount: Money::from_major(3_500),
            electric_previous: dec!(100),
            electric_current: dec!(142),
            electric_consumption: dec!(42),
            electric_rate: Money::from_major(11),
            electric_amount: Money::from_major(462),
            water_amount: Money::from_major(200),
            extra_fee_amount: Money::ZERO,
            extra_fee_description: None,
            penalty_amount: Money::ZERO,
            penalty_applied: false,
            total_amount: Money::from_major(total),
            status: BillStatus::Unpaid,
            kind: BillKind::Regular,
            created_at: Utc::now(),
        }
    }

    fn payment_row(bill: &Bill, amount: i64) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            bill_id: bill.id,
            amount: Money::from_major(amount),
            declared_date: date(2024, 1, 30),
            actual_date: date(2024, 1, 30),
            method: PaymentMethod::Cash,
            note: None,
            recorded_at: Utc::now(),
        }
    }

    fn policy() -> PenaltyPolicy {
        PenaltyPolicy::from(&BillingConfig::default())
    }

    #[test]
    fn test_full_payment_on_time_settles() {
        let bill = sample_bill(4_162);
        let input = PaymentInput::cash(Money::from_major(4_162), date(2024, 1, 30));

        let decision = decide_payment(&bill, &[], &input, &policy()).unwrap();

        assert_eq!(decision.new_status, BillStatus::Paid);
        assert!(decision.settles);
        assert!(decision.penalty.is_none());
        assert_eq!(decision.new_total, Money::from_major(4_162));
        assert_eq!(decision.total_paid, Money::from_major(4_162));
    }

    #[test]
    fn test_late_payment_adds_penalty_and_leaves_partial() {
        // 11 days after period end with grace 10: penalty 1% of 4162 -> 42
        let bill = sample_bill(4_162);
        let input = PaymentInput::cash(Money::from_major(4_162), date(2024, 2, 10));

        let decision = decide_payment(&bill, &[], &input, &policy()).unwrap();

        let charge = decision.penalty.unwrap();
        assert_eq!(charge.amount, Money::from_major(42));
        assert_eq!(charge.days_overdue, 11);
        assert_eq!(decision.new_total, Money::from_major(4_204));
        assert_eq!(decision.new_status, BillStatus::Partial);
        assert!(!decision.settles);
    }

    #[test]
    fn test_penalty_not_applied_twice() {
        let mut bill = sample_bill(4_204);
        bill.penalty_amount = Money::from_major(42);
        bill.penalty_applied = true;
        bill.status = BillStatus::Partial;
        let existing = vec![payment_row(&bill, 4_162)];

        let input = PaymentInput::cash(Money::from_major(42), date(2024, 2, 20));
        let decision = decide_payment(&bill, &existing, &input, &policy()).unwrap();

        assert!(decision.penalty.is_none());
        assert_eq!(decision.new_total, Money::from_major(4_204));
        assert_eq!(decision.new_status, BillStatus::Paid);
    }

    #[test]
    fn test_overpayment_rejected() {
        let bill = sample_bill(4_162);
        let input = PaymentInput::cash(Money::from_major(5_000), date(2024, 1, 30));

        let err = decide_payment(&bill, &[], &input, &policy()).unwrap_err();
        assert!(matches!(err, BillingError::AmountExceedsBalance { .. }));
    }

    #[test]
    fn test_tolerance_absorbs_rounding() {
        let bill = sample_bill(4_162);
        let input = PaymentInput::cash(
            Money::from_str_exact("4162.01").unwrap(),
            date(2024, 1, 30),
        );
        let decision = decide_payment(&bill, &[], &input, &policy()).unwrap();
        assert_eq!(decision.new_status, BillStatus::Paid);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let bill = sample_bill(4_162);
        let input = PaymentInput::cash(Money::ZERO, date(2024, 1, 30));
        let err = decide_payment(&bill, &[], &input, &policy()).unwrap_err();
        assert!(matches!(err, BillingError::InvalidPaymentAmount { .. }));
    }

    #[test]
    fn test_paid_is_terminal() {
        let mut bill = sample_bill(4_162);
        bill.status = BillStatus::Paid;
        let input = PaymentInput::cash(Money::from_major(1), date(2024, 1, 30));
        let err = decide_payment(&bill, &[], &input, &policy()).unwrap_err();
        assert!(matches!(err, BillingError::Validation { .. }));
    }

    #[test]
    fn test_partial_then_paid_monotone() {
        let bill = sample_bill(4_162);
        let first = PaymentInput::cash(Money::from_major(2_000), date(2024, 1, 20));
        let decision = decide_payment(&bill, &[], &first, &policy()).unwrap();
        assert_eq!(decision.new_status, BillStatus::Partial);

        let existing = vec![payment_row(&bill, 2_000)];
        let second = PaymentInput::cash(Money::from_major(2_162), date(2024, 1, 25));
        let decision = decide_payment(&bill, &existing, &second, &policy()).unwrap();
        assert_eq!(decision.new_status, BillStatus::Paid);
    }

    #[test]
    fn test_refund_bill_takes_negative_payments_on_abs_values() {
        let mut bill = sample_bill(0);
        bill.kind = BillKind::Refund;
        bill.total_amount = Money::from_major(-800);

        // positive payment against a refund bill is a sign mismatch
        let wrong = PaymentInput::cash(Money::from_major(800), date(2024, 1, 30));
        assert!(decide_payment(&bill, &[], &wrong, &policy()).is_err());

        let payout = PaymentInput::cash(Money::from_major(-800), date(2024, 1, 30));
        let decision = decide_payment(&bill, &[], &payout, &policy()).unwrap();
        assert_eq!(decision.new_status, BillStatus::Paid);
        assert!(decision.penalty.is_none());

        // exceeding the refund's magnitude is rejected
        let too_much = PaymentInput::cash(Money::from_major(-900), date(2024, 1, 30));
        let err = decide_payment(&bill, &[], &too_much, &policy()).unwrap_err();
        assert!(matches!(err, BillingError::AmountExceedsBalance { .. }));
    }
}
