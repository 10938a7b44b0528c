//! Archival moves shared by payment settlement and departure reconciliation.
//!
//! Everything here runs inside a caller-owned transaction; these helpers
//! mutate the working copy and report what happened, and any error rolls the
//! whole transaction back. A bill that is not `Paid`, or a tenant that still
//! owes money, is a programming fault surfaced as
//! [`BillingError::ArchivalInvariantViolation`].

use chrono::{DateTime, NaiveDate, Utc};

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::records::{BillHistory, DepositTransaction, PaymentHistory, TenantHistory};
use crate::storage::Tables;
use crate::types::{BillId, BillStatus, DepositKind, DepositStatus, DepositTxKind, RoomId, TenantId};

/// move a paid bill and its payments into history, deleting the active rows
///
/// Returns the settlement date: the actual payment date of the most recent
/// payment, or today when the bill needed no payments at all.
pub(crate) fn settle_bill_into_history(
    tables: &mut Tables,
    bill_id: BillId,
    now: DateTime<Utc>,
) -> Result<NaiveDate> {
    let bill = tables.bill(bill_id)?.clone();
    if bill.status != BillStatus::Paid {
        return Err(BillingError::ArchivalInvariantViolation {
            message: format!("bill {} archived while {:?}", bill.id, bill.status),
        });
    }

    let payments = tables.remove_payments_for(bill_id);
    let settled_on = payments
        .iter()
        .map(|p| p.actual_date)
        .max()
        .unwrap_or_else(|| now.date_naive());

    for payment in payments {
        tables.payment_history.push(PaymentHistory {
            payment,
            archived_at: now,
        });
    }

    let bill = tables.remove_bill(bill_id)?;
    tables.bill_history.push(BillHistory {
        bill,
        settled_on,
        archived_at: now,
    });

    Ok(settled_on)
}

/// final disposition of a departing tenant's deposit balances
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct DepositFinalization {
    pub advance_refunded: Money,
    pub security_refunded: Money,
    pub security_forfeited: Money,
}

/// refund or forfeit whatever is left on the tenant's deposits
///
/// Leftover advance is always refunded. Leftover security is refunded on
/// contract completion and forfeited on early termination. Every movement
/// gets an append-only [`DepositTransaction`].
pub(crate) fn finalize_deposits(
    tables: &mut Tables,
    tenant_id: TenantId,
    bill_id: Option<BillId>,
    contract_completed: bool,
    now: DateTime<Utc>,
) -> DepositFinalization {
    let mut outcome = DepositFinalization::default();
    let mut audit = Vec::new();

    for deposit in tables
        .tenant_deposits
        .iter_mut()
        .filter(|d| d.tenant_id == tenant_id)
    {
        let leftover = deposit.remaining_balance;
        match deposit.kind {
            DepositKind::Advance => {
                if leftover.is_positive() {
                    outcome.advance_refunded = leftover;
                    deposit.remaining_balance = Money::ZERO;
                    deposit.status = DepositStatus::Refunded;
                    audit.push((DepositKind::Advance, DepositTxKind::Refund, leftover));
                } else {
                    deposit.status = DepositStatus::Archived;
                }
            }
            DepositKind::Security => {
                if leftover.is_positive() && contract_completed {
                    outcome.security_refunded = leftover;
                    deposit.remaining_balance = Money::ZERO;
                    deposit.status = DepositStatus::Refunded;
                    audit.push((DepositKind::Security, DepositTxKind::Refund, leftover));
                } else if leftover.is_positive() {
                    outcome.security_forfeited = leftover;
                    deposit.remaining_balance = Money::ZERO;
                    deposit.status = DepositStatus::Archived;
                    audit.push((DepositKind::Security, DepositTxKind::Forfeiture, leftover));
                } else {
                    deposit.status = DepositStatus::Archived;
                }
            }
        }
    }

    for (kind, tx_kind, amount) in audit {
        tables.record_deposit_transaction(DepositTransaction::new(
            tenant_id, bill_id, kind, tx_kind, amount, now,
        ));
    }

    outcome
}

/// snapshot the tenant to history, release the room, remove the tenant
///
/// `allow_outstanding` is set only for forced departures; otherwise a tenant
/// with open bills cannot be archived.
pub(crate) fn archive_tenant(
    tables: &mut Tables,
    tenant_id: TenantId,
    departed_on: NaiveDate,
    contract_completed: bool,
    finalization: &DepositFinalization,
    allow_outstanding: bool,
    now: DateTime<Utc>,
) -> Result<RoomId> {
    let outstanding = tables.outstanding_bills_for(tenant_id);
    if !outstanding.is_empty() && !allow_outstanding {
        return Err(BillingError::ArchivalInvariantViolation {
            message: format!(
                "tenant {} archived with {} outstanding bill(s)",
                tenant_id,
                outstanding.len()
            ),
        });
    }

    let tenant = tables.remove_tenant(tenant_id)?;
    let room_id = tenant.room_id;

    tables.tenant_history.push(TenantHistory {
        tenant,
        departed_on,
        contract_completed,
        advance_refunded: finalization.advance_refunded,
        security_refunded: finalization.security_refunded,
        security_forfeited: finalization.security_forfeited,
        archived_at: now,
    });

    let room = tables.room_mut(room_id)?;
    room.tenant_id = None;

    Ok(room_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Bill, Payment, Room, Tenant, TenantDeposit};
    use crate::types::{BillKind, PaymentMethod};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn paid_bill(tenant_id: TenantId, room_id: RoomId) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            tenant_id,
            room_id,
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
            total_amount: Money::from_major(4_162),
            status: BillStatus::Paid,
            kind: BillKind::Regular,
            created_at: Utc::now(),
        }
    }

    fn seeded(bill_status: BillStatus) -> (Tables, BillId) {
        let mut tables = Tables::default();
        let tenant_id = Uuid::new_v4();
        let room_id = Uuid::new_v4();
        let mut bill = paid_bill(tenant_id, room_id);
        bill.status = bill_status;
        let bill_id = bill.id;
        tables.insert_bill(bill);
        tables.insert_payment(Payment {
            id: Uuid::new_v4(),
            bill_id,
            amount: Money::from_major(4_162),
            declared_date: date(2024, 1, 28),
            actual_date: date(2024, 1, 29),
            method: PaymentMethod::Cash,
            note: None,
            recorded_at: Utc::now(),
        });
        (tables, bill_id)
    }

    #[test]
    fn test_settle_moves_bill_and_payments() {
        let (mut tables, bill_id) = seeded(BillStatus::Paid);

        let settled_on = settle_bill_into_history(&mut tables, bill_id, Utc::now()).unwrap();

        assert_eq!(settled_on, date(2024, 1, 29));
        assert!(tables.bills.is_empty());
        assert!(tables.payments.is_empty());
        assert!(tables.bill_history_for(bill_id).is_some());
        assert_eq!(tables.payment_history_for(bill_id).len(), 1);
    }

    #[test]
    fn test_settle_refuses_unpaid_bill() {
        let (mut tables, bill_id) = seeded(BillStatus::Partial);

        let err = settle_bill_into_history(&mut tables, bill_id, Utc::now()).unwrap_err();
        assert!(matches!(err, BillingError::ArchivalInvariantViolation { .. }));
    }

    #[test]
    fn test_finalize_early_termination_forfeits_security() {
        let mut tables = Tables::default();
        let tenant_id = Uuid::new_v4();
        tables.insert_deposit(TenantDeposit::active(
            tenant_id,
            DepositKind::Advance,
            Money::from_major(1_000),
        ));
        tables.insert_deposit(TenantDeposit::active(
            tenant_id,
            DepositKind::Security,
            Money::from_major(2_000),
        ));

        let outcome = finalize_deposits(&mut tables, tenant_id, None, false, Utc::now());

        assert_eq!(outcome.advance_refunded, Money::from_major(1_000));
        assert_eq!(outcome.security_refunded, Money::ZERO);
        assert_eq!(outcome.security_forfeited, Money::from_major(2_000));
        assert_eq!(tables.deposit_transactions.len(), 2);
        assert_eq!(
            tables.deposit(tenant_id, DepositKind::Security).unwrap().status,
            DepositStatus::Archived
        );
        assert_eq!(
            tables.deposit(tenant_id, DepositKind::Advance).unwrap().status,
            DepositStatus::Refunded
        );
    }

    #[test]
    fn test_finalize_completed_contract_refunds_both() {
        let mut tables = Tables::default();
        let tenant_id = Uuid::new_v4();
        tables.insert_deposit(TenantDeposit::active(
            tenant_id,
            DepositKind::Security,
            Money::from_major(1_338),
        ));

        let outcome = finalize_deposits(&mut tables, tenant_id, None, true, Utc::now());

        assert_eq!(outcome.security_refunded, Money::from_major(1_338));
        assert_eq!(outcome.security_forfeited, Money::ZERO);
    }

    #[test]
    fn test_archive_tenant_refuses_outstanding_bills() {
        let (mut tables, _bill_id) = seeded(BillStatus::Partial);
        let tenant_id = tables.bills.values().next().unwrap().tenant_id;
        let room_id = tables.bills.values().next().unwrap().room_id;
        tables.insert_tenant(Tenant {
            id: tenant_id,
            name: "tenant".to_string(),
            room_id,
            contract_start: date(2023, 1, 1),
            contract_end: date(2024, 1, 30),
            phone: None,
        });
        tables.insert_room(Room {
            id: room_id,
            label: "101".to_string(),
            monthly_rent: Money::from_major(3_500),
            meter_reading: dec!(142),
            tenant_id: Some(tenant_id),
        });

        let err = archive_tenant(
            &mut tables,
            tenant_id,
            date(2024, 1, 31),
            true,
            &DepositFinalization::default(),
            false,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, BillingError::ArchivalInvariantViolation { .. }));

        // forced departures may archive anyway
        let room_id = archive_tenant(
            &mut tables,
            tenant_id,
            date(2024, 1, 31),
            true,
            &DepositFinalization::default(),
            true,
            Utc::now(),
        )
        .unwrap();
        assert!(tables.room(room_id).unwrap().is_vacant());
        assert!(tables.tenant_history_for(tenant_id).is_some());
    }
}
