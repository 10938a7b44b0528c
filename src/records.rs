use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::types::{
    BillId, BillKind, BillStatus, DepositId, DepositKind, DepositStatus, DepositTxKind, PaymentId,
    PaymentMethod, RoomId, TenantId,
};

/// one billing period for one tenancy
///
/// Invariant: `total_amount = rent + electric_amount + water_amount +
/// extra_fee_amount + penalty_amount`, with the penalty added at most once
/// (guarded by `penalty_applied`). Mutated only by payment application until
/// it reaches `Paid`, at which point it is copied to history and deleted;
/// an active bill and its history row never coexist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub tenant_id: TenantId,
    pub room_id: RoomId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub rent_amount: Money,
    pub electric_previous: rust_decimal::Decimal,
    pub electric_current: rust_decimal::Decimal,
    pub electric_consumption: rust_decimal::Decimal,
    pub electric_rate: Money,
    pub electric_amount: Money,
    pub water_amount: Money,
    pub extra_fee_amount: Money,
    pub extra_fee_description: Option<String>,
    pub penalty_amount: Money,
    pub penalty_applied: bool,
    pub total_amount: Money,
    pub status: BillStatus,
    pub kind: BillKind,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    /// recompute the total from the charge components
    pub fn recompute_total(&mut self) {
        self.total_amount = self.rent_amount
            + self.electric_amount
            + self.water_amount
            + self.extra_fee_amount
            + self.penalty_amount;
    }

    /// balance still owed given the payments recorded so far
    pub fn remaining_balance(&self, payments: &[Payment]) -> Money {
        self.total_amount - payments.iter().map(|p| p.amount).sum()
    }

    /// the non-rent share of the charges: electric + water + extra fees + penalty
    pub fn other_portion(&self) -> Money {
        self.electric_amount + self.water_amount + self.extra_fee_amount + self.penalty_amount
    }
}

/// one funding event against exactly one bill
///
/// Never updated; deleted only in the same transaction that archives its
/// parent bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub bill_id: BillId,
    pub amount: Money,
    /// date the payer declared
    pub declared_date: NaiveDate,
    /// date the money actually arrived; may differ for backdated recording
    pub actual_date: NaiveDate,
    pub method: PaymentMethod,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// one of the two deposits a tenant can hold
///
/// Invariant: `0 <= remaining_balance <= initial_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantDeposit {
    pub id: DepositId,
    pub tenant_id: TenantId,
    pub kind: DepositKind,
    pub initial_amount: Money,
    pub remaining_balance: Money,
    pub status: DepositStatus,
}

impl TenantDeposit {
    /// a freshly funded, fully available deposit
    pub fn active(tenant_id: TenantId, kind: DepositKind, amount: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            kind,
            initial_amount: amount,
            remaining_balance: amount,
            status: DepositStatus::Active,
        }
    }

    /// whether the balance can still be drawn from
    pub fn is_available(&self) -> bool {
        self.status == DepositStatus::Active && self.remaining_balance.is_positive()
    }

    /// draw down the balance; marks the deposit used when it reaches zero
    pub fn debit(&mut self, amount: Money) -> Result<()> {
        if amount > self.remaining_balance {
            return Err(BillingError::InsufficientDeposit {
                available: self.remaining_balance,
                requested: amount,
            });
        }
        self.remaining_balance -= amount;
        if self.remaining_balance.is_zero() {
            self.status = DepositStatus::Used;
        }
        Ok(())
    }
}

/// append-only audit entry for every deposit movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositTransaction {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub bill_id: Option<BillId>,
    pub deposit_kind: DepositKind,
    pub tx_kind: DepositTxKind,
    pub amount: Money,
    pub recorded_at: DateTime<Utc>,
}

impl DepositTransaction {
    pub fn new(
        tenant_id: TenantId,
        bill_id: Option<BillId>,
        deposit_kind: DepositKind,
        tx_kind: DepositTxKind,
        amount: Money,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            bill_id,
            deposit_kind,
            tx_kind,
            amount,
            recorded_at,
        }
    }
}

/// an active tenancy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub room_id: RoomId,
    pub contract_start: NaiveDate,
    pub contract_end: NaiveDate,
    pub phone: Option<String>,
}

/// a rentable room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub label: String,
    pub monthly_rent: Money,
    /// last billed electricity meter reading
    pub meter_reading: rust_decimal::Decimal,
    /// occupying tenant, if any
    pub tenant_id: Option<TenantId>,
}

impl Room {
    pub fn is_vacant(&self) -> bool {
        self.tenant_id.is_none()
    }
}

/// write-once snapshot of a settled bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillHistory {
    pub bill: Bill,
    /// actual payment date of the most recent payment on the bill
    pub settled_on: NaiveDate,
    pub archived_at: DateTime<Utc>,
}

/// write-once snapshot of a payment whose bill was settled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHistory {
    pub payment: Payment,
    pub archived_at: DateTime<Utc>,
}

/// write-once snapshot of a departed tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantHistory {
    pub tenant: Tenant,
    pub departed_on: NaiveDate,
    pub contract_completed: bool,
    pub advance_refunded: Money,
    pub security_refunded: Money,
    pub security_forfeited: Money,
    pub archived_at: DateTime<Utc>,
}
