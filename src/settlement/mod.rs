//! Settlement engine: the three operations exposed to callers.
//!
//! `create_bill` closes a billing period into a bill, `record_payment`
//! drives a bill through its lifecycle and archives it when it settles, and
//! `process_departure` reconciles a tenant's move-out. Every multi-statement
//! sequence runs inside one store transaction holding the bill's or tenant's
//! lock, so two concurrent settlements over the same records cannot
//! interleave; conflicts surface as retryable errors. Events collected
//! during an operation become visible only after the transaction commits.

pub mod archival;
pub mod departure;

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::billing::{BillCharges, BillingPeriod, ChargeInputs, PenaltyPolicy};
use crate::config::BillingConfig;
use crate::decimal::Money;
use crate::errors::Result;
use crate::events::{BillingEvent, EventStore};
use crate::payments::{decide_payment, PaymentInput};
use crate::records::{Bill, DepositTransaction, Payment, Tenant};
use crate::storage::{BillingStore, Tables, TxLock};
use crate::types::{BillId, BillKind, BillStatus, DepositTxKind, PaymentMethod, RoomId, TenantId};

pub use departure::{DepartureOutcome, DepartureRequest, FinalBillInputs};

/// request to close a billing period into a bill
#[derive(Debug, Clone, PartialEq)]
pub struct CreateBill {
    pub tenant_id: TenantId,
    pub room_id: RoomId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub meter_current: Decimal,
    pub extra_fee: Money,
    pub extra_fee_description: Option<String>,
}

/// request to record one payment against a bill
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPayment {
    pub bill_id: BillId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub declared_date: NaiveDate,
    pub actual_date: NaiveDate,
    pub note: Option<String>,
}

/// what `record_payment` hands back to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    /// the bill as persisted, or its final state if it was archived
    pub bill: Bill,
    pub payment: Payment,
    /// whether this payment settled the bill into history
    pub archived: bool,
}

/// the billing and deposit settlement engine
pub struct SettlementEngine<S: BillingStore> {
    store: S,
    config: BillingConfig,
    time: SafeTimeProvider,
    /// events from committed operations, drained by the caller
    pub events: EventStore,
}

impl<S: BillingStore> SettlementEngine<S> {
    pub fn new(store: S, config: BillingConfig, time: SafeTimeProvider) -> Self {
        Self {
            store,
            config,
            time,
            events: EventStore::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// close a billing period: compute charges and persist the bill
    pub fn create_bill(&mut self, request: CreateBill) -> Result<Bill> {
        let period = BillingPeriod::new(request.period_start, request.period_end)?;
        let now = self.time.now();
        let config = &self.config;

        let bill = self
            .store
            .in_transaction(TxLock::Tenant(request.tenant_id), |tables| {
                tables.tenant(request.tenant_id)?;
                issue_bill(
                    tables,
                    request.tenant_id,
                    request.room_id,
                    period,
                    request.meter_current,
                    request.extra_fee,
                    request.extra_fee_description.clone(),
                    BillKind::Regular,
                    config,
                    now,
                )
            })?;

        info!(bill_id = %bill.id, total = %bill.total_amount, "bill created");
        self.events.emit(BillingEvent::BillCreated {
            bill_id: bill.id,
            tenant_id: bill.tenant_id,
            total: bill.total_amount,
            period_start: bill.period_start,
            period_end: bill.period_end,
            timestamp: now,
        });
        Ok(bill)
    }

    /// apply one payment to a bill, settling and archiving it when paid
    pub fn record_payment(&mut self, request: RecordPayment) -> Result<PaymentReceipt> {
        let now = self.time.now();
        let today = now.date_naive();
        let policy = PenaltyPolicy::from(&self.config);
        let input = PaymentInput {
            amount: request.amount,
            declared_date: request.declared_date,
            actual_date: request.actual_date,
            method: request.method,
            note: request.note.clone(),
        };

        let mut pending = Vec::new();
        let receipt = self
            .store
            .in_transaction(TxLock::Bill(request.bill_id), |tables| {
                let applied = apply_payment(tables, request.bill_id, &input, &policy, now)?;
                pending.extend(applied.events);

                let mut bill = applied.bill;
                let archived = applied.settles;
                if archived {
                    let settled_on =
                        archival::settle_bill_into_history(tables, request.bill_id, now)?;
                    bill = tables
                        .bill_history_for(request.bill_id)
                        .map(|h| h.bill.clone())
                        .unwrap_or(bill);
                    pending.push(BillingEvent::BillSettled {
                        bill_id: bill.id,
                        total: bill.total_amount,
                        settled_on,
                        timestamp: now,
                    });

                    // a settled final bill completes the tenancy
                    if bill.kind == BillKind::Final {
                        let tenant = tables.tenant(bill.tenant_id)?.clone();
                        let contract_completed = today >= tenant.contract_end;
                        let finalization = archival::finalize_deposits(
                            tables,
                            tenant.id,
                            Some(bill.id),
                            contract_completed,
                            now,
                        );
                        let room_id = archival::archive_tenant(
                            tables,
                            tenant.id,
                            today,
                            contract_completed,
                            &finalization,
                            false,
                            now,
                        )?;
                        push_finalization_events(
                            &mut pending,
                            &tenant,
                            &finalization,
                            room_id,
                            today,
                            contract_completed,
                            now,
                        );
                    }
                }

                Ok(PaymentReceipt {
                    bill,
                    payment: applied.payment,
                    archived,
                })
            })?;

        info!(
            bill_id = %request.bill_id,
            amount = %request.amount,
            archived = receipt.archived,
            "payment recorded"
        );
        for event in pending {
            self.events.emit(event);
        }
        Ok(receipt)
    }
}

/// result of persisting one payment inside a transaction
pub(crate) struct AppliedPayment {
    pub bill: Bill,
    pub payment: Payment,
    pub settles: bool,
    pub events: Vec<BillingEvent>,
}

/// persist one payment: penalty, deposit debit, payment row, status
///
/// Shared by `record_payment` and departure reconciliation; archival is the
/// caller's responsibility.
pub(crate) fn apply_payment(
    tables: &mut Tables,
    bill_id: BillId,
    input: &PaymentInput,
    policy: &PenaltyPolicy,
    now: DateTime<Utc>,
) -> Result<AppliedPayment> {
    let bill = tables.bill(bill_id)?.clone();
    let existing = tables.payments_for(bill_id);
    let decision = decide_payment(&bill, &existing, input, policy)?;

    let mut events = Vec::new();

    if let Some(charge) = decision.penalty {
        let bill = tables.bill_mut(bill_id)?;
        bill.penalty_amount = charge.amount;
        bill.penalty_applied = true;
        bill.recompute_total();
        events.push(BillingEvent::PenaltyApplied {
            bill_id,
            amount: charge.amount,
            days_overdue: charge.days_overdue,
            new_total: decision.new_total,
            timestamp: now,
        });
    }

    // deposit-funded payments draw down the tenant's balance in the same
    // transaction; an overdraw aborts everything
    if let Some(kind) = input.method.deposit_kind() {
        let tenant_id = bill.tenant_id;
        let deposit = tables.deposit_mut(tenant_id, kind)?;
        deposit.debit(input.amount.abs())?;
        tables.record_deposit_transaction(DepositTransaction::new(
            tenant_id,
            Some(bill_id),
            kind,
            DepositTxKind::Allocation,
            input.amount.abs(),
            now,
        ));
        events.push(BillingEvent::DepositAllocated {
            tenant_id,
            bill_id,
            kind,
            amount: input.amount.abs(),
            timestamp: now,
        });
    }

    let payment = Payment {
        id: Uuid::new_v4(),
        bill_id,
        amount: input.amount,
        declared_date: input.declared_date,
        actual_date: input.actual_date,
        method: input.method,
        note: input.note.clone(),
        recorded_at: now,
    };
    tables.insert_payment(payment.clone());

    let bill = tables.bill_mut(bill_id)?;
    bill.status = decision.new_status;
    let bill = bill.clone();

    events.push(BillingEvent::PaymentReceived {
        bill_id,
        payment_id: payment.id,
        amount: payment.amount,
        new_status: decision.new_status,
        timestamp: now,
    });

    Ok(AppliedPayment {
        bill,
        payment,
        settles: decision.settles,
        events,
    })
}

/// compute charges for a period and persist the bill, advancing the room's
/// stored meter reading
#[allow(clippy::too_many_arguments)]
pub(crate) fn issue_bill(
    tables: &mut Tables,
    tenant_id: TenantId,
    room_id: RoomId,
    period: BillingPeriod,
    meter_current: Decimal,
    extra_fee: Money,
    extra_fee_description: Option<String>,
    kind: BillKind,
    config: &BillingConfig,
    now: DateTime<Utc>,
) -> Result<Bill> {
    let room = tables.room(room_id)?.clone();
    let inputs = ChargeInputs {
        period,
        monthly_rent: room.monthly_rent,
        electric_previous: room.meter_reading,
        electric_current: meter_current,
        extra_fee,
        extra_fee_description: extra_fee_description.clone(),
    };
    let charges = BillCharges::compute(&inputs, config);

    let bill = Bill {
        id: Uuid::new_v4(),
        tenant_id,
        room_id,
        period_start: period.start,
        period_end: period.end,
        rent_amount: charges.rent,
        electric_previous: room.meter_reading,
        electric_current: meter_current,
        electric_consumption: charges.electric_consumption,
        electric_rate: charges.electric_rate,
        electric_amount: charges.electric_amount,
        water_amount: charges.water_amount,
        extra_fee_amount: charges.extra_fee,
        extra_fee_description,
        penalty_amount: Money::ZERO,
        penalty_applied: false,
        total_amount: charges.total,
        status: BillStatus::Unpaid,
        kind,
        created_at: now,
    };
    tables.insert_bill(bill.clone());
    tables.room_mut(room_id)?.meter_reading = meter_current;

    Ok(bill)
}

/// emit the event trail for a completed tenancy
pub(crate) fn push_finalization_events(
    pending: &mut Vec<BillingEvent>,
    tenant: &Tenant,
    finalization: &archival::DepositFinalization,
    room_id: RoomId,
    departed_on: NaiveDate,
    contract_completed: bool,
    now: DateTime<Utc>,
) {
    if finalization.advance_refunded.is_positive() {
        pending.push(BillingEvent::DepositRefunded {
            tenant_id: tenant.id,
            kind: crate::types::DepositKind::Advance,
            amount: finalization.advance_refunded,
            timestamp: now,
        });
    }
    if finalization.security_refunded.is_positive() {
        pending.push(BillingEvent::DepositRefunded {
            tenant_id: tenant.id,
            kind: crate::types::DepositKind::Security,
            amount: finalization.security_refunded,
            timestamp: now,
        });
    }
    if finalization.security_forfeited.is_positive() {
        pending.push(BillingEvent::DepositForfeited {
            tenant_id: tenant.id,
            kind: crate::types::DepositKind::Security,
            amount: finalization.security_forfeited,
            timestamp: now,
        });
    }
    pending.push(BillingEvent::TenantArchived {
        tenant_id: tenant.id,
        departed_on,
        contract_completed,
        timestamp: now,
    });
    pending.push(BillingEvent::RoomReleased {
        room_id,
        timestamp: now,
    });
}
