//! Departure reconciliation.
//!
//! Move-out computes the tenant's last bill (optional), lets the deposit
//! allocator distribute the available balances over it, applies those
//! allocations as deposit-funded payments, refunds or forfeits whatever is
//! left, and archives the tenancy. One transaction covers all of it. When
//! the final bill still carries a balance after allocation the tenant stays
//! active with the unpaid bill, to be resolved by a later payment.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use crate::billing::{BillingPeriod, PenaltyPolicy};
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::events::BillingEvent;
use crate::payments::{allocate, AllocationInput, PaymentInput};
use crate::storage::{BillingStore, TxLock};
use crate::types::{BillKind, BillStatus, DepositKind, PaymentMethod, TenantId};

use super::archival;
use super::{apply_payment, issue_bill, push_finalization_events, SettlementEngine};

/// inputs for the final prorated bill covering the unbilled remainder of the
/// current period
#[derive(Debug, Clone, PartialEq)]
pub struct FinalBillInputs {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub meter_current: Decimal,
    pub extra_fee: Money,
    pub extra_fee_description: Option<String>,
}

/// move-out request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DepartureRequest {
    /// synthesize a final bill for the unbilled remainder, if any
    pub final_bill: Option<FinalBillInputs>,
    /// skip the no-outstanding-bills pre-condition
    pub forced: bool,
}

/// what the tenant walks away with, and whether the tenancy closed
#[derive(Debug, Clone, PartialEq)]
pub struct DepartureOutcome {
    pub advance_refund: Money,
    pub security_refund: Money,
    /// balance the tenant still owes on the final bill; positive means the
    /// tenant was left active
    pub outstanding_balance: Money,
    pub archived: bool,
}

impl<S: BillingStore> SettlementEngine<S> {
    /// reconcile a tenant's move-out
    pub fn process_departure(
        &mut self,
        tenant_id: TenantId,
        request: DepartureRequest,
    ) -> Result<DepartureOutcome> {
        let now = self.time.now();
        let today = now.date_naive();
        let policy = PenaltyPolicy::from(&self.config);
        let config = &self.config;

        let final_period = match &request.final_bill {
            Some(inputs) => Some(BillingPeriod::new(inputs.period_start, inputs.period_end)?),
            None => None,
        };

        let mut pending = Vec::new();
        let outcome = self
            .store
            .in_transaction(TxLock::Tenant(tenant_id), |tables| {
                let tenant = tables.tenant(tenant_id)?.clone();

                let open_bills = tables.outstanding_bills_for(tenant_id);
                if !open_bills.is_empty() && !request.forced {
                    return Err(BillingError::OutstandingBills {
                        tenant_id,
                        count: open_bills.len(),
                    });
                }

                let contract_completed = today >= tenant.contract_end;

                // synthesize the final bill, if requested
                let final_bill = match (&request.final_bill, final_period) {
                    (Some(inputs), Some(period)) => {
                        let bill = issue_bill(
                            tables,
                            tenant_id,
                            tenant.room_id,
                            period,
                            inputs.meter_current,
                            inputs.extra_fee,
                            inputs.extra_fee_description.clone(),
                            BillKind::Final,
                            config,
                            now,
                        )?;
                        pending.push(BillingEvent::BillCreated {
                            bill_id: bill.id,
                            tenant_id,
                            total: bill.total_amount,
                            period_start: bill.period_start,
                            period_end: bill.period_end,
                            timestamp: now,
                        });
                        Some(bill)
                    }
                    _ => None,
                };

                // distribute the available deposit balances over the final bill
                let mut outstanding = Money::ZERO;
                if let Some(bill) = &final_bill {
                    let allocation = allocate(&AllocationInput {
                        rent_portion: bill.rent_amount,
                        other_portion: bill.other_portion(),
                        advance_balance: tables
                            .available_deposit_balance(tenant_id, DepositKind::Advance),
                        security_balance: tables
                            .available_deposit_balance(tenant_id, DepositKind::Security),
                        contract_completed,
                    });

                    for (amount, method) in [
                        (allocation.advance_used, PaymentMethod::AdvanceDeposit),
                        (allocation.security_used, PaymentMethod::SecurityDeposit),
                    ] {
                        if amount.is_positive() {
                            let applied = apply_payment(
                                tables,
                                bill.id,
                                &PaymentInput {
                                    amount,
                                    declared_date: today,
                                    actual_date: today,
                                    method,
                                    note: Some("departure reconciliation".to_string()),
                                },
                                &policy,
                                now,
                            )?;
                            pending.extend(applied.events);
                        }
                    }

                    // applying the first allocation can add a late penalty
                    // the allocator did not price in; the persisted bill is
                    // the authority on what is still owed
                    let persisted = tables.bill(bill.id)?.clone();
                    let remaining = persisted.remaining_balance(&tables.payments_for(bill.id));
                    if remaining > Money::TOLERANCE {
                        outstanding = remaining;
                    }
                }

                // an uncovered final bill keeps the tenancy open
                if outstanding.is_positive() {
                    return Ok(DepartureOutcome {
                        advance_refund: Money::ZERO,
                        security_refund: Money::ZERO,
                        outstanding_balance: outstanding,
                        archived: false,
                    });
                }

                let final_bill_id = final_bill.as_ref().map(|b| b.id);
                let finalization = archival::finalize_deposits(
                    tables,
                    tenant_id,
                    final_bill_id,
                    contract_completed,
                    now,
                );

                if let Some(bill_id) = final_bill_id {
                    // a zero-total final bill never saw a payment; close it
                    let payments = tables.payments_for(bill_id);
                    let bill = tables.bill_mut(bill_id)?;
                    if bill.status != BillStatus::Paid
                        && bill.remaining_balance(&payments).abs() <= Money::TOLERANCE
                    {
                        bill.status = BillStatus::Paid;
                    }
                    let total = bill.total_amount;
                    let settled_on = archival::settle_bill_into_history(tables, bill_id, now)?;
                    pending.push(BillingEvent::BillSettled {
                        bill_id,
                        total,
                        settled_on,
                        timestamp: now,
                    });
                }

                let room_id = archival::archive_tenant(
                    tables,
                    tenant_id,
                    today,
                    contract_completed,
                    &finalization,
                    request.forced,
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
                pending.push(BillingEvent::DepartureCompleted {
                    tenant_id,
                    advance_refund: finalization.advance_refunded,
                    security_refund: finalization.security_refunded,
                    timestamp: now,
                });

                Ok(DepartureOutcome {
                    advance_refund: finalization.advance_refunded,
                    security_refund: finalization.security_refunded,
                    outstanding_balance: Money::ZERO,
                    archived: true,
                })
            })?;

        info!(
            %tenant_id,
            archived = outcome.archived,
            outstanding = %outcome.outstanding_balance,
            "departure processed"
        );
        for event in pending {
            self.events.emit(event);
        }
        Ok(outcome)
    }
}
