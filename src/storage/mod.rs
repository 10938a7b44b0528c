//! Storage access for the engine.
//!
//! Engine operations never touch a global connection; they are injected with
//! a [`BillingStore`] and do all multi-statement work inside
//! [`BillingStore::in_transaction`], which is all-or-nothing: the closure
//! sees a working copy of the data, `Ok` commits it, `Err` discards it.
//! [`Tables`] is the typed query/command layer, so the atomicity boundary is
//! explicit in code rather than implied by adjacent statements.

pub mod memory;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::records::{
    Bill, BillHistory, DepositTransaction, Payment, PaymentHistory, Room, Tenant, TenantDeposit,
    TenantHistory,
};
use crate::types::{BillId, DepositKind, PaymentId, RoomId, TenantId};

pub use memory::MemoryStore;

/// lock key for a settlement transaction
///
/// At most one committed transaction per key may be in flight at a time,
/// mirroring `SELECT ... FOR UPDATE` row locking on the bill or tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxLock {
    Bill(BillId),
    Tenant(TenantId),
}

/// store abstraction injected into every engine operation
pub trait BillingStore {
    /// run a read-only closure against the current data
    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R
    where
        Self: Sized;

    /// run a closure inside one atomic transaction holding `lock`
    ///
    /// A concurrent transaction on the same key fails with
    /// [`BillingError::TransactionConflict`]; the caller retries with
    /// backoff. Any `Err` from the closure rolls everything back.
    fn in_transaction<R>(&self, lock: TxLock, f: impl FnOnce(&mut Tables) -> Result<R>) -> Result<R>
    where
        Self: Sized;
}

/// test fixtures share a store between the engine and direct lock probes
#[cfg(test)]
impl<S: BillingStore> BillingStore for std::sync::Arc<S> {
    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        (**self).read(f)
    }

    fn in_transaction<R>(&self, lock: TxLock, f: impl FnOnce(&mut Tables) -> Result<R>) -> Result<R> {
        (**self).in_transaction(lock, f)
    }
}

/// the persisted dataset: active records plus immutable history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    pub bills: HashMap<BillId, Bill>,
    pub payments: HashMap<PaymentId, Payment>,
    pub tenant_deposits: Vec<TenantDeposit>,
    pub deposit_transactions: Vec<DepositTransaction>,
    pub tenants: HashMap<TenantId, Tenant>,
    pub rooms: HashMap<RoomId, Room>,
    pub bill_history: Vec<BillHistory>,
    pub payment_history: Vec<PaymentHistory>,
    pub tenant_history: Vec<TenantHistory>,
}

impl Tables {
    pub fn bill(&self, id: BillId) -> Result<&Bill> {
        self.bills.get(&id).ok_or(BillingError::BillNotFound { id })
    }

    pub fn bill_mut(&mut self, id: BillId) -> Result<&mut Bill> {
        self.bills
            .get_mut(&id)
            .ok_or(BillingError::BillNotFound { id })
    }

    pub fn tenant(&self, id: TenantId) -> Result<&Tenant> {
        self.tenants
            .get(&id)
            .ok_or(BillingError::TenantNotFound { id })
    }

    pub fn room(&self, id: RoomId) -> Result<&Room> {
        self.rooms.get(&id).ok_or(BillingError::RoomNotFound { id })
    }

    pub fn room_mut(&mut self, id: RoomId) -> Result<&mut Room> {
        self.rooms
            .get_mut(&id)
            .ok_or(BillingError::RoomNotFound { id })
    }

    /// all payments recorded against a bill
    pub fn payments_for(&self, bill_id: BillId) -> Vec<Payment> {
        let mut rows: Vec<Payment> = self
            .payments
            .values()
            .filter(|p| p.bill_id == bill_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.recorded_at);
        rows
    }

    /// the tenant's deposit of the given kind, whatever its status
    pub fn deposit(&self, tenant_id: TenantId, kind: DepositKind) -> Result<&TenantDeposit> {
        self.tenant_deposits
            .iter()
            .find(|d| d.tenant_id == tenant_id && d.kind == kind)
            .ok_or(BillingError::DepositNotFound { tenant_id, kind })
    }

    pub fn deposit_mut(
        &mut self,
        tenant_id: TenantId,
        kind: DepositKind,
    ) -> Result<&mut TenantDeposit> {
        self.tenant_deposits
            .iter_mut()
            .find(|d| d.tenant_id == tenant_id && d.kind == kind)
            .ok_or(BillingError::DepositNotFound { tenant_id, kind })
    }

    /// available balance of a deposit kind, zero when absent or not active
    pub fn available_deposit_balance(&self, tenant_id: TenantId, kind: DepositKind) -> Money {
        self.deposit(tenant_id, kind)
            .ok()
            .filter(|d| d.is_available())
            .map(|d| d.remaining_balance)
            .unwrap_or(Money::ZERO)
    }

    /// active bills still carrying a balance for the tenant
    pub fn outstanding_bills_for(&self, tenant_id: TenantId) -> Vec<BillId> {
        self.bills
            .values()
            .filter(|b| b.tenant_id == tenant_id && b.status.is_open())
            .map(|b| b.id)
            .collect()
    }

    pub fn insert_bill(&mut self, bill: Bill) {
        self.bills.insert(bill.id, bill);
    }

    pub fn insert_payment(&mut self, payment: Payment) {
        self.payments.insert(payment.id, payment);
    }

    pub fn insert_deposit(&mut self, deposit: TenantDeposit) {
        self.tenant_deposits.push(deposit);
    }

    /// append-only; deposit transactions are never mutated or deleted
    pub fn record_deposit_transaction(&mut self, tx: DepositTransaction) {
        self.deposit_transactions.push(tx);
    }

    pub fn insert_tenant(&mut self, tenant: Tenant) {
        self.tenants.insert(tenant.id, tenant);
    }

    pub fn insert_room(&mut self, room: Room) {
        self.rooms.insert(room.id, room);
    }

    pub fn remove_bill(&mut self, id: BillId) -> Result<Bill> {
        self.bills
            .remove(&id)
            .ok_or(BillingError::BillNotFound { id })
    }

    /// delete every payment of a bill, returning the removed rows
    pub fn remove_payments_for(&mut self, bill_id: BillId) -> Vec<Payment> {
        let ids: Vec<PaymentId> = self
            .payments
            .values()
            .filter(|p| p.bill_id == bill_id)
            .map(|p| p.id)
            .collect();
        ids.iter()
            .filter_map(|id| self.payments.remove(id))
            .collect()
    }

    pub fn remove_tenant(&mut self, id: TenantId) -> Result<Tenant> {
        self.tenants
            .remove(&id)
            .ok_or(BillingError::TenantNotFound { id })
    }

    /// history row for a bill id, if the bill was settled
    pub fn bill_history_for(&self, bill_id: BillId) -> Option<&BillHistory> {
        self.bill_history.iter().find(|h| h.bill.id == bill_id)
    }

    pub fn payment_history_for(&self, bill_id: BillId) -> Vec<&PaymentHistory> {
        self.payment_history
            .iter()
            .filter(|h| h.payment.bill_id == bill_id)
            .collect()
    }

    pub fn tenant_history_for(&self, tenant_id: TenantId) -> Option<&TenantHistory> {
        self.tenant_history.iter().find(|h| h.tenant.id == tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::records::TenantDeposit;
    use crate::types::DepositStatus;
    use uuid::Uuid;

    #[test]
    fn test_missing_rows_are_not_found_errors() {
        let tables = Tables::default();
        let id = Uuid::new_v4();
        assert!(matches!(
            tables.bill(id).unwrap_err(),
            BillingError::BillNotFound { .. }
        ));
        assert!(matches!(
            tables.tenant(id).unwrap_err(),
            BillingError::TenantNotFound { .. }
        ));
        assert!(matches!(
            tables.deposit(id, DepositKind::Advance).unwrap_err(),
            BillingError::DepositNotFound { .. }
        ));
    }

    #[test]
    fn test_available_balance_ignores_non_active_deposits() {
        let mut tables = Tables::default();
        let tenant_id = Uuid::new_v4();
        let mut deposit =
            TenantDeposit::active(tenant_id, DepositKind::Security, Money::from_major(2_000));
        deposit.status = DepositStatus::Refunded;
        tables.insert_deposit(deposit);

        assert_eq!(
            tables.available_deposit_balance(tenant_id, DepositKind::Security),
            Money::ZERO
        );
    }
}
