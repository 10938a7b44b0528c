use chrono::NaiveDate;
use thiserror::Error;

use crate::decimal::Money;
use crate::types::{BillId, DepositKind, RoomId, TenantId};

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("invalid billing period: start {start}, end {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount { amount: Money },

    #[error("payment exceeds remaining balance: remaining {remaining}, requested {requested}")]
    AmountExceedsBalance {
        remaining: Money,
        requested: Money,
    },

    #[error("bill not found: {id}")]
    BillNotFound { id: BillId },

    #[error("tenant not found: {id}")]
    TenantNotFound { id: TenantId },

    #[error("room not found: {id}")]
    RoomNotFound { id: RoomId },

    #[error("no {kind:?} deposit for tenant {tenant_id}")]
    DepositNotFound {
        tenant_id: TenantId,
        kind: DepositKind,
    },

    #[error("insufficient deposit: available {available}, requested {requested}")]
    InsufficientDeposit {
        available: Money,
        requested: Money,
    },

    #[error("transaction conflict: {message}")]
    TransactionConflict { message: String },

    #[error("archival invariant violation: {message}")]
    ArchivalInvariantViolation { message: String },

    #[error("tenant {tenant_id} has {count} outstanding bill(s)")]
    OutstandingBills { tenant_id: TenantId, count: usize },

    #[error("validation error: {message}")]
    Validation { message: String },
}

impl BillingError {
    /// whether the caller should retry the whole operation with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::TransactionConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
