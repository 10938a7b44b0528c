use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{BillId, BillStatus, DepositKind, PaymentId, RoomId, TenantId};

/// all events that can be emitted by the engine
///
/// Events are collected during an operation and drained by the caller after
/// the transaction commits; notification side effects (email, PDF delivery)
/// hang off this seam and can never roll a settlement back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BillingEvent {
    BillCreated {
        bill_id: BillId,
        tenant_id: TenantId,
        total: Money,
        period_start: NaiveDate,
        period_end: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    PaymentReceived {
        bill_id: BillId,
        payment_id: PaymentId,
        amount: Money,
        new_status: BillStatus,
        timestamp: DateTime<Utc>,
    },
    PenaltyApplied {
        bill_id: BillId,
        amount: Money,
        days_overdue: u32,
        new_total: Money,
        timestamp: DateTime<Utc>,
    },
    BillSettled {
        bill_id: BillId,
        total: Money,
        settled_on: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    DepositAllocated {
        tenant_id: TenantId,
        bill_id: BillId,
        kind: DepositKind,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    DepositRefunded {
        tenant_id: TenantId,
        kind: DepositKind,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    DepositForfeited {
        tenant_id: TenantId,
        kind: DepositKind,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    TenantArchived {
        tenant_id: TenantId,
        departed_on: NaiveDate,
        contract_completed: bool,
        timestamp: DateTime<Utc>,
    },
    RoomReleased {
        room_id: RoomId,
        timestamp: DateTime<Utc>,
    },
    DepartureCompleted {
        tenant_id: TenantId,
        advance_refund: Money,
        security_refund: Money,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<BillingEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: BillingEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<BillingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[BillingEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
