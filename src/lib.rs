pub mod billing;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod payments;
pub mod records;
pub mod settlement;
pub mod storage;
pub mod types;

// re-export key types
pub use decimal::{Money, Rate};
pub use errors::{BillingError, Result};
pub use events::{BillingEvent, EventStore};
pub use config::BillingConfig;
pub use billing::{BillCharges, BillingPeriod, ChargeInputs, PenaltyAssessment, PenaltyPolicy};
pub use payments::{
    allocate, decide_payment, AllocationInput, DepositAllocation, PaymentDecision, PaymentInput,
};
pub use records::{Bill, Payment, Room, Tenant, TenantDeposit};
pub use settlement::{
    CreateBill, DepartureOutcome, DepartureRequest, FinalBillInputs, PaymentReceipt, RecordPayment,
    SettlementEngine,
};
pub use storage::{BillingStore, MemoryStore, Tables, TxLock};
pub use types::{
    BillId, BillKind, BillStatus, DepositKind, DepositStatus, DepositTxKind, PaymentId,
    PaymentMethod, RoomId, TenantId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
