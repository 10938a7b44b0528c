use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a tenant
pub type TenantId = Uuid;

/// unique identifier for a room
pub type RoomId = Uuid;

/// unique identifier for a bill
pub type BillId = Uuid;

/// unique identifier for a payment
pub type PaymentId = Uuid;

/// unique identifier for a tenant deposit
pub type DepositId = Uuid;

/// bill lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillStatus {
    /// no payment recorded yet
    Unpaid,
    /// partially covered, balance remaining
    Partial,
    /// fully covered; terminal, the bill moves to history
    Paid,
}

impl BillStatus {
    /// whether the bill still carries a balance the tenant owes
    pub fn is_open(&self) -> bool {
        matches!(self, BillStatus::Unpaid | BillStatus::Partial)
    }
}

/// what kind of bill this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillKind {
    /// ordinary periodic bill
    Regular,
    /// final bill issued at move-out
    Final,
    /// negative-total bill, used when deposits exceed charges; constructed
    /// by the caller and driven through the normal payment lifecycle with
    /// negative payments
    Refund,
}

/// how a payment was funded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Check,
    AdvanceDeposit,
    SecurityDeposit,
    Other,
}

impl PaymentMethod {
    /// whether this payment draws down a tenant deposit balance
    pub fn deposit_kind(&self) -> Option<DepositKind> {
        match self {
            PaymentMethod::AdvanceDeposit => Some(DepositKind::Advance),
            PaymentMethod::SecurityDeposit => Some(DepositKind::Security),
            PaymentMethod::Cash
            | PaymentMethod::Transfer
            | PaymentMethod::Check
            | PaymentMethod::Other => None,
        }
    }
}

/// the two deposit kinds a tenant can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepositKind {
    /// pre-paid rent, usable against rent, refundable
    Advance,
    /// damage/default cover, forfeit on early termination
    Security,
}

/// deposit lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositStatus {
    /// agreed but not yet funded
    Unpaid,
    /// funded and available for allocation
    Active,
    /// balance fully consumed by allocations
    Used,
    /// remainder paid back to the tenant
    Refunded,
    /// closed out at departure (includes forfeited security)
    Archived,
}

/// audit entry kind for deposit movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositTxKind {
    /// balance applied against a bill
    Allocation,
    /// remainder returned to the tenant
    Refund,
    /// remainder kept on early termination
    Forfeiture,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_statuses() {
        assert!(BillStatus::Unpaid.is_open());
        assert!(BillStatus::Partial.is_open());
        assert!(!BillStatus::Paid.is_open());
    }

    #[test]
    fn test_deposit_funded_methods() {
        assert_eq!(
            PaymentMethod::AdvanceDeposit.deposit_kind(),
            Some(DepositKind::Advance)
        );
        assert_eq!(
            PaymentMethod::SecurityDeposit.deposit_kind(),
            Some(DepositKind::Security)
        );
        assert_eq!(PaymentMethod::Cash.deposit_kind(), None);
        assert_eq!(PaymentMethod::Transfer.deposit_kind(), None);
    }
}
