//! Deposit allocator.
//!
//! Distributes a tenant's available deposit balances across a bill's charge
//! categories in a fixed order: advance deposit against rent first, then,
//! only when the contract ran to completion, security deposit against the
//! remaining charges. On early termination the security balance is neither
//! applied nor refunded here; departure reconciliation forfeits it. Pure and
//! deterministic for identical inputs.

use serde::{Deserialize, Serialize};

use crate::decimal::Money;

/// what the allocator needs to know about a bill and the tenant's funds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationInput {
    /// the bill's rent share
    pub rent_portion: Money,
    /// everything else: electric + water + extra fees + penalty
    pub other_portion: Money,
    pub advance_balance: Money,
    pub security_balance: Money,
    pub contract_completed: bool,
}

/// how the deposits were distributed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepositAllocation {
    pub advance_used: Money,
    pub security_used: Money,
    /// what the tenant must still pay after both deposits
    pub outstanding_balance: Money,
    /// leftover advance, refundable regardless of termination mode
    pub advance_refundable: Money,
    /// leftover security, refundable only on contract completion
    pub security_refundable: Money,
}

impl DepositAllocation {
    pub fn total_used(&self) -> Money {
        self.advance_used + self.security_used
    }
}

/// distribute deposit funds across the bill's charge categories
pub fn allocate(input: &AllocationInput) -> DepositAllocation {
    // advance covers rent only
    let advance_used = input.advance_balance.min(input.rent_portion).max(Money::ZERO);
    let rent_shortfall = input.rent_portion - advance_used;

    // security covers the rest, and any rent shortfall, but only when the
    // contract ran to completion
    let security_used = if input.contract_completed {
        input
            .security_balance
            .min(rent_shortfall + input.other_portion)
            .max(Money::ZERO)
    } else {
        Money::ZERO
    };

    let outstanding_balance = rent_shortfall + input.other_portion - security_used;
    let advance_refundable = input.advance_balance - advance_used;
    let security_refundable = if input.contract_completed {
        input.security_balance - security_used
    } else {
        Money::ZERO
    };

    DepositAllocation {
        advance_used,
        security_used,
        outstanding_balance,
        advance_refundable,
        security_refundable,
    }
}
