//! Balance gate: skip a swap the wallet cannot fund.

use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    /// Not enough balance; carries how much is missing.
    Skip { shortfall: Decimal },
}

pub struct BalanceGate;

impl BalanceGate {
    /// Compare a cached balance against the amount about to be spent.
    pub fn check(balance: Decimal, amount: Decimal) -> GateDecision {
        if balance >= amount {
            GateDecision::Proceed
        } else {
            GateDecision::Skip {
                shortfall: amount - balance,
            }
        }
    }
}
