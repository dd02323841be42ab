//! Router allowance management.
//!
//! Before a token is spent, the router must be allowed to move it. When the
//! current allowance is short, the wallet grants the router an unlimited
//! allowance once, so later cycles skip the approval entirely. That grant is
//! a standing trust decision in favour of the router contract.

use ethers::types::{Address, U256};
use tracing::{info, warn};

use super::executor::TransactionExecutor;
use crate::error::SwapError;
use crate::ledger::LedgerCall;

pub struct ApprovalGuard;

impl ApprovalGuard {
    /// Make sure `spender` may move at least `needed` of `token` for `owner`.
    /// Returns `true` when an approval had to be submitted.
    pub async fn ensure_allowance(
        executor: &TransactionExecutor,
        token: Address,
        owner: Address,
        spender: Address,
        needed: U256,
    ) -> Result<bool, SwapError> {
        let current = executor
            .ledger()
            .allowance(token, owner, spender)
            .await
            .map_err(SwapError::AllowanceUnreadable)?;

        if current >= needed {
            return Ok(false);
        }

        warn!(
            token = ?token,
            allowance = %current,
            needed = %needed,
            "Allowance insufficient, approving router"
        );
        let receipt = executor
            .submit("approve", |_nonce| LedgerCall::Approve {
                token,
                spender,
                amount: U256::MAX,
            })
            .await
            .map_err(SwapError::ApprovalFailed)?;

        info!(token = ?token, hash = ?receipt.hash, "Router approved");
        Ok(true)
    }
}
