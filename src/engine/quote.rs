//! Router quotes and the slippage-bounded minimum output.

use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::debug;

use crate::error::SwapError;
use crate::ledger::LedgerClient;

/// Fixed slippage tolerance in basis points (5%).
pub const SLIPPAGE_BPS: u32 = 500;

const BPS_DENOMINATOR: u32 = 10_000;

pub struct QuoteService {
    ledger: Arc<dyn LedgerClient>,
}

impl QuoteService {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Expected output for `amount_in` along `path`, in output-token units.
    pub async fn quote(&self, path: &[Address], amount_in: U256) -> Result<U256, SwapError> {
        let amounts = self
            .ledger
            .amounts_out(amount_in, path.to_vec())
            .await
            .map_err(|e| SwapError::QuoteUnavailable(e.to_string()))?;

        match amounts.last() {
            Some(out) if !out.is_zero() => {
                debug!(amount_in = %amount_in, amount_out = %out, "Quote received");
                Ok(*out)
            }
            Some(_) => Err(SwapError::QuoteUnavailable("router quoted zero output".into())),
            None => Err(SwapError::QuoteUnavailable("router returned no amounts".into())),
        }
    }

    /// `amount_out * (10000 - bps) / 10000`, rounded down.
    pub fn min_acceptable(amount_out: U256, tolerance_bps: u32) -> U256 {
        let keep = U256::from(BPS_DENOMINATOR.saturating_sub(tolerance_bps));
        let denom = U256::from(BPS_DENOMINATOR);
        // Split so no intermediate exceeds `amount_out`.
        let (whole, rem) = amount_out.div_mod(denom);
        whole * keep + rem * keep / denom
    }
}
