//! Ledger integration.
//!
//! Defines the `LedgerClient` trait the engine talks to and the EVM
//! implementation in [`evm`]. Amount conversion between whole-token
//! decimals and on-chain integer units also lives here.

pub mod evm;

use async_trait::async_trait;
use ethers::types::{Address, TxHash, U256};
use ethers::utils::{format_units, parse_units};
use rust_decimal::prelude::*;
use std::str::FromStr;

use crate::error::LedgerError;
use crate::types::TxReceipt;

/// Decimals of the chain's native asset.
pub const NATIVE_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// A ledger-mutating call, before the sequencing number is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    /// ERC-20 `approve(spender, amount)`.
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    /// Router `swapExactETHForTokens`, paying `value` in the native asset.
    SwapExactNativeForTokens {
        value: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: U256,
    },
    /// Router `swapExactTokensForETH`.
    SwapExactTokensForNative {
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: U256,
    },
}

/// A call bound to the nonce it will be submitted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTx {
    pub nonce: U256,
    pub call: LedgerCall,
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// Abstraction over the remote ledger.
///
/// Every error is returned already classified (see [`LedgerError`]).
/// Implementations sign with the wallet they were built for.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address of the signing wallet.
    fn wallet_address(&self) -> Address;

    /// Router contract that swaps go through (the approval spender).
    fn router_address(&self) -> Address;

    async fn native_balance(&self, owner: Address) -> Result<U256, LedgerError>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, LedgerError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, LedgerError>;

    async fn token_decimals(&self, token: Address) -> Result<u8, LedgerError>;

    /// Next sequencing number from the "pending" view, which counts
    /// outgoing calls that are not yet confirmed.
    async fn next_nonce(&self, owner: Address) -> Result<U256, LedgerError>;

    /// Router read-only `getAmountsOut(amount_in, path)`.
    async fn amounts_out(&self, amount_in: U256, path: Vec<Address>)
        -> Result<Vec<U256>, LedgerError>;

    /// Sign and broadcast. Returns once the node accepted the call.
    async fn submit(&self, tx: LedgerTx) -> Result<TxHash, LedgerError>;

    /// Wait until the call is included and report its execution status.
    async fn await_receipt(&self, hash: TxHash) -> Result<TxReceipt, LedgerError>;
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Whole-token amount → on-chain integer units. Digits beyond the
/// token's precision are truncated.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, String> {
    if amount.is_sign_negative() {
        return Err(format!("negative amount {amount}"));
    }
    let truncated = amount.round_dp_with_strategy(decimals as u32, RoundingStrategy::ToZero);
    parse_units(truncated.normalize().to_string(), decimals as u32)
        .map(Into::into)
        .map_err(|e| format!("cannot scale {amount} by 10^{decimals}: {e}"))
}

/// On-chain integer units → whole-token amount.
pub fn from_base_units(units: U256, decimals: u8) -> Result<Decimal, String> {
    let formatted =
        format_units(units, decimals as u32).map_err(|e| format!("cannot format {units}: {e}"))?;
    Decimal::from_str(&formatted)
        .map(|d| d.normalize())
        .map_err(|e| format!("{formatted} does not fit a decimal: {e}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
