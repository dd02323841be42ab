//! Shared types for the AUTOSWAP runner.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that ledger, strategy, scoring
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use ethers::types::{Address, TxHash};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Assets and pairs
// ---------------------------------------------------------------------------

/// One leg of an exchange pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub symbol: String,
    /// Contract address. For the native leg this is the wrapped-native
    /// token, which is what router paths expect.
    pub address: Address,
    /// True for the chain's native asset (paid as transaction value).
    pub native: bool,
}

impl Asset {
    pub fn native(symbol: &str, wrapped: Address) -> Self {
        Self {
            symbol: symbol.to_string(),
            address: wrapped,
            native: true,
        }
    }

    pub fn token(symbol: &str, address: Address) -> Self {
        Self {
            symbol: symbol.to_string(),
            address,
            native: false,
        }
    }
}

/// A configured exchange pair: the native asset against one token.
/// Immutable after configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapPair {
    pub id: String,
    pub native: Asset,
    pub token: Asset,
    /// Direction executed first after start-up.
    pub initial_direction: SwapDirection,
}

impl SwapPair {
    /// The asset spent when swapping in `direction`.
    pub fn input(&self, direction: SwapDirection) -> &Asset {
        match direction {
            SwapDirection::TokenToNative => &self.token,
            SwapDirection::NativeToToken => &self.native,
        }
    }

    /// The asset received when swapping in `direction`.
    pub fn output(&self, direction: SwapDirection) -> &Asset {
        match direction {
            SwapDirection::TokenToNative => &self.native,
            SwapDirection::NativeToToken => &self.token,
        }
    }

    /// Two-hop router path for `direction`.
    pub fn path(&self, direction: SwapDirection) -> Vec<Address> {
        vec![self.input(direction).address, self.output(direction).address]
    }
}

impl fmt::Display for SwapPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} & {})", self.id, self.native.symbol, self.token.symbol)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which exchange of a pair executes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    TokenToNative,
    NativeToToken,
}

impl SwapDirection {
    /// The opposite direction.
    pub fn flipped(&self) -> Self {
        match self {
            SwapDirection::TokenToNative => SwapDirection::NativeToToken,
            SwapDirection::NativeToToken => SwapDirection::TokenToNative,
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapDirection::TokenToNative => write!(f, "TOKEN_TO_NATIVE"),
            SwapDirection::NativeToToken => write!(f, "NATIVE_TO_TOKEN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Lifecycle of a single submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxState {
    Building,
    Submitted,
    Confirmed,
    Reverted,
    Failed,
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Confirmed | TxState::Reverted | TxState::Failed)
    }
}

/// One attempt at getting a ledger-mutating call included.
/// Created per attempt and dropped once it reaches a terminal state.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub label: String,
    pub nonce: ethers::types::U256,
    /// 1-based attempt number within the retry budget.
    pub attempt: u32,
    pub hash: Option<TxHash>,
    pub state: TxState,
}

impl PendingTransaction {
    pub fn new(label: &str, nonce: ethers::types::U256, attempt: u32) -> Self {
        Self {
            label: label.to_string(),
            nonce,
            attempt,
            hash: None,
            state: TxState::Building,
        }
    }

    pub fn submitted(&mut self, hash: TxHash) {
        self.hash = Some(hash);
        self.state = TxState::Submitted;
    }

    pub fn settle(&mut self, state: TxState) {
        debug_assert!(state.is_terminal());
        self.state = state;
    }
}

/// Execution status reported by a confirmed receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxStatus {
    Success,
    Reverted,
}

/// Ledger acknowledgment that a call was included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub status: TxStatus,
    pub block_number: Option<u64>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == TxStatus::Success
    }
}

// ---------------------------------------------------------------------------
// Wallet snapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the wallet. Each refresh builds a new one that
/// replaces the previous snapshot wholesale.
#[derive(Debug, Clone, Serialize)]
pub struct WalletSnapshot {
    pub address: Address,
    pub native_symbol: String,
    pub native_balance: Decimal,
    /// Token symbol → balance in whole-token units.
    pub token_balances: BTreeMap<String, Decimal>,
    pub points: u64,
    pub rank: u64,
    pub captured_at: DateTime<Utc>,
}

impl WalletSnapshot {
    /// Balance of the given asset, zero when the asset is not tracked.
    pub fn balance_of(&self, asset: &Asset) -> Decimal {
        if asset.native {
            self.native_balance
        } else {
            self.token_balances
                .get(&asset.symbol)
                .copied()
                .unwrap_or(Decimal::ZERO)
        }
    }

    /// Empty snapshot used before the first refresh completes.
    pub fn empty(address: Address, native_symbol: &str) -> Self {
        Self {
            address,
            native_symbol: native_symbol.to_string(),
            native_balance: Decimal::ZERO,
            token_balances: BTreeMap::new(),
            points: 0,
            rank: 0,
            captured_at: Utc::now(),
        }
    }
}

impl fmt::Display for WalletSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {}: {:.4}",
            short_address(&self.address),
            self.native_symbol,
            self.native_balance
        )?;
        for (symbol, balance) in &self.token_balances {
            write!(f, " | {symbol}: {balance:.4}")?;
        }
        write!(f, " | points: {} | rank: {}", self.points, self.rank)
    }
}

/// `0x1234...abcd` form used in logs.
pub fn short_address(address: &Address) -> String {
    let full = format!("{address:?}");
    if full.len() <= 10 {
        return full;
    }
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

// ---------------------------------------------------------------------------
// Swap outcomes
// ---------------------------------------------------------------------------

/// Result of one swap attempt as seen by the schedule loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SwapOutcome {
    Succeeded {
        direction: SwapDirection,
        amount_in: Decimal,
        tx_hash: TxHash,
    },
    Skipped {
        direction: SwapDirection,
        amount_in: Decimal,
        shortfall: Decimal,
    },
    Failed {
        direction: SwapDirection,
        reason: String,
    },
}

impl SwapOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SwapOutcome::Succeeded { .. })
    }

    pub fn direction(&self) -> SwapDirection {
        match self {
            SwapOutcome::Succeeded { direction, .. }
            | SwapOutcome::Skipped { direction, .. }
            | SwapOutcome::Failed { direction, .. } => *direction,
        }
    }
}

/// Activity record kept for operators (most recent last).
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub pair: String,
    pub iteration: u32,
    #[serde(flatten)]
    pub outcome: SwapOutcome,
}

// ---------------------------------------------------------------------------
// Schedule runs
// ---------------------------------------------------------------------------

/// State of a schedule run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Running,
    Completed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running => write!(f, "RUNNING"),
            RunState::Completed => write!(f, "COMPLETED"),
            RunState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Progress of one multi-iteration run for a pair.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRun {
    pub id: Uuid,
    pub pair: String,
    pub requested: u32,
    pub completed: u32,
    pub succeeded: u32,
    pub skipped: u32,
    pub failed: u32,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    /// Set while waiting between iterations.
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl ScheduleRun {
    pub fn new(pair: &str, requested: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            pair: pair.to_string(),
            requested,
            completed: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            state: RunState::Running,
            started_at: Utc::now(),
            next_attempt_at: None,
        }
    }

    /// Count a finished attempt.
    pub fn record(&mut self, outcome: &SwapOutcome) {
        self.completed += 1;
        match outcome {
            SwapOutcome::Succeeded { .. } => self.succeeded += 1,
            SwapOutcome::Skipped { .. } => self.skipped += 1,
            SwapOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pair() -> SwapPair {
        SwapPair {
            id: "STT_USDTG".into(),
            native: Asset::native("STT", Address::repeat_byte(0x11)),
            token: Asset::token("USDTG", Address::repeat_byte(0x22)),
            initial_direction: SwapDirection::NativeToToken,
        }
    }

    #[test]
    fn test_path_follows_direction() {
        let p = pair();
        assert_eq!(
            p.path(SwapDirection::NativeToToken),
            vec![Address::repeat_byte(0x11), Address::repeat_byte(0x22)]
        );
        assert_eq!(
            p.path(SwapDirection::TokenToNative),
            vec![Address::repeat_byte(0x22), Address::repeat_byte(0x11)]
        );
        assert!(p.input(SwapDirection::NativeToToken).native);
        assert!(!p.input(SwapDirection::TokenToNative).native);
    }

    #[test]
    fn test_direction_flip_is_involution() {
        for d in [SwapDirection::TokenToNative, SwapDirection::NativeToToken] {
            assert_ne!(d.flipped(), d);
            assert_eq!(d.flipped().flipped(), d);
        }
    }

    #[test]
    fn test_snapshot_balance_lookup() {
        let p = pair();
        let mut snap = WalletSnapshot::empty(Address::zero(), "STT");
        snap.native_balance = dec!(1.5);
        snap.token_balances.insert("USDTG".into(), dec!(5.0));
        assert_eq!(snap.balance_of(&p.native), dec!(1.5));
        assert_eq!(snap.balance_of(&p.token), dec!(5.0));
        assert_eq!(
            snap.balance_of(&Asset::token("NIA", Address::zero())),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_short_address() {
        let s = short_address(&Address::repeat_byte(0xab));
        assert!(s.starts_with("0xabab"));
        assert!(s.ends_with("abab"));
        assert!(s.contains("..."));
    }

    #[test]
    fn test_run_record_counts() {
        let mut run = ScheduleRun::new("STT_NIA", 3);
        run.record(&SwapOutcome::Failed {
            direction: SwapDirection::NativeToToken,
            reason: "quote".into(),
        });
        run.record(&SwapOutcome::Skipped {
            direction: SwapDirection::NativeToToken,
            amount_in: dec!(0.02),
            shortfall: dec!(0.01),
        });
        assert_eq!(run.completed, 2);
        assert_eq!(run.failed, 1);
        assert_eq!(run.skipped, 1);
        assert_eq!(run.succeeded, 0);
        assert_eq!(run.state, RunState::Running);
    }

    #[test]
    fn test_pending_transaction_lifecycle() {
        let mut tx = PendingTransaction::new("swap", ethers::types::U256::from(7u64), 1);
        assert_eq!(tx.state, TxState::Building);
        tx.submitted(TxHash::repeat_byte(1));
        assert_eq!(tx.state, TxState::Submitted);
        assert!(!tx.state.is_terminal());
        tx.settle(TxState::Confirmed);
        assert!(tx.state.is_terminal());
    }
}
