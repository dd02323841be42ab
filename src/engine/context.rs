//! Swap context: the collaborators and mutable state one run works on.
//!
//! A single context is built at start-up and shared (behind `Arc`) by the
//! schedule controller, which is the only writer while a run is active,
//! and the control surface, which reads it.

use ethers::types::Address;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use super::executor::{TransactionExecutor, DEFAULT_MAX_RETRIES};
use super::quote::{QuoteService, SLIPPAGE_BPS};
use crate::error::LedgerError;
use crate::ledger::{LedgerClient, NATIVE_DECIMALS};
use crate::scoring::ReportingSink;
use crate::strategy::{AmountRangeStore, DirectionBook};
use crate::types::{ActivityEntry, Asset, SwapPair, WalletSnapshot};

/// Activity entries kept in memory.
pub const ACTIVITY_CAPACITY: usize = 200;

/// Tunables for a single swap attempt.
#[derive(Debug, Clone)]
pub struct SwapSettings {
    pub native_symbol: String,
    pub slippage_bps: u32,
    /// Router deadline, relative to the moment the call is built.
    pub deadline: Duration,
    pub max_retries: u32,
    pub retry_on_revert: bool,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            native_symbol: "STT".to_string(),
            slippage_bps: SLIPPAGE_BPS,
            deadline: Duration::from_secs(20 * 60),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_on_revert: true,
        }
    }
}

pub struct SwapContext {
    pub pairs: Vec<SwapPair>,
    pub settings: SwapSettings,
    pub executor: TransactionExecutor,
    pub quotes: QuoteService,
    pub reporting: ReportingSink,
    pub ranges: RwLock<AmountRangeStore>,
    pub directions: RwLock<DirectionBook>,
    pub snapshot: RwLock<WalletSnapshot>,
    activity: RwLock<VecDeque<ActivityEntry>>,
    decimals: Mutex<HashMap<Address, u8>>,
}

impl SwapContext {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        pairs: Vec<SwapPair>,
        ranges: AmountRangeStore,
        reporting: ReportingSink,
        settings: SwapSettings,
    ) -> Self {
        let snapshot = WalletSnapshot::empty(ledger.wallet_address(), &settings.native_symbol);
        let directions = DirectionBook::new(&pairs);
        Self {
            executor: TransactionExecutor::new(
                ledger.clone(),
                settings.max_retries,
                settings.retry_on_revert,
            ),
            quotes: QuoteService::new(ledger),
            directions: RwLock::new(directions),
            ranges: RwLock::new(ranges),
            snapshot: RwLock::new(snapshot),
            activity: RwLock::new(VecDeque::with_capacity(ACTIVITY_CAPACITY)),
            decimals: Mutex::new(HashMap::new()),
            pairs,
            settings,
            reporting,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        self.executor.ledger()
    }

    pub fn wallet(&self) -> Address {
        self.ledger().wallet_address()
    }

    pub fn pair(&self, id: &str) -> Option<&SwapPair> {
        self.pairs.iter().find(|p| p.id == id)
    }

    /// Token legs of every configured pair, deduplicated by symbol.
    pub fn tracked_tokens(&self) -> Vec<Asset> {
        let mut tokens: Vec<Asset> = Vec::new();
        for pair in &self.pairs {
            if !tokens.iter().any(|t| t.symbol == pair.token.symbol) {
                tokens.push(pair.token.clone());
            }
        }
        tokens
    }

    /// Seed a token's decimals (from configuration) so it is never queried.
    pub async fn set_decimals(&self, token: Address, decimals: u8) {
        self.decimals.lock().await.insert(token, decimals);
    }

    /// On-chain decimals of `asset`, queried once and cached.
    pub async fn decimals(&self, asset: &Asset) -> Result<u8, LedgerError> {
        if asset.native {
            return Ok(NATIVE_DECIMALS);
        }
        if let Some(d) = self.decimals.lock().await.get(&asset.address) {
            return Ok(*d);
        }
        let d = self.ledger().token_decimals(asset.address).await?;
        self.decimals.lock().await.insert(asset.address, d);
        Ok(d)
    }

    pub async fn record_activity(&self, entry: ActivityEntry) {
        let mut log = self.activity.write().await;
        if log.len() == ACTIVITY_CAPACITY {
            log.pop_front();
        }
        log.push_back(entry);
    }

    /// The most recent `limit` entries, oldest first.
    pub async fn recent_activity(&self, limit: usize) -> Vec<ActivityEntry> {
        let log = self.activity.read().await;
        let start = log.len().saturating_sub(limit);
        log.iter().skip(start).cloned().collect()
    }
}
