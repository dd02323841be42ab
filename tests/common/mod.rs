//! In-memory ledger and scoring doubles for integration testing.
//!
//! `MockLedger` behaves like a single-wallet chain with one router: nonces
//! advance on every accepted submission, approvals set allowances, and
//! confirmed swaps move balances at the quoted rate. Failures are scripted
//! per call so retry paths are deterministic.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::types::{Address, TxHash, U256};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use autoswap::engine::{DelayWindow, ScheduleController, SwapContext, SwapSettings};
use autoswap::error::{LedgerError, LedgerErrorKind};
use autoswap::ledger::{to_base_units, LedgerCall, LedgerClient, LedgerTx};
use autoswap::scoring::{ReportingSink, ScoringService, Standing, TaskAward};
use autoswap::strategy::AmountRangeStore;
use autoswap::types::{Asset, SwapDirection, SwapPair, TxReceipt, TxStatus};

pub const WALLET: Address = Address::repeat_byte(0x01);
pub const ROUTER: Address = Address::repeat_byte(0x33);
pub const WSTT: Address = Address::repeat_byte(0x11);
pub const USDTG: Address = Address::repeat_byte(0x22);
pub const NIA: Address = Address::repeat_byte(0x44);

pub const USDTG_DECIMALS: u8 = 6;
pub const NIA_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LedgerInner {
    native: U256,
    tokens: HashMap<Address, U256>,
    decimals: HashMap<Address, u8>,
    allowances: HashMap<(Address, Address), U256>,
    nonce: u64,
    /// Output returned for any quote; `None` makes quotes fail.
    quote_out: Option<U256>,
    submit_errors: VecDeque<LedgerError>,
    receipt_statuses: VecDeque<TxStatus>,
    pending: HashMap<TxHash, LedgerTx>,
    submitted: Vec<LedgerTx>,
    confirmed: Vec<LedgerTx>,
    native_read_error: Option<LedgerError>,
}

/// A deterministic single-wallet ledger.
#[derive(Clone)]
pub struct MockLedger {
    inner: Arc<Mutex<LedgerInner>>,
}

impl MockLedger {
    pub fn new() -> Self {
        let mut inner = LedgerInner::default();
        inner.decimals.insert(USDTG, USDTG_DECIMALS);
        inner.decimals.insert(NIA, NIA_DECIMALS);
        inner.nonce = 40;
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn set_native(&self, amount: Decimal) {
        self.inner.lock().unwrap().native = to_base_units(amount, 18).unwrap();
    }

    pub fn set_token(&self, token: Address, amount: Decimal) {
        let mut inner = self.inner.lock().unwrap();
        let decimals = inner.decimals[&token];
        inner.tokens.insert(token, to_base_units(amount, decimals).unwrap());
    }

    pub fn set_allowance(&self, token: Address, amount: U256) {
        self.inner.lock().unwrap().allowances.insert((token, ROUTER), amount);
    }

    pub fn allowance_of(&self, token: Address) -> U256 {
        self.inner
            .lock()
            .unwrap()
            .allowances
            .get(&(token, ROUTER))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_quote(&self, out: Option<U256>) {
        self.inner.lock().unwrap().quote_out = out;
    }

    /// Fail the next submissions with these errors, in order.
    pub fn script_submit_errors(&self, errors: Vec<LedgerError>) {
        self.inner.lock().unwrap().submit_errors.extend(errors);
    }

    /// Receipt statuses for the next confirmations, in order.
    pub fn script_receipts(&self, statuses: Vec<TxStatus>) {
        self.inner.lock().unwrap().receipt_statuses.extend(statuses);
    }

    pub fn fail_native_reads(&self, err: Option<LedgerError>) {
        self.inner.lock().unwrap().native_read_error = err;
    }

    /// Every call the node accepted, in submission order.
    pub fn submitted(&self) -> Vec<LedgerTx> {
        self.inner.lock().unwrap().submitted.clone()
    }

    pub fn confirmed_swaps(&self) -> Vec<LedgerTx> {
        self.inner
            .lock()
            .unwrap()
            .confirmed
            .iter()
            .filter(|tx| !matches!(tx.call, LedgerCall::Approve { .. }))
            .cloned()
            .collect()
    }

    fn apply(inner: &mut LedgerInner, call: &LedgerCall) {
        let out = inner.quote_out.unwrap_or_default();
        match call {
            LedgerCall::Approve {
                token,
                spender,
                amount,
            } => {
                inner.allowances.insert((*token, *spender), *amount);
            }
            LedgerCall::SwapExactNativeForTokens { value, path, .. } => {
                inner.native = inner.native.saturating_sub(*value);
                *inner.tokens.entry(path[1]).or_default() += out;
            }
            LedgerCall::SwapExactTokensForNative {
                amount_in, path, ..
            } => {
                let bal = inner.tokens.entry(path[0]).or_default();
                *bal = bal.saturating_sub(*amount_in);
                inner.native += out;
            }
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn wallet_address(&self) -> Address {
        WALLET
    }

    fn router_address(&self) -> Address {
        ROUTER
    }

    async fn native_balance(&self, _owner: Address) -> Result<U256, LedgerError> {
        let inner = self.inner.lock().unwrap();
        match &inner.native_read_error {
            Some(err) => Err(err.clone()),
            None => Ok(inner.native),
        }
    }

    async fn token_balance(&self, token: Address, _owner: Address) -> Result<U256, LedgerError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .tokens
            .get(&token)
            .copied()
            .unwrap_or_default())
    }

    async fn allowance(
        &self,
        token: Address,
        _owner: Address,
        spender: Address,
    ) -> Result<U256, LedgerError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .allowances
            .get(&(token, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, LedgerError> {
        self.inner
            .lock()
            .unwrap()
            .decimals
            .get(&token)
            .copied()
            .ok_or_else(|| LedgerError::other("not a token"))
    }

    async fn next_nonce(&self, _owner: Address) -> Result<U256, LedgerError> {
        Ok(U256::from(self.inner.lock().unwrap().nonce))
    }

    async fn amounts_out(
        &self,
        amount_in: U256,
        _path: Vec<Address>,
    ) -> Result<Vec<U256>, LedgerError> {
        match self.inner.lock().unwrap().quote_out {
            Some(out) => Ok(vec![amount_in, out]),
            None => Err(LedgerError::reverted("UniswapV2Library: INSUFFICIENT_LIQUIDITY")),
        }
    }

    async fn submit(&self, tx: LedgerTx) -> Result<TxHash, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.submit_errors.pop_front() {
            // A competing transaction took this nonce.
            if err.kind == LedgerErrorKind::Conflict {
                inner.nonce += 1;
            }
            return Err(err);
        }
        if tx.nonce != U256::from(inner.nonce) {
            return Err(LedgerError::conflict(format!(
                "nonce too low: expected {}, got {}",
                inner.nonce, tx.nonce
            )));
        }
        inner.nonce += 1;
        let hash = TxHash::from_low_u64_be(inner.nonce);
        inner.submitted.push(tx.clone());
        inner.pending.insert(hash, tx);
        Ok(hash)
    }

    async fn await_receipt(&self, hash: TxHash) -> Result<TxReceipt, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let tx = inner
            .pending
            .remove(&hash)
            .ok_or_else(|| LedgerError::conflict("dropped"))?;
        let status = inner.receipt_statuses.pop_front().unwrap_or(TxStatus::Success);
        if status == TxStatus::Success {
            Self::apply(&mut inner, &tx.call);
            inner.confirmed.push(tx);
        }
        Ok(TxReceipt {
            hash,
            status,
            block_number: Some(inner.nonce),
        })
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MockScoring {
    reports: Arc<Mutex<u32>>,
    force_error: Arc<Mutex<Option<String>>>,
    standing: Arc<Mutex<Standing>>,
}

impl MockScoring {
    pub fn new(points: u64, rank: u64) -> Self {
        let scoring = Self::default();
        *scoring.standing.lock().unwrap() = Standing { points, rank };
        scoring
    }

    /// Force all subsequent calls to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn reports(&self) -> u32 {
        *self.reports.lock().unwrap()
    }
}

#[async_trait]
impl ScoringService for MockScoring {
    async fn standing(&self, _wallet: Address) -> Result<Standing> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(*self.standing.lock().unwrap())
    }

    async fn complete_task(&self, _wallet: Address) -> Result<TaskAward> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        let mut reports = self.reports.lock().unwrap();
        *reports += 1;
        let mut standing = self.standing.lock().unwrap();
        standing.points += 5;
        Ok(TaskAward { points_awarded: 5 })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn pairs(initial: SwapDirection) -> Vec<SwapPair> {
    let native = Asset::native("STT", WSTT);
    vec![
        SwapPair {
            id: "STT_USDTG".into(),
            native: native.clone(),
            token: Asset::token("USDTG", USDTG),
            initial_direction: initial,
        },
        SwapPair {
            id: "STT_NIA".into(),
            native,
            token: Asset::token("NIA", NIA),
            initial_direction: initial,
        },
    ]
}

pub struct Harness {
    pub ledger: MockLedger,
    pub scoring: MockScoring,
    pub ctx: Arc<SwapContext>,
}

impl Harness {
    pub fn new(initial: SwapDirection) -> Self {
        let ledger = MockLedger::new();
        let scoring = MockScoring::new(100, 42);
        let ctx = Arc::new(SwapContext::new(
            Arc::new(ledger.clone()),
            pairs(initial),
            AmountRangeStore::defaults(),
            ReportingSink::new(Arc::new(scoring.clone())),
            SwapSettings::default(),
        ));
        Self {
            ledger,
            scoring,
            ctx,
        }
    }

    pub fn controller(&self) -> ScheduleController {
        ScheduleController::new(self.ctx.clone(), DelayWindow::default())
    }

    pub fn pair(&self, id: &str) -> SwapPair {
        self.ctx.pair(id).cloned().unwrap()
    }

    /// Pin a range so sampling returns exactly `amount`.
    pub async fn pin_amount(&self, pair: &str, asset: &str, amount: Decimal) {
        self.ctx
            .ranges
            .write()
            .await
            .set(pair, asset, amount, amount + Decimal::new(1, 8))
            .unwrap();
    }
}
