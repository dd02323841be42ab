//! EVM ledger client over `ethers`.
//!
//! Talks to a Uniswap-V2 style router (`swapExactETHForTokens`,
//! `swapExactTokensForETH`, `getAmountsOut`) and plain ERC-20 tokens.
//! This module is the only place that knows how a node phrases its
//! rejections; everything leaves here as a classified [`LedgerError`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::{
    contract::{abigen, ContractError},
    middleware::SignerMiddleware,
    providers::{Http, Middleware, MiddlewareError, PendingTransaction, Provider},
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, BlockId, BlockNumber, TxHash, U256},
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{LedgerCall, LedgerClient, LedgerTx};
use crate::error::{LedgerError, LedgerErrorKind};
use crate::types::{TxReceipt, TxStatus};

abigen!(
    SwapRouter,
    r#"[
        function swapExactETHForTokens(uint256 amountOutMin, address[] path, address to, uint256 deadline) payable returns (uint256[])
        function swapExactTokensForETH(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) returns (uint256[])
        function getAmountsOut(uint256 amountIn, address[] path) view returns (uint256[])
    ]"#,
);

abigen!(
    Erc20Token,
    r#"[
        function decimals() view returns (uint8)
        function balanceOf(address owner) view returns (uint256)
        function approve(address spender, uint256 amount) returns (bool)
        function allowance(address owner, address spender) view returns (uint256)
    ]"#,
);

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// How often a pending transaction is polled for its receipt.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// JSON-RPC code geth and compatible nodes use for `execution reverted`.
const RPC_CODE_EXECUTION_REVERTED: i64 = 3;

/// Pool rejections meaning the nonce is no longer usable.
const NONCE_REJECTIONS: &[&str] = &[
    "nonce too low",
    "nonce has already been used",
    "already known",
    "replacement transaction underpriced",
    "known transaction",
];

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Signing ledger client bound to one wallet and one router.
pub struct EvmLedger {
    client: Arc<SignerClient>,
    router: SwapRouter<SignerClient>,
    gas_limit: U256,
}

impl EvmLedger {
    /// Connect to the node, resolve the chain id and bind the wallet.
    pub async fn connect(
        rpc_url: &str,
        private_key: &SecretString,
        router: Address,
        gas_limit: u64,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .with_context(|| format!("Invalid RPC URL: {rpc_url}"))?;
        let chain_id = provider
            .get_chainid()
            .await
            .context("Failed to query chain id")?
            .as_u64();
        let wallet = private_key
            .expose_secret()
            .trim()
            .parse::<LocalWallet>()
            .context("Invalid wallet private key")?
            .with_chain_id(chain_id);

        info!(chain_id, wallet = ?wallet.address(), router = ?router, "Ledger client connected");

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        Ok(Self {
            router: SwapRouter::new(router, client.clone()),
            client,
            gas_limit: U256::from(gas_limit),
        })
    }

    fn token(&self, address: Address) -> Erc20Token<SignerClient> {
        Erc20Token::new(address, self.client.clone())
    }

    /// Encode a call into an unsigned transaction carrying `nonce`.
    fn build(&self, tx: LedgerTx) -> TypedTransaction {
        let mut typed = match tx.call {
            LedgerCall::Approve {
                token,
                spender,
                amount,
            } => self.token(token).approve(spender, amount).tx,
            LedgerCall::SwapExactNativeForTokens {
                value,
                amount_out_min,
                path,
                recipient,
                deadline,
            } => {
                self.router
                    .swap_exact_eth_for_tokens(amount_out_min, path, recipient, deadline)
                    .value(value)
                    .tx
            }
            LedgerCall::SwapExactTokensForNative {
                amount_in,
                amount_out_min,
                path,
                recipient,
                deadline,
            } => {
                self.router
                    .swap_exact_tokens_for_eth(amount_in, amount_out_min, path, recipient, deadline)
                    .tx
            }
        };
        typed.set_nonce(tx.nonce);
        typed.set_gas(self.gas_limit);
        typed
    }
}

#[async_trait]
impl LedgerClient for EvmLedger {
    fn wallet_address(&self) -> Address {
        self.client.address()
    }

    fn router_address(&self) -> Address {
        self.router.address()
    }

    async fn native_balance(&self, owner: Address) -> Result<U256, LedgerError> {
        self.client
            .get_balance(owner, None)
            .await
            .map_err(|e| classify_middleware(&e))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, LedgerError> {
        self.token(token)
            .balance_of(owner)
            .call()
            .await
            .map_err(|e| classify_contract(&e))
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, LedgerError> {
        self.token(token)
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| classify_contract(&e))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, LedgerError> {
        self.token(token)
            .decimals()
            .call()
            .await
            .map_err(|e| classify_contract(&e))
    }

    async fn next_nonce(&self, owner: Address) -> Result<U256, LedgerError> {
        self.client
            .get_transaction_count(owner, Some(BlockId::Number(BlockNumber::Pending)))
            .await
            .map_err(|e| classify_middleware(&e))
    }

    async fn amounts_out(
        &self,
        amount_in: U256,
        path: Vec<Address>,
    ) -> Result<Vec<U256>, LedgerError> {
        self.router
            .get_amounts_out(amount_in, path)
            .call()
            .await
            .map_err(|e| classify_contract(&e))
    }

    async fn submit(&self, tx: LedgerTx) -> Result<TxHash, LedgerError> {
        let typed = self.build(tx);
        let pending = self
            .client
            .send_transaction(typed, None)
            .await
            .map_err(|e| classify_middleware(&e))?;
        let hash = pending.tx_hash();
        debug!(hash = ?hash, "Transaction broadcast");
        Ok(hash)
    }

    async fn await_receipt(&self, hash: TxHash) -> Result<TxReceipt, LedgerError> {
        let receipt = PendingTransaction::new(hash, self.client.provider())
            .interval(RECEIPT_POLL_INTERVAL)
            .await
            .map_err(|e| classify_middleware(&e))?
            .ok_or_else(|| {
                LedgerError::conflict(format!("transaction {hash:?} dropped before inclusion"))
            })?;

        let status = match receipt.status.map(|s| s.as_u64()) {
            Some(1) => TxStatus::Success,
            _ => TxStatus::Reverted,
        };
        Ok(TxReceipt {
            hash: receipt.transaction_hash,
            status,
            block_number: receipt.block_number.map(|b| b.as_u64()),
        })
    }
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Classify a node rejection by JSON-RPC code and the pool's reason.
fn classify_rejection(code: i64, reason: &str) -> LedgerErrorKind {
    let reason = reason.to_ascii_lowercase();
    if code == RPC_CODE_EXECUTION_REVERTED || reason.starts_with("execution reverted") {
        return LedgerErrorKind::Reverted;
    }
    if NONCE_REJECTIONS.iter().any(|r| reason.contains(r)) {
        return LedgerErrorKind::Conflict;
    }
    LedgerErrorKind::Other
}

fn classify_middleware<E: MiddlewareError>(err: &E) -> LedgerError {
    if let Some(resp) = err.as_error_response() {
        let kind = classify_rejection(resp.code, &resp.message);
        return LedgerError::new(kind, format!("rpc error {}: {}", resp.code, resp.message));
    }
    if err.is_serde_error() {
        return LedgerError::other(err.to_string());
    }
    LedgerError::transport(err.to_string())
}

fn classify_contract<M: Middleware>(err: &ContractError<M>) -> LedgerError {
    if err.is_revert() {
        return LedgerError::reverted(err.to_string());
    }
    if let Some(inner) = err.as_middleware_error() {
        return classify_middleware(inner);
    }
    LedgerError::other(err.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
