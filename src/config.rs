//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (RPC URL, private key, token addresses) are referenced by
//! env-var name in the config and resolved at start-up.

use anyhow::{bail, Context, Result};
use ethers::types::Address;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::engine::{DelayWindow, SwapSettings};
use crate::scoring::http::{DEFAULT_BASE_URL, DEFAULT_TASK_ID};
use crate::strategy::{AmountRange, AmountRangeStore};
use crate::types::{Asset, SwapDirection, SwapPair};

pub const DEFAULT_ROUTER: &str = "0xb98c15a0dC1e271132e341250703c7e94c059e8D";
pub const DEFAULT_WRAPPED_NATIVE: &str = "0xf22ef0085f6511f70b01a68f360dcc56261f768a";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub wallet: WalletConfig,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    #[serde(default)]
    pub pairs: Vec<PairConfig>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub name: String,
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    #[serde(default = "default_wrapped_native")]
    pub wrapped_native: String,
    #[serde(default = "default_router")]
    pub router: String,
    pub rpc_url_env: String,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    pub private_key_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    pub symbol: String,
    /// Literal contract address.
    #[serde(default)]
    pub address: Option<String>,
    /// Env var holding the contract address (used when `address` is unset).
    #[serde(default)]
    pub address_env: Option<String>,
    /// Skips the on-chain `decimals()` read when set.
    #[serde(default)]
    pub decimals: Option<u8>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PairConfig {
    pub id: String,
    pub token: String,
    #[serde(default = "default_initial_direction")]
    pub initial_direction: SwapDirection,
    pub native_range: RangeConfig,
    pub token_range: RangeConfig,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RangeConfig {
    pub min: Decimal,
    pub max: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    pub max_retries: u32,
    pub slippage_bps: u32,
    /// Resubmit reverted calls with a fresh nonce, like nonce conflicts.
    pub retry_on_revert: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 30,
            max_delay_secs: 60,
            max_retries: 3,
            slippage_bps: 500,
            retry_on_revert: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            task_id: Some(DEFAULT_TASK_ID.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControlConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

fn default_native_symbol() -> String {
    "STT".to_string()
}

fn default_wrapped_native() -> String {
    DEFAULT_WRAPPED_NATIVE.to_string()
}

fn default_router() -> String {
    DEFAULT_ROUTER.to_string()
}

fn default_gas_limit() -> u64 {
    300_000
}

fn default_deadline_secs() -> u64 {
    20 * 60
}

fn default_initial_direction() -> SwapDirection {
    SwapDirection::NativeToToken
}

/// Token leg with its resolved address.
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub asset: Asset,
    pub decimals: Option<u8>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    pub fn private_key(&self) -> Result<SecretString> {
        Self::resolve_env(&self.wallet.private_key_env).map(SecretString::new)
    }

    pub fn rpc_url(&self) -> Result<String> {
        Self::resolve_env(&self.network.rpc_url_env)
    }

    pub fn router(&self) -> Result<Address> {
        parse_address("router", &self.network.router)
    }

    /// Resolve every `[[tokens]]` entry to an on-chain address.
    pub fn resolve_tokens(&self) -> Result<Vec<ResolvedToken>> {
        self.tokens
            .iter()
            .map(|t| {
                let raw = match (&t.address, &t.address_env) {
                    (Some(addr), _) => addr.clone(),
                    (None, Some(env)) => Self::resolve_env(env)?,
                    (None, None) => bail!("Token {} has neither address nor address_env", t.symbol),
                };
                Ok(ResolvedToken {
                    asset: Asset::token(&t.symbol, parse_address(&t.symbol, &raw)?),
                    decimals: t.decimals,
                })
            })
            .collect()
    }

    /// Build the configured pairs against resolved token addresses.
    pub fn build_pairs(&self, tokens: &[ResolvedToken]) -> Result<Vec<SwapPair>> {
        let wrapped = parse_address("wrapped_native", &self.network.wrapped_native)?;
        let native = Asset::native(&self.network.native_symbol, wrapped);
        self.pairs
            .iter()
            .map(|p| {
                let token = tokens
                    .iter()
                    .find(|t| t.asset.symbol == p.token)
                    .with_context(|| format!("Pair {} references unknown token {}", p.id, p.token))?;
                Ok(SwapPair {
                    id: p.id.clone(),
                    native: native.clone(),
                    token: token.asset.clone(),
                    initial_direction: p.initial_direction,
                })
            })
            .collect()
    }

    /// Amount-range table from the `[[pairs]]` sections. Falls back to the
    /// built-in table when no pairs are configured.
    pub fn range_store(&self) -> Result<AmountRangeStore> {
        if self.pairs.is_empty() {
            return Ok(AmountRangeStore::defaults());
        }
        let mut store = AmountRangeStore::new();
        for p in &self.pairs {
            let native = AmountRange::new(p.native_range.min, p.native_range.max)
                .with_context(|| format!("Invalid native range for pair {}", p.id))?;
            let token = AmountRange::new(p.token_range.min, p.token_range.max)
                .with_context(|| format!("Invalid token range for pair {}", p.id))?;
            store.insert(&p.id, &self.network.native_symbol, native);
            store.insert(&p.id, &p.token, token);
        }
        Ok(store)
    }

    pub fn swap_settings(&self) -> SwapSettings {
        SwapSettings {
            native_symbol: self.network.native_symbol.clone(),
            slippage_bps: self.schedule.slippage_bps,
            deadline: Duration::from_secs(self.network.deadline_secs),
            max_retries: self.schedule.max_retries,
            retry_on_revert: self.schedule.retry_on_revert,
        }
    }

    pub fn delay_window(&self) -> DelayWindow {
        DelayWindow::from_secs(self.schedule.min_delay_secs, self.schedule.max_delay_secs)
    }
}

fn parse_address(what: &str, raw: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .with_context(|| format!("Invalid address for {what}: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
[network]
name = "somnia-testnet"
rpc_url_env = "RPC_URL_SOMNIA_TESTNET"

[wallet]
private_key_env = "PRIVATE_KEY"

[[tokens]]
symbol = "USDTG"
address = "0x2222222222222222222222222222222222222222"
decimals = 6

[[tokens]]
symbol = "NIA"
address_env = "AUTOSWAP_TEST_NIA_ADDRESS"

[[pairs]]
id = "STT_USDTG"
token = "USDTG"
native_range = { min = 0.01, max = 0.05 }
token_range = { min = 0.04, max = 0.21 }

[[pairs]]
id = "STT_NIA"
token = "NIA"
initial_direction = "token_to_native"
native_range = { min = 0.01, max = 0.05 }
token_range = { min = 2, max = 10 }

[schedule]
min_delay_secs = 30
max_delay_secs = 60
max_retries = 3
slippage_bps = 500
retry_on_revert = true
"#;

    #[test]
    fn test_parse_sample_config() {
        let cfg = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(cfg.network.native_symbol, "STT");
        assert_eq!(cfg.network.gas_limit, 300_000);
        assert_eq!(cfg.network.deadline_secs, 1200);
        assert_eq!(cfg.router().unwrap(), DEFAULT_ROUTER.parse::<Address>().unwrap());
        assert_eq!(cfg.pairs.len(), 2);
        assert_eq!(cfg.pairs[0].initial_direction, SwapDirection::NativeToToken);
        assert_eq!(cfg.pairs[1].initial_direction, SwapDirection::TokenToNative);
        assert!(cfg.scoring.enabled);
        assert_eq!(cfg.control.port, 8080);
        assert_eq!(cfg.delay_window(), DelayWindow::from_secs(30, 60));
    }

    #[test]
    fn test_range_store_from_pairs() {
        let cfg = AppConfig::from_toml(SAMPLE).unwrap();
        let store = cfg.range_store().unwrap();
        assert_eq!(store.get("STT_NIA", "NIA").unwrap().min(), dec!(2));
        assert_eq!(store.get("STT_USDTG", "STT").unwrap().max(), dec!(0.05));
    }

    #[test]
    fn test_invalid_range_rejected_at_load() {
        let bad = SAMPLE.replace("min = 2, max = 10", "min = 10, max = 2");
        let cfg = AppConfig::from_toml(&bad).unwrap();
        assert!(cfg.range_store().is_err());
    }

    #[test]
    fn test_resolve_tokens_and_pairs() {
        std::env::set_var(
            "AUTOSWAP_TEST_NIA_ADDRESS",
            "0x3333333333333333333333333333333333333333",
        );
        let cfg = AppConfig::from_toml(SAMPLE).unwrap();
        let tokens = cfg.resolve_tokens().unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].decimals, Some(6));
        let pairs = cfg.build_pairs(&tokens).unwrap();
        assert_eq!(pairs[1].token.symbol, "NIA");
        assert!(pairs[1].native.native);
        assert_eq!(
            pairs[0].native.address,
            DEFAULT_WRAPPED_NATIVE.parse::<Address>().unwrap()
        );
    }

    #[test]
    fn test_load_config_file() {
        // Requires config.toml in the working directory.
        if let Ok(cfg) = AppConfig::load("config.toml") {
            assert!(!cfg.pairs.is_empty());
            assert!(cfg.range_store().is_ok());
        }
    }
}
