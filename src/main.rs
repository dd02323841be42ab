//! AUTOSWAP: scheduled two-way DEX swap runner
//!
//! Entry point. Loads configuration, initialises structured logging,
//! connects the wallet, takes a first wallet snapshot and serves the
//! control API until Ctrl+C, then cancels any active run and waits for it.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use autoswap::config;
use autoswap::control::{self, ControlState};
use autoswap::engine::{wallet, ScheduleController, SwapContext};
use autoswap::ledger::evm::EvmLedger;
use autoswap::ledger::LedgerClient;
use autoswap::scoring::http::SomniaPointsClient;
use autoswap::scoring::{NoScoring, ReportingSink, ScoringService};
use autoswap::types::short_address;

const BANNER: &str = r#"
    _   _   _ _____ ___  ______        ___    ____
   / \ | | | |_   _/ _ \/ ___\ \      / / \  |  _ \
  / _ \| | | | | || | | \___ \\ \ /\ / / _ \ | |_) |
 / ___ \ |_| | | || |_| |___) |\ V  V / ___ \|  __/
/_/   \_\___/  |_| \___/|____/  \_/\_/_/   \_\_|

  Scheduled two-way DEX swaps  v0.1.0
"#;

/// How long shutdown waits for an active run to settle.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        network = %cfg.network.name,
        pairs = cfg.pairs.len(),
        retries = cfg.schedule.max_retries,
        slippage_bps = cfg.schedule.slippage_bps,
        "AUTOSWAP starting up"
    );

    // -- Ledger ----------------------------------------------------------

    let rpc_url = cfg.rpc_url()?;
    let private_key = cfg.private_key()?;
    let ledger = EvmLedger::connect(&rpc_url, &private_key, cfg.router()?, cfg.network.gas_limit)
        .await
        .context("Failed to connect ledger client")?;
    let ledger: Arc<dyn LedgerClient> = Arc::new(ledger);
    info!(wallet = %short_address(&ledger.wallet_address()), "Wallet loaded");

    // -- Scoring ---------------------------------------------------------

    let scoring: Arc<dyn ScoringService> = if cfg.scoring.enabled {
        Arc::new(SomniaPointsClient::new(
            cfg.scoring.base_url.clone(),
            cfg.scoring.task_id.clone(),
        )?)
    } else {
        warn!("Scoring disabled, swaps will not be reported");
        Arc::new(NoScoring)
    };

    // -- Swap context ----------------------------------------------------

    let tokens = cfg.resolve_tokens()?;
    let pairs = cfg.build_pairs(&tokens)?;
    let ctx = Arc::new(SwapContext::new(
        ledger,
        pairs,
        cfg.range_store()?,
        ReportingSink::new(scoring),
        cfg.swap_settings(),
    ));
    for token in &tokens {
        if let Some(decimals) = token.decimals {
            ctx.set_decimals(token.asset.address, decimals).await;
        }
    }

    match wallet::refresh(&ctx).await {
        Ok(snapshot) => info!(%snapshot, "Initial wallet snapshot"),
        Err(e) => error!(error = %e, "Initial wallet refresh failed"),
    }

    let controller = ScheduleController::new(ctx, cfg.delay_window());

    // -- Control API -----------------------------------------------------

    if cfg.control.enabled {
        let state = Arc::new(ControlState::new(controller.clone()));
        control::spawn_control(state, cfg.control.port).await?;
    } else {
        warn!("Control API disabled, nothing can start a run");
    }

    info!("Ready. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Shutdown signal received.");

    shutdown(&controller).await;
    info!("AUTOSWAP shut down cleanly.");
    Ok(())
}

/// Cancel the active run, if any, and wait for it to reach a terminal state.
async fn shutdown(controller: &ScheduleController) {
    if !controller.cancel() {
        return;
    }
    let mut progress = controller.subscribe();
    let settled = tokio::time::timeout(
        SHUTDOWN_GRACE,
        progress.wait_for(|run| run.as_ref().map_or(true, |r| r.state.is_terminal())),
    )
    .await
    .map(|waited| waited.is_ok())
    .unwrap_or(false);

    match controller.latest_run() {
        Some(run) if settled => info!(
            run_id = %run.id,
            state = %run.state,
            completed = run.completed,
            "Active run settled"
        ),
        _ => warn!("Active run did not settle before shutdown"),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("autoswap=info"));

    let json_logging = std::env::var("AUTOSWAP_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
