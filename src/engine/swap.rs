//! One swap attempt for one pair.
//!
//! Order: direction → sample amount → balance gate → approval (token leg
//! only) → quote and minimum output → execute → report, refresh, flip.

use chrono::Utc;
use ethers::types::U256;
use tracing::{error, info, warn};

use super::approval::ApprovalGuard;
use super::context::SwapContext;
use super::quote::QuoteService;
use super::wallet;
use crate::error::{RangeError, SwapError};
use crate::ledger::{to_base_units, LedgerCall};
use crate::strategy::{BalanceGate, GateDecision};
use crate::types::{SwapDirection, SwapOutcome, SwapPair};

/// Run one attempt. Never fails: errors become [`SwapOutcome::Failed`].
pub async fn attempt_swap(ctx: &SwapContext, pair: &SwapPair) -> SwapOutcome {
    let direction = match ctx.directions.read().await.current(&pair.id) {
        Some(direction) => direction,
        None => {
            return SwapOutcome::Failed {
                direction: pair.initial_direction,
                reason: RangeError::UnknownPair(pair.id.clone()).to_string(),
            }
        }
    };

    match execute(ctx, pair, direction).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(pair = %pair.id, direction = %direction, error = %e, "Swap attempt failed");
            SwapOutcome::Failed {
                direction,
                reason: e.to_string(),
            }
        }
    }
}

async fn execute(
    ctx: &SwapContext,
    pair: &SwapPair,
    direction: SwapDirection,
) -> Result<SwapOutcome, SwapError> {
    let input = pair.input(direction);
    let output = pair.output(direction);

    let amount = ctx.ranges.read().await.sample(&pair.id, &input.symbol)?;

    let balance = ctx.snapshot.read().await.balance_of(input);
    if let GateDecision::Skip { shortfall } = BalanceGate::check(balance, amount) {
        warn!(
            pair = %pair.id,
            asset = %input.symbol,
            balance = %balance,
            amount = %amount,
            shortfall = %shortfall,
            "Insufficient balance, skipping swap"
        );
        return Ok(SwapOutcome::Skipped {
            direction,
            amount_in: amount,
            shortfall,
        });
    }

    let decimals = ctx.decimals(input).await?;
    let amount_in = to_base_units(amount, decimals).map_err(SwapError::Units)?;
    let owner = ctx.wallet();
    let router = ctx.ledger().router_address();

    if !input.native {
        ApprovalGuard::ensure_allowance(&ctx.executor, input.address, owner, router, amount_in)
            .await?;
    }

    let path = pair.path(direction);
    let quoted = ctx.quotes.quote(&path, amount_in).await?;
    let min_out = QuoteService::min_acceptable(quoted, ctx.settings.slippage_bps);

    info!(
        pair = %pair.id,
        direction = %direction,
        amount = %amount,
        from = %input.symbol,
        to = %output.symbol,
        quoted = %quoted,
        min_out = %min_out,
        "Swapping"
    );

    let deadline_secs = ctx.settings.deadline.as_secs();
    let native_in = input.native;
    let receipt = ctx
        .executor
        .submit("swap", |_nonce| {
            let deadline = U256::from(Utc::now().timestamp().max(0) as u64 + deadline_secs);
            if native_in {
                LedgerCall::SwapExactNativeForTokens {
                    value: amount_in,
                    amount_out_min: min_out,
                    path: path.clone(),
                    recipient: owner,
                    deadline,
                }
            } else {
                LedgerCall::SwapExactTokensForNative {
                    amount_in,
                    amount_out_min: min_out,
                    path: path.clone(),
                    recipient: owner,
                    deadline,
                }
            }
        })
        .await
        .map_err(SwapError::Execution)?;

    info!(
        pair = %pair.id,
        direction = %direction,
        hash = ?receipt.hash,
        "Swap confirmed"
    );

    ctx.reporting.report(owner).await;
    if let Err(e) = wallet::refresh(ctx).await {
        warn!(error = %e, "Wallet refresh after swap failed");
    }
    ctx.directions.write().await.confirm_success(&pair.id);

    Ok(SwapOutcome::Succeeded {
        direction,
        amount_in: amount,
        tx_hash: receipt.hash,
    })
}
