//! Wallet snapshot refresh.

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{error, info};

use super::context::SwapContext;
use crate::error::LedgerError;
use crate::ledger::{from_base_units, NATIVE_DECIMALS};
use crate::types::{Asset, WalletSnapshot};

/// Read balances and leaderboard standing into a fresh snapshot and
/// install it in place of the previous one.
///
/// A failed native-balance read aborts the refresh and leaves the prior
/// snapshot in place. A failed token read records that token as zero.
pub async fn refresh(ctx: &SwapContext) -> Result<WalletSnapshot, LedgerError> {
    let wallet = ctx.wallet();
    let ledger = ctx.ledger();

    let native_units = ledger.native_balance(wallet).await?;
    let native_balance = from_base_units(native_units, NATIVE_DECIMALS).map_err(LedgerError::other)?;

    let mut token_balances = BTreeMap::new();
    for token in ctx.tracked_tokens() {
        let balance = match token_balance(ctx, &token).await {
            Ok(balance) => balance,
            Err(e) => {
                error!(token = %token.symbol, error = %e, "Token balance read failed, recording zero");
                rust_decimal::Decimal::ZERO
            }
        };
        token_balances.insert(token.symbol.clone(), balance);
    }

    let standing = ctx.reporting.standing(wallet).await;

    let snapshot = WalletSnapshot {
        address: wallet,
        native_symbol: ctx.settings.native_symbol.clone(),
        native_balance,
        token_balances,
        points: standing.points,
        rank: standing.rank,
        captured_at: Utc::now(),
    };
    info!(snapshot = %snapshot, "Wallet refreshed");

    *ctx.snapshot.write().await = snapshot.clone();
    Ok(snapshot)
}

async fn token_balance(ctx: &SwapContext, token: &Asset) -> Result<rust_decimal::Decimal, LedgerError> {
    let decimals = ctx.decimals(token).await?;
    let units = ctx.ledger().token_balance(token.address, ctx.wallet()).await?;
    from_base_units(units, decimals).map_err(LedgerError::other)
}
