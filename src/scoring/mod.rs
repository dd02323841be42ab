//! External scoring service (leaderboard points and task reporting).
//!
//! Everything here is best-effort. Callers get defaults, never errors, so
//! the scoring service being down cannot stall a swap run.

pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::Address;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Leaderboard standing of a wallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub points: u64,
    pub rank: u64,
}

/// Points awarded for a reported task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskAward {
    pub points_awarded: u64,
}

#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Current points and rank of `wallet`.
    async fn standing(&self, wallet: Address) -> Result<Standing>;

    /// Report one completed swap for `wallet`.
    async fn complete_task(&self, wallet: Address) -> Result<TaskAward>;
}

/// Scoring stand-in used when scoring is disabled in config.
pub struct NoScoring;

#[async_trait]
impl ScoringService for NoScoring {
    async fn standing(&self, _wallet: Address) -> Result<Standing> {
        Ok(Standing::default())
    }

    async fn complete_task(&self, _wallet: Address) -> Result<TaskAward> {
        Ok(TaskAward::default())
    }
}

// ---------------------------------------------------------------------------
// Reporting sink
// ---------------------------------------------------------------------------

/// Fire-and-forget wrapper around a [`ScoringService`].
#[derive(Clone)]
pub struct ReportingSink {
    service: Arc<dyn ScoringService>,
}

impl ReportingSink {
    pub fn new(service: Arc<dyn ScoringService>) -> Self {
        Self { service }
    }

    /// Report a completed swap. Returns whether the service accepted it.
    pub async fn report(&self, wallet: Address) -> bool {
        match self.service.complete_task(wallet).await {
            Ok(award) => {
                info!(points = award.points_awarded, "Swap reported");
                true
            }
            Err(e) => {
                warn!(error = %e, "Swap report failed");
                false
            }
        }
    }

    /// Wallet standing, zero on any failure.
    pub async fn standing(&self, wallet: Address) -> Standing {
        match self.service.standing(wallet).await {
            Ok(standing) => standing,
            Err(e) => {
                warn!(error = %e, "Leaderboard lookup failed, using zero points");
                Standing::default()
            }
        }
    }
}
