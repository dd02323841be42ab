//! Schedule controller.
//!
//! Runs a bounded number of swap attempts for one pair with a randomized
//! pause between them. Only one run may be active process-wide. A run can
//! be cancelled at any time; the request takes effect at the top of the
//! next iteration or immediately if the run is waiting between attempts.
//!
//! Idle → Running → {Completed, Cancelled} → Idle

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::context::SwapContext;
use super::swap::attempt_swap;
use super::wallet;
use crate::error::ControlError;
use crate::types::{ActivityEntry, RunState, ScheduleRun, SwapPair, WalletSnapshot};

// ---------------------------------------------------------------------------
// Delay window
// ---------------------------------------------------------------------------

/// Inclusive window the inter-iteration pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayWindow {
    pub min: Duration,
    pub max: Duration,
}

impl DelayWindow {
    pub fn from_secs(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max.max(min)),
        }
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let ms = rand::thread_rng().gen_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(ms as u64)
    }
}

impl Default for DelayWindow {
    fn default() -> Self {
        Self::from_secs(30, 60)
    }
}

/// Parse an operator-supplied iteration count.
pub fn parse_iterations(raw: &str) -> Result<u32, ControlError> {
    let trimmed = raw.trim();
    match trimmed.parse::<i64>() {
        Ok(n) if n > 0 => u32::try_from(n)
            .map_err(|_| ControlError::InvalidOperatorInput(format!("iteration count {n} too large"))),
        Ok(n) => Err(ControlError::InvalidOperatorInput(format!(
            "iteration count must be positive, got {n}"
        ))),
        Err(_) => Err(ControlError::InvalidOperatorInput(format!(
            "iteration count must be a whole number, got {trimmed:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerState {
    Idle,
    Running,
}

/// Handle to a started run.
pub struct RunTicket {
    pub run_id: Uuid,
    /// Resolves with the final run record once the run stops.
    pub handle: JoinHandle<ScheduleRun>,
}

#[derive(Debug, Clone)]
struct ActiveRun {
    id: Uuid,
    pair: String,
    cancel: CancellationToken,
}

/// Whoever currently writes the wallet snapshot.
#[derive(Debug, Clone)]
enum Occupant {
    Run(ActiveRun),
    Refresh(Uuid),
}

impl Occupant {
    fn id(&self) -> Uuid {
        match self {
            Occupant::Run(run) => run.id,
            Occupant::Refresh(id) => *id,
        }
    }
}

type RunSlot = Arc<Mutex<Option<Occupant>>>;

/// Clears the slot when its holder ends, however it ends.
struct SlotGuard {
    slot: RunSlot,
    id: Uuid,
}

impl SlotGuard {
    /// Clear the slot and run `publish` under the same lock, so nothing can
    /// take the slot in between.
    fn release_with(self, publish: impl FnOnce()) {
        {
            let mut slot = lock(&self.slot);
            if slot.as_ref().map(Occupant::id) == Some(self.id) {
                *slot = None;
            }
            publish();
        }
        // Drop finds the slot already clear.
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if slot.as_ref().map(Occupant::id) == Some(self.id) {
            *slot = None;
        }
    }
}

fn lock(slot: &RunSlot) -> MutexGuard<'_, Option<Occupant>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct ScheduleController {
    ctx: Arc<SwapContext>,
    delay: DelayWindow,
    active: RunSlot,
    progress: Arc<watch::Sender<Option<ScheduleRun>>>,
}

impl ScheduleController {
    pub fn new(ctx: Arc<SwapContext>, delay: DelayWindow) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            ctx,
            delay,
            active: Arc::new(Mutex::new(None)),
            progress: Arc::new(tx),
        }
    }

    pub fn context(&self) -> &Arc<SwapContext> {
        &self.ctx
    }

    pub fn state(&self) -> ControllerState {
        match lock(&self.active).as_ref() {
            Some(Occupant::Run(_)) => ControllerState::Running,
            _ => ControllerState::Idle,
        }
    }

    /// Latest progress of the active run, or of the last run if idle.
    pub fn latest_run(&self) -> Option<ScheduleRun> {
        self.progress.borrow().clone()
    }

    /// Progress updates for the current and future runs.
    pub fn subscribe(&self) -> watch::Receiver<Option<ScheduleRun>> {
        self.progress.subscribe()
    }

    /// Start a run of `iterations` attempts for `pair_id`.
    pub fn start(&self, pair_id: &str, iterations: u32) -> Result<RunTicket, ControlError> {
        if iterations == 0 {
            return Err(ControlError::InvalidOperatorInput(
                "iteration count must be positive, got 0".into(),
            ));
        }
        let pair = self
            .ctx
            .pair(pair_id)
            .cloned()
            .ok_or_else(|| ControlError::UnknownPair(pair_id.to_string()))?;

        let run = ScheduleRun::new(&pair.id, iterations);
        let cancel = CancellationToken::new();
        {
            let mut slot = lock(&self.active);
            match slot.as_ref() {
                Some(Occupant::Run(active)) => {
                    return Err(ControlError::AlreadyRunning(active.pair.clone()))
                }
                Some(Occupant::Refresh(_)) => {
                    return Err(ControlError::Busy("wallet refresh in progress".into()))
                }
                None => {}
            }
            *slot = Some(Occupant::Run(ActiveRun {
                id: run.id,
                pair: pair.id.clone(),
                cancel: cancel.clone(),
            }));
            self.progress.send_replace(Some(run.clone()));
        }

        info!(run_id = %run.id, pair = %pair.id, iterations, "Run started");

        let run_id = run.id;
        let guard = SlotGuard {
            slot: self.active.clone(),
            id: run_id,
        };
        let ctx = self.ctx.clone();
        let progress = self.progress.clone();
        let delay = self.delay;
        let handle = tokio::spawn(run_loop(ctx, pair, run, delay, cancel, progress, guard));

        Ok(RunTicket { run_id, handle })
    }

    /// Request cancellation of the active run. Returns false when idle.
    pub fn cancel(&self) -> bool {
        match lock(&self.active).as_ref() {
            Some(Occupant::Run(active)) => {
                info!(run_id = %active.id, pair = %active.pair, "Cancellation requested");
                active.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Operator-triggered snapshot refresh. Holds the slot for its whole
    /// duration, so no run can start while it writes the snapshot.
    pub async fn refresh_wallet(&self) -> Result<WalletSnapshot, ControlError> {
        let id = Uuid::new_v4();
        {
            let mut slot = lock(&self.active);
            match slot.as_ref() {
                Some(Occupant::Run(active)) => {
                    return Err(ControlError::AlreadyRunning(active.pair.clone()))
                }
                Some(Occupant::Refresh(_)) => {
                    return Err(ControlError::Busy("wallet refresh in progress".into()))
                }
                None => *slot = Some(Occupant::Refresh(id)),
            }
        }
        let _guard = SlotGuard {
            slot: self.active.clone(),
            id,
        };
        Ok(wallet::refresh(&self.ctx).await?)
    }
}

async fn run_loop(
    ctx: Arc<SwapContext>,
    pair: SwapPair,
    mut run: ScheduleRun,
    delay: DelayWindow,
    cancel: CancellationToken,
    progress: Arc<watch::Sender<Option<ScheduleRun>>>,
    slot: SlotGuard,
) -> ScheduleRun {
    for iteration in 1..=run.requested {
        if cancel.is_cancelled() {
            run.state = RunState::Cancelled;
            break;
        }

        info!(pair = %pair.id, iteration, of = run.requested, "Starting swap iteration");
        let outcome = attempt_swap(&ctx, &pair).await;
        run.record(&outcome);
        ctx.record_activity(ActivityEntry {
            timestamp: Utc::now(),
            run_id: run.id,
            pair: pair.id.clone(),
            iteration,
            outcome,
        })
        .await;
        progress.send_replace(Some(run.clone()));

        if iteration == run.requested {
            break;
        }

        let pause = delay.sample();
        run.next_attempt_at = chrono::Duration::from_std(pause)
            .ok()
            .map(|d| Utc::now() + d);
        progress.send_replace(Some(run.clone()));
        info!(pair = %pair.id, secs = pause.as_secs(), "Waiting before next swap");

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = cancel.cancelled() => {
                warn!(pair = %pair.id, completed = run.completed, "Run cancelled during wait");
                run.state = RunState::Cancelled;
            }
        }
        run.next_attempt_at = None;
        if run.state == RunState::Cancelled {
            break;
        }
    }

    if run.state == RunState::Running {
        run.state = RunState::Completed;
    }
    info!(
        run_id = %run.id,
        pair = %pair.id,
        state = %run.state,
        completed = run.completed,
        succeeded = run.succeeded,
        skipped = run.skipped,
        failed = run.failed,
        "Run finished"
    );
    slot.release_with(|| {
        progress.send_replace(Some(run.clone()));
    });
    run
}
