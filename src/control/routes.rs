//! Control API route handlers.
//!
//! All endpoints return JSON. Each mutating request is validated as a unit
//! and either applied whole or rejected with no state change.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::scheduler::parse_iterations;
use crate::engine::{ControllerState, ScheduleController};
use crate::error::{ControlError, RangeError};
use crate::strategy::AmountRange;
use crate::types::{ActivityEntry, Asset, ScheduleRun, SwapDirection, WalletSnapshot};

/// Activity entries returned by `GET /api/activity`.
const ACTIVITY_PAGE: usize = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ControlState {
    pub controller: ScheduleController,
}

impl ControlState {
    pub fn new(controller: ScheduleController) -> Self {
        Self { controller }
    }
}

pub type AppState = Arc<ControlState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// JSON error body with the status it maps to.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        let status = match &err {
            ControlError::InvalidOperatorInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ControlError::AlreadyRunning(_) | ControlError::Busy(_) => StatusCode::CONFLICT,
            ControlError::Refresh(_) => StatusCode::BAD_GATEWAY,
            ControlError::UnknownPair(_) | ControlError::Range(RangeError::UnknownPair(_)) => {
                StatusCode::NOT_FOUND
            }
            ControlError::Range(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub state: ControllerState,
    pub run: Option<ScheduleRun>,
    pub wallet: WalletSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairView {
    pub id: String,
    pub native: Asset,
    pub token: Asset,
    pub next_direction: Option<SwapDirection>,
    pub ranges: BTreeMap<String, AmountRange>,
}

#[derive(Debug, Deserialize)]
pub struct RangeUpdate {
    pub asset: String,
    pub min: Decimal,
    pub max: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct RangesRequest {
    pub ranges: Vec<RangeUpdate>,
}

/// Iteration count as typed by an operator: a number or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IterationInput {
    Count(i64),
    Text(String),
}

impl IterationInput {
    fn parse(&self) -> Result<u32, ControlError> {
        match self {
            IterationInput::Count(n) => parse_iterations(&n.to_string()),
            IterationInput::Text(s) => parse_iterations(s),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub pair: String,
    pub iterations: IterationInput,
}

#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub run_id: Uuid,
    pub pair: String,
    pub iterations: u32,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let controller = &state.controller;
    let wallet = controller.context().snapshot.read().await.clone();
    Json(StatusResponse {
        state: controller.state(),
        run: controller.latest_run(),
        wallet,
    })
}

/// GET /api/pairs
pub async fn get_pairs(State(state): State<AppState>) -> Json<Vec<PairView>> {
    let ctx = state.controller.context();
    let ranges = ctx.ranges.read().await;
    let directions = ctx.directions.read().await;
    let views = ctx
        .pairs
        .iter()
        .map(|p| PairView {
            id: p.id.clone(),
            native: p.native.clone(),
            token: p.token.clone(),
            next_direction: directions.current(&p.id),
            ranges: ranges.pair(&p.id).cloned().unwrap_or_default(),
        })
        .collect();
    Json(views)
}

/// PUT /api/pairs/:id/ranges
pub async fn put_ranges(
    State(state): State<AppState>,
    Path(pair_id): Path<String>,
    Json(req): Json<RangesRequest>,
) -> Result<Json<BTreeMap<String, AmountRange>>, ApiError> {
    if req.ranges.is_empty() {
        return Err(ControlError::InvalidOperatorInput("no ranges given".into()).into());
    }
    let updates: Vec<(String, Decimal, Decimal)> = req
        .ranges
        .into_iter()
        .map(|r| (r.asset, r.min, r.max))
        .collect();

    let ctx = state.controller.context();
    let mut ranges = ctx.ranges.write().await;
    ranges
        .apply(&pair_id, &updates)
        .map_err(|e| ApiError::from(ControlError::from(e)))?;
    info!(pair = %pair_id, updated = updates.len(), "Amount ranges updated");
    Ok(Json(ranges.pair(&pair_id).cloned().unwrap_or_default()))
}

/// POST /api/runs
pub async fn start_run(
    State(state): State<AppState>,
    Json(req): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<StartRunResponse>), ApiError> {
    let iterations = req.iterations.parse()?;
    let ticket = state.controller.start(&req.pair, iterations)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartRunResponse {
            run_id: ticket.run_id,
            pair: req.pair,
            iterations,
        }),
    ))
}

/// POST /api/runs/cancel
pub async fn cancel_run(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cancelled = state.controller.cancel();
    Json(serde_json::json!({ "cancelled": cancelled }))
}

/// POST /api/wallet/refresh
///
/// Refused while a run is active; the run refreshes after every success.
pub async fn refresh_wallet(
    State(state): State<AppState>,
) -> Result<Json<WalletSnapshot>, ApiError> {
    match state.controller.refresh_wallet().await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => {
            warn!(error = %e, "Operator wallet refresh failed");
            Err(e.into())
        }
    }
}

/// GET /api/activity
pub async fn get_activity(State(state): State<AppState>) -> Json<Vec<ActivityEntry>> {
    Json(state.controller.context().recent_activity(ACTIVITY_PAGE).await)
}
