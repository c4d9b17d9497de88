//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`;
//! every handler goes straight to the run store.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::analysis::{get_stats, percentile, MIN_HISTORY};
use crate::storage::{RunFilter, RunStore, StorageError};
use crate::types::{NewRun, RentalWindow, RentwatchError, Run, RunId};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub store: RunStore,
    /// Window used when a request names none.
    pub window: RentalWindow,
    pub cheap_percentile: f64,
}

impl DashboardState {
    pub fn new(store: RunStore, window: RentalWindow, cheap_percentile: f64) -> Self {
        Self {
            store,
            window,
            cheap_percentile,
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// `?pickup_date=…&dropoff_date=…`. With neither given the configured window
/// is used; with only one given the other is left unconstrained.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub pickup_date: Option<String>,
    pub dropoff_date: Option<String>,
}

impl WindowQuery {
    fn filter(self, default: &RentalWindow) -> RunFilter {
        if self.pickup_date.is_none() && self.dropoff_date.is_none() {
            return RunFilter::window(default);
        }
        RunFilter {
            pickup_date: self.pickup_date,
            dropoff_date: self.dropoff_date,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub pickup_date: Option<String>,
    pub dropoff_date: Option<String>,
    pub count: usize,
    pub average: Option<f64>,
    pub median: Option<f64>,
    pub p25: Option<f64>,
    pub cheap_percentile: f64,
    /// `None` until the window has enough history to judge against.
    pub cheap_threshold: Option<f64>,
    pub latest: Option<Run>,
}

/// Body of `POST /api/ingest`: the object printed by `rentwatch once --json`.
/// `run_at` and `min_price_per_day` may be present but are ignored; both are
/// set server side.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub pickup_date: String,
    pub dropoff_date: String,
    pub rental_days: u32,
    pub min_total_price: Option<f64>,
    #[serde(default)]
    pub num_offers: u32,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestResponse {
    pub stored: bool,
    pub id: Option<RunId>,
}

/// Handler failure with a JSON `{error}` body.
#[derive(Debug)]
pub enum ApiError {
    /// Request body that cannot become a run: `422`.
    Invalid(String),
    /// Run store failure: `500`.
    Storage(StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<RentwatchError> for ApiError {
    fn from(e: RentwatchError) -> Self {
        match e {
            RentwatchError::InvalidRun(msg) => Self::Invalid(msg),
            other => Self::Invalid(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Invalid(msg) => {
                warn!(reason = %msg, "Ingest rejected");
                msg
            }
            Self::Storage(e) => {
                error!(error = %e, "Dashboard request failed");
                e.to_string()
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/stats
pub async fn get_stats_summary(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    let filter = query.filter(&state.window);
    let runs = state.store.list(&filter).await?;
    let history: Vec<f64> = runs.iter().filter_map(|r| r.min_price_per_day).collect();
    let stats = get_stats(&history);

    let cheap_threshold = if history.len() >= MIN_HISTORY {
        percentile(&history, state.cheap_percentile)
    } else {
        None
    };

    Ok(Json(StatsResponse {
        pickup_date: filter.pickup_date,
        dropoff_date: filter.dropoff_date,
        count: stats.count,
        average: stats.average,
        median: stats.median,
        p25: stats.p25,
        cheap_percentile: state.cheap_percentile,
        cheap_threshold,
        latest: runs.last().cloned(),
    }))
}

/// GET /api/runs
pub async fn get_runs(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<Run>>, ApiError> {
    let runs = state.store.list(&query.filter(&state.window)).await?;
    Ok(Json(runs))
}

/// POST /api/ingest
///
/// Dates must be `YYYY-MM-DD` with dropoff not before pickup, a price must be
/// a positive amount and a url must be http(s); anything else is `422`.
pub async fn ingest_run(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let run = NewRun::try_new(
        RentalWindow::new(req.pickup_date, req.dropoff_date),
        req.rental_days,
        req.min_total_price,
        req.num_offers,
        req.url.filter(|u| !u.trim().is_empty()),
    )?;
    if run.min_total_price().is_none() {
        info!(
            pickup = %run.pickup_date(),
            dropoff = %run.dropoff_date(),
            "Ingest without a price acknowledged, nothing stored"
        );
        return Ok((StatusCode::OK, Json(IngestResponse { stored: false, id: None })));
    }

    let id = state.store.append(&run).await?;
    Ok((
        StatusCode::CREATED,
        Json(IngestResponse { stored: true, id: Some(id) }),
    ))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
