//! Shared types for the RENTWATCH agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that the fetcher, storage,
//! analysis, and engine modules can depend on them without
//! circular references.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Row identifier assigned by the run store (monotonically increasing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `(pickup_date, dropoff_date)` pair. History is always scoped to one
/// window so that quotes for different rental periods never mix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RentalWindow {
    /// `YYYY-MM-DD`
    pub pickup_date: String,
    /// `YYYY-MM-DD`
    pub dropoff_date: String,
}

impl RentalWindow {
    pub fn new(pickup_date: impl Into<String>, dropoff_date: impl Into<String>) -> Self {
        Self {
            pickup_date: pickup_date.into(),
            dropoff_date: dropoff_date.into(),
        }
    }
}

impl fmt::Display for RentalWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.pickup_date, self.dropoff_date)
    }
}

// ---------------------------------------------------------------------------
// Observation (fetcher output)
// ---------------------------------------------------------------------------

/// What a single fetch of the search page produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Lowest total price across all offers; `None` when nothing was extracted.
    pub min_total_price: Option<f64>,
    /// Distinct offer prices, ascending.
    pub all_prices: Vec<f64>,
    pub rental_days: u32,
    pub pickup_date: String,
    pub dropoff_date: String,
    pub url: String,
}

impl Observation {
    /// An observation with no offers for the given window.
    pub fn empty(window: &RentalWindow, rental_days: u32, url: impl Into<String>) -> Self {
        Self {
            min_total_price: None,
            all_prices: Vec::new(),
            rental_days,
            pickup_date: window.pickup_date.clone(),
            dropoff_date: window.dropoff_date.clone(),
            url: url.into(),
        }
    }

    /// Build an observation from raw offer prices. Prices are deduplicated
    /// and sorted; the minimum becomes `min_total_price`.
    pub fn from_prices(
        window: &RentalWindow,
        rental_days: u32,
        url: impl Into<String>,
        mut prices: Vec<f64>,
    ) -> Self {
        prices.sort_by(|a, b| a.total_cmp(b));
        prices.dedup();
        Self {
            min_total_price: prices.first().copied(),
            all_prices: prices,
            rental_days,
            pickup_date: window.pickup_date.clone(),
            dropoff_date: window.dropoff_date.clone(),
            url: url.into(),
        }
    }

    pub fn window(&self) -> RentalWindow {
        RentalWindow::new(self.pickup_date.clone(), self.dropoff_date.clone())
    }
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

/// A run about to be persisted. `run_at` is stamped by the store.
///
/// Fields are private so that `min_price_per_day` can only ever be derived
/// from `min_total_price / rental_days`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRun {
    pickup_date: String,
    dropoff_date: String,
    rental_days: u32,
    min_total_price: Option<f64>,
    min_price_per_day: Option<f64>,
    num_offers: u32,
    url: Option<String>,
}

impl NewRun {
    pub fn new(
        window: RentalWindow,
        rental_days: u32,
        min_total_price: Option<f64>,
        num_offers: u32,
        url: Option<String>,
    ) -> Self {
        let rental_days = rental_days.max(1);
        Self {
            pickup_date: window.pickup_date,
            dropoff_date: window.dropoff_date,
            rental_days,
            min_total_price,
            min_price_per_day: min_total_price.map(|total| total / f64::from(rental_days)),
            num_offers,
            url,
        }
    }

    /// Like [`NewRun::new`], but checks the values against the run model
    /// first: both dates are `YYYY-MM-DD` with dropoff not before pickup, a
    /// price is finite and positive, a URL is `http(s)://`. Used for runs that
    /// arrive from outside the process.
    pub fn try_new(
        window: RentalWindow,
        rental_days: u32,
        min_total_price: Option<f64>,
        num_offers: u32,
        url: Option<String>,
    ) -> Result<Self, RentwatchError> {
        let pickup = parse_ymd("pickup_date", &window.pickup_date)?;
        let dropoff = parse_ymd("dropoff_date", &window.dropoff_date)?;
        if dropoff < pickup {
            return Err(RentwatchError::InvalidRun(format!(
                "dropoff_date {dropoff} is before pickup_date {pickup}"
            )));
        }
        if let Some(total) = min_total_price {
            if !total.is_finite() || total <= 0.0 {
                return Err(RentwatchError::InvalidRun(format!(
                    "min_total_price must be a positive amount, got {total}"
                )));
            }
        }
        if let Some(url) = url.as_deref() {
            if !is_web_url(url) {
                return Err(RentwatchError::InvalidRun(
                    "url must start with http:// or https://".into(),
                ));
            }
        }
        Ok(Self::new(window, rental_days, min_total_price, num_offers, url))
    }

    /// Convert a fetch result into a persistable run. Observations without a
    /// price yield `None`: empty scrapes are never written to history.
    pub fn from_observation(obs: &Observation) -> Option<Self> {
        let total = obs.min_total_price?;
        Some(Self::new(
            obs.window(),
            obs.rental_days,
            Some(total),
            u32::try_from(obs.all_prices.len()).unwrap_or(u32::MAX),
            Some(obs.url.clone()).filter(|u| !u.is_empty()),
        ))
    }

    pub fn pickup_date(&self) -> &str {
        &self.pickup_date
    }

    pub fn dropoff_date(&self) -> &str {
        &self.dropoff_date
    }

    pub fn rental_days(&self) -> u32 {
        self.rental_days
    }

    pub fn min_total_price(&self) -> Option<f64> {
        self.min_total_price
    }

    pub fn min_price_per_day(&self) -> Option<f64> {
        self.min_price_per_day
    }

    pub fn num_offers(&self) -> u32 {
        self.num_offers
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Attach the persistence metadata, producing the stored form.
    pub fn into_run(self, id: RunId, run_at: DateTime<Utc>) -> Run {
        Run {
            id,
            run_at,
            pickup_date: self.pickup_date,
            dropoff_date: self.dropoff_date,
            rental_days: self.rental_days,
            min_total_price: self.min_total_price,
            min_price_per_day: self.min_price_per_day,
            num_offers: self.num_offers,
            url: self.url,
        }
    }
}

fn parse_ymd(field: &str, value: &str) -> Result<NaiveDate, RentwatchError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| RentwatchError::InvalidRun(format!("{field} must be YYYY-MM-DD, got {value:?}")))
}

/// `true` for absolute `http://` or `https://` URLs.
pub fn is_web_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

/// A persisted run, as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub run_at: DateTime<Utc>,
    pub pickup_date: String,
    pub dropoff_date: String,
    pub rental_days: u32,
    pub min_total_price: Option<f64>,
    pub min_price_per_day: Option<f64>,
    pub num_offers: u32,
    pub url: Option<String>,
}

impl Run {
    pub fn window(&self) -> RentalWindow {
        RentalWindow::new(self.pickup_date.clone(), self.dropoff_date.clone())
    }
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min_price_per_day, self.min_total_price) {
            (Some(per_day), Some(total)) => write!(
                f,
                "{}  €{:.2}/day (total €{:.2})",
                format_run_at(&self.run_at),
                per_day,
                total,
            ),
            _ => write!(f, "{}  no price", format_run_at(&self.run_at)),
        }
    }
}

/// ISO-8601 UTC with microseconds and a trailing `Z`. Fixed width, so the
/// textual order in the store matches chronological order.
pub fn format_run_at(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// Analysis results
// ---------------------------------------------------------------------------

/// Summary statistics over a per-day price history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub average: Option<f64>,
    pub median: Option<f64>,
    /// 25th percentile.
    pub p25: Option<f64>,
    pub count: usize,
}

/// Outcome of the cheapness decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub cheap: bool,
    /// Percentile threshold used; `None` during cold start or when undefined.
    pub threshold: Option<f64>,
}

/// Payload handed to the notifier when the current price is cheap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheapAlert {
    pub price_per_day: f64,
    pub total_price: f64,
    pub rental_days: u32,
    pub threshold: Option<f64>,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Cycle results
// ---------------------------------------------------------------------------

/// Summary of a completed fetch → persist → evaluate → notify cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub run_id: RunId,
    /// Timestamp written to the store for this run.
    pub run_at: DateTime<Utc>,
    pub observation: Observation,
    pub min_price_per_day: f64,
    pub stats: Stats,
    pub evaluation: Evaluation,
    /// Whether the notifier accepted an alert this cycle.
    pub notified: bool,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run #{}: {} → {} min=€{:.2}/day offers={} history={} cheap={}",
            self.run_id,
            self.observation.pickup_date,
            self.observation.dropoff_date,
            self.min_price_per_day,
            self.observation.all_prices.len(),
            self.stats.count,
            self.evaluation.cheap,
        )
    }
}

/// Why a cycle ended without persisting a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NoResultReason {
    /// The page was fetched but no offer prices were extracted.
    NoOffers,
    /// The fetch itself failed (network, timeout, bad status).
    FetchFailed(String),
}

impl fmt::Display for NoResultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOffers => write!(f, "no offers extracted"),
            Self::FetchFailed(msg) => write!(f, "fetch failed: {msg}"),
        }
    }
}

/// Result of a single `run_once` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CycleOutcome {
    Completed(CycleReport),
    NoResult(NoResultReason),
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::NoResult(_) => None,
        }
    }
}

/// One run as printed by `rentwatch once --json`. Same fields as [`Run`]
/// minus the id, with `run_at` already formatted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_at: String,
    pub pickup_date: String,
    pub dropoff_date: String,
    pub rental_days: u32,
    pub min_total_price: Option<f64>,
    pub min_price_per_day: Option<f64>,
    pub num_offers: u32,
    pub url: Option<String>,
}

impl RunRecord {
    pub fn from_observation(obs: &Observation, run_at: DateTime<Utc>) -> Self {
        let run = NewRun::new(
            obs.window(),
            obs.rental_days,
            obs.min_total_price,
            u32::try_from(obs.all_prices.len()).unwrap_or(u32::MAX),
            Some(obs.url.clone()).filter(|u| !u.is_empty()),
        );
        Self {
            run_at: format_run_at(&run_at),
            pickup_date: run.pickup_date,
            dropoff_date: run.dropoff_date,
            rental_days: run.rental_days,
            min_total_price: run.min_total_price,
            min_price_per_day: run.min_price_per_day,
            num_offers: run.num_offers,
            url: run.url,
        }
    }

    /// The record printed for a finished cycle. A completed cycle carries
    /// the persisted `run_at`. Without a result, `empty` supplies the window
    /// and `now` the timestamp; after a failed fetch the URL is dropped.
    pub fn from_outcome(
        outcome: &CycleOutcome,
        mut empty: Observation,
        now: DateTime<Utc>,
    ) -> Self {
        match outcome {
            CycleOutcome::Completed(report) => Self::from_observation(&report.observation, report.run_at),
            CycleOutcome::NoResult(NoResultReason::FetchFailed(_)) => {
                empty.url.clear();
                Self::from_observation(&empty, now)
            }
            CycleOutcome::NoResult(NoResultReason::NoOffers) => Self::from_observation(&empty, now),
        }
    }

    pub fn has_price(&self) -> bool {
        self.min_total_price.is_some()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for RENTWATCH.
///
/// Storage failures have their own type (`storage::StorageError`) since they
/// are the one class allowed to end a cycle.
#[derive(Debug, thiserror::Error)]
pub enum RentwatchError {
    #[error("Fetch error ({source_name}): {message}")]
    Fetch { source_name: String, message: String },

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid run: {0}")]
    InvalidRun(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
