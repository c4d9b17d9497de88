//! Persistence layer.
//!
//! Append-only run history in a single SQLite file. Each fetch that
//! produced a price becomes one row in `runs`; rows are never updated
//! or deleted. Reads are always scoped by rental window when the caller
//! supplies one.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{format_run_at, NewRun, RentalWindow, Run, RunId};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_at TEXT NOT NULL,
    pickup_date TEXT NOT NULL,
    dropoff_date TEXT NOT NULL,
    rental_days INTEGER NOT NULL,
    min_total_price REAL,
    min_price_per_day REAL,
    num_offers INTEGER,
    url TEXT
)";

const SELECT_RUNS: &str = "
SELECT id, run_at, pickup_date, dropoff_date, rental_days,
       min_total_price, min_price_per_day, num_offers, url
FROM runs
WHERE 1 = 1";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures reading or writing the run store. Unlike fetch and notify
/// failures these end the current cycle.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to create storage directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to open run store {path}: {source}")]
    Open { path: PathBuf, source: sqlx::Error },

    #[error("Failed to create runs table: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("Run store query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Corrupt run row {id}: {message}")]
    Corrupt { id: i64, message: String },
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Exact-match filter on the window dates. An empty filter selects every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    pub pickup_date: Option<String>,
    pub dropoff_date: Option<String>,
}

impl RunFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn window(window: &RentalWindow) -> Self {
        Self {
            pickup_date: Some(window.pickup_date.clone()),
            dropoff_date: Some(window.dropoff_date.clone()),
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(pickup) = &self.pickup_date {
            query.push(" AND pickup_date = ").push_bind(pickup.clone());
        }
        if let Some(dropoff) = &self.dropoff_date {
            query.push(" AND dropoff_date = ").push_bind(dropoff.clone());
        }
    }
}

impl From<&RentalWindow> for RunFilter {
    fn from(window: &RentalWindow) -> Self {
        Self::window(window)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    id: i64,
    run_at: String,
    pickup_date: String,
    dropoff_date: String,
    rental_days: i64,
    min_total_price: Option<f64>,
    min_price_per_day: Option<f64>,
    num_offers: Option<i64>,
    url: Option<String>,
}

impl TryFrom<RunRow> for Run {
    type Error = StorageError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |message: String| StorageError::Corrupt { id, message };
        let run_at = DateTime::parse_from_rfc3339(&row.run_at)
            .map_err(|e| corrupt(format!("bad run_at {:?}: {e}", row.run_at)))?
            .with_timezone(&Utc);
        let rental_days = u32::try_from(row.rental_days)
            .map_err(|_| corrupt(format!("bad rental_days {}", row.rental_days)))?;
        let num_offers = u32::try_from(row.num_offers.unwrap_or(0))
            .map_err(|_| corrupt(format!("bad num_offers {:?}", row.num_offers)))?;
        Ok(Run {
            id: RunId(id),
            run_at,
            pickup_date: row.pickup_date,
            dropoff_date: row.dropoff_date,
            rental_days,
            min_total_price: row.min_total_price,
            min_price_per_day: row.min_price_per_day,
            num_offers,
            url: row.url,
        })
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Durable, queryable record of all runs.
///
/// Cloning is cheap: clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct RunStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl RunStore {
    /// Open (or create) the store at `path`, creating parent directories and
    /// the `runs` table if they do not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        // A single writer and no concurrent cycles: one connection suffices.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|source| StorageError::Open {
                path: path.clone(),
                source,
            })?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(StorageError::Schema)?;

        debug!(path = %path.display(), "Run store opened");
        Ok(Self { pool, path })
    }

    /// Location of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a new run, stamping `run_at` with the current UTC time.
    pub async fn append(&self, run: &NewRun) -> Result<RunId, StorageError> {
        self.append_at(run, Utc::now()).await
    }

    /// Persist a run with an explicit timestamp.
    pub async fn append_at(
        &self,
        run: &NewRun,
        run_at: DateTime<Utc>,
    ) -> Result<RunId, StorageError> {
        let result = sqlx::query(
            "INSERT INTO runs (run_at, pickup_date, dropoff_date, rental_days, \
             min_total_price, min_price_per_day, num_offers, url) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(format_run_at(&run_at))
        .bind(run.pickup_date())
        .bind(run.dropoff_date())
        .bind(i64::from(run.rental_days()))
        .bind(run.min_total_price())
        .bind(run.min_price_per_day())
        .bind(i64::from(run.num_offers()))
        .bind(run.url())
        .execute(&self.pool)
        .await?;

        let id = RunId(result.last_insert_rowid());
        info!(
            run_id = %id,
            min_total = run.min_total_price().unwrap_or(0.0),
            min_per_day = run.min_price_per_day().unwrap_or(0.0),
            "Saved run"
        );
        Ok(id)
    }

    /// All runs matching `filter`, oldest first.
    pub async fn list(&self, filter: &RunFilter) -> Result<Vec<Run>, StorageError> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_RUNS);
        filter.push_conditions(&mut query);
        query.push(" ORDER BY run_at ASC, id ASC");

        let rows = query.build_query_as::<RunRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Run::try_from).collect()
    }

    /// Per-day prices of the matching runs, oldest first, nulls skipped.
    pub async fn price_per_day_history(&self, filter: &RunFilter) -> Result<Vec<f64>, StorageError> {
        Ok(self
            .list(filter)
            .await?
            .into_iter()
            .filter_map(|run| run.min_price_per_day)
            .collect())
    }

    /// Number of runs matching `filter`.
    pub async fn count(&self, filter: &RunFilter) -> Result<u64, StorageError> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM runs WHERE 1 = 1");
        filter.push_conditions(&mut query);
        let count = query.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
