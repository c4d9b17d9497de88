//! Run orchestration.
//!
//! One cycle is fetch → persist → stats → evaluate → notify. The watch
//! loop runs a cycle, then sleeps the full poll interval, forever. Fetch
//! and notifier failures are logged and skipped; storage failures end the
//! cycle and are returned to the caller.

pub mod report;

use chrono::{SubsecRound, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analysis::{get_stats, is_cheap};
use crate::fetcher::PriceFetcher;
use crate::notify::Notifier;
use crate::storage::{RunFilter, RunStore, StorageError};
use crate::types::{CheapAlert, CycleOutcome, CycleReport, NewRun, NoResultReason};

/// Coordinates the fetcher, store, analysis and notifier.
pub struct Orchestrator {
    fetcher: Box<dyn PriceFetcher>,
    notifier: Box<dyn Notifier>,
    store: RunStore,
    cheap_percentile: f64,
}

impl Orchestrator {
    pub fn new(
        fetcher: Box<dyn PriceFetcher>,
        notifier: Box<dyn Notifier>,
        store: RunStore,
        cheap_percentile: f64,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            store,
            cheap_percentile,
        }
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    /// Run a single fetch → persist → evaluate → notify cycle.
    ///
    /// Returns `NoResult` without touching the store when the fetch fails or
    /// finds no offers.
    pub async fn run_once(&self) -> Result<CycleOutcome, StorageError> {
        // 1. Fetch
        let observation = match self.fetcher.fetch().await {
            Ok(obs) => obs,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Fetch failed, no run recorded");
                return Ok(CycleOutcome::NoResult(NoResultReason::FetchFailed(
                    format!("{e:#}"),
                )));
            }
        };

        // 2. Skip empty scrapes
        let Some(new_run) = NewRun::from_observation(&observation) else {
            warn!(
                url = %observation.url,
                "No prices extracted, no run recorded. Try dump-html and inspect the page."
            );
            return Ok(CycleOutcome::NoResult(NoResultReason::NoOffers));
        };

        // 3-4. Derive per-day price and persist
        let total = new_run.min_total_price().unwrap_or_default();
        let min_price_per_day = new_run.min_price_per_day().unwrap_or_default();
        // Stored text keeps microseconds; match it so the report equals a read-back.
        let run_at = Utc::now().trunc_subsecs(6);
        let run_id = self.store.append_at(&new_run, run_at).await?;

        // 5. History for this window only
        let filter = RunFilter::window(&observation.window());
        let history = self.store.price_per_day_history(&filter).await?;
        let stats = get_stats(&history);
        debug!(
            count = stats.count,
            average = ?stats.average,
            median = ?stats.median,
            p25 = ?stats.p25,
            "History stats"
        );

        // 6. Decide
        let evaluation = is_cheap(min_price_per_day, self.cheap_percentile, &history);

        // 7. Alert
        let mut notified = false;
        if evaluation.cheap && !observation.url.is_empty() {
            let alert = CheapAlert {
                price_per_day: min_price_per_day,
                total_price: total,
                rental_days: new_run.rental_days(),
                threshold: evaluation.threshold,
                url: observation.url.clone(),
            };
            match self.notifier.notify(&alert).await {
                Ok(()) => notified = true,
                Err(e) => warn!(error = %e, "Notification failed"),
            }
        }

        info!(
            run_id = %run_id,
            min_total = total,
            min_per_day = min_price_per_day,
            offers = observation.all_prices.len(),
            cheap = evaluation.cheap,
            threshold = ?evaluation.threshold,
            "Cycle complete"
        );

        // 8. Report
        Ok(CycleOutcome::Completed(CycleReport {
            run_id,
            run_at,
            observation,
            min_price_per_day,
            stats,
            evaluation,
            notified,
        }))
    }

    /// Poll forever: run a cycle, hand the outcome to `on_cycle`, sleep the
    /// full `interval`. Only a storage error ends the loop.
    pub async fn watch<F>(&self, interval: Duration, mut on_cycle: F) -> Result<(), StorageError>
    where
        F: FnMut(&CycleOutcome),
    {
        let minutes = interval.as_secs() / 60;
        info!(interval_minutes = minutes, "Watching");
        loop {
            let outcome = self.run_once().await?;
            on_cycle(&outcome);
            info!("Next run in {} min", minutes);
            tokio::time::sleep(interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
