//! Fake fetcher and notifier for integration testing.
//!
//! Both are deterministic and in-memory. State lives behind `Arc<Mutex<_>>`
//! so a test keeps a handle after boxing the fake into an orchestrator.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rentwatch::fetcher::PriceFetcher;
use rentwatch::notify::Notifier;
use rentwatch::types::{CheapAlert, Observation, RentalWindow};

pub const SEARCH_URL: &str = "https://www.rentalcars.com/search-results?locationIata=ALC";

pub fn july() -> RentalWindow {
    RentalWindow::new("2026-07-01", "2026-07-08")
}

/// One scripted fetch result.
#[derive(Debug, Clone)]
pub enum Scripted {
    Prices(Vec<f64>),
    Error(String),
}

/// A fetcher that replays a fixed script of results, one per call. Once
/// the script runs out every fetch finds no offers.
#[derive(Clone)]
pub struct FakeFetcher {
    window: RentalWindow,
    rental_days: u32,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<Mutex<usize>>,
}

impl FakeFetcher {
    pub fn new(window: RentalWindow, rental_days: u32, script: Vec<Scripted>) -> Self {
        Self {
            window,
            rental_days,
            script: Arc::new(Mutex::new(script.into())),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Script of per-day prices for a 7-day July rental; each becomes a
    /// single offer with total `per_day * 7`.
    pub fn per_day_series(per_day: &[f64]) -> Self {
        let script = per_day
            .iter()
            .map(|p| Scripted::Prices(vec![p * 7.0]))
            .collect();
        Self::new(july(), 7, script)
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PriceFetcher for FakeFetcher {
    async fn fetch(&self) -> Result<Observation> {
        *self.calls.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Prices(prices)) => Ok(Observation::from_prices(
                &self.window,
                self.rental_days,
                SEARCH_URL,
                prices,
            )),
            Some(Scripted::Error(msg)) => Err(anyhow!(msg)),
            None => Ok(Observation::empty(&self.window, self.rental_days, SEARCH_URL)),
        }
    }
}

/// A notifier that records every alert it receives.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<CheapAlert>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records alerts but reports every delivery as failed.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn alerts(&self) -> Vec<CheapAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &CheapAlert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        if self.fail {
            return Err(anyhow!("no notification backend available"));
        }
        Ok(())
    }
}

/// Fresh database path under the system temp dir.
pub fn temp_db_path() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("rentwatch_it_{}", uuid::Uuid::new_v4()));
    p.push("prices.db");
    p
}

pub fn cleanup(path: &Path) {
    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}
