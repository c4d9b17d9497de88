//! rentalcars.com search-results fetcher.
//!
//! Requests the search page for the configured location, dates and vehicle
//! filters, then runs the extraction strategy chain over the returned markup.
//! The site renders some results client-side; whatever the server sends is
//! what gets parsed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::extract::extract_prices;
use super::PriceFetcher;
use crate::config::AppConfig;
use crate::types::{Observation, RentalWindow, RentwatchError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const SOURCE_NAME: &str = "rentalcars";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default output file for `dump_page`.
pub const DEFAULT_DUMP_PATH: &str = "rentalcars_search_results.html";

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Fetches offers for one configured search.
pub struct RentalcarsClient {
    http: Client,
    url: String,
    window: RentalWindow,
    rental_days: u32,
}

impl RentalcarsClient {
    /// Build a client for the search described by `cfg`.
    pub fn new(cfg: &AppConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(cfg.watch.fetch_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            url: cfg.search_url(),
            window: cfg.window(),
            rental_days: cfg.rental_days(),
        })
    }

    /// The search URL this client requests.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_html(&self) -> Result<String> {
        debug!(url = %self.url, "Requesting search results");
        let resp = self
            .http
            .get(&self.url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml")
            .header(header::ACCEPT_LANGUAGE, "en-GB,en;q=0.9")
            .send()
            .await
            .context("rentalcars request failed")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RentwatchError::Fetch {
                source_name: SOURCE_NAME.to_string(),
                message: format!("HTTP {status}"),
            }
            .into());
        }

        resp.text()
            .await
            .context("Failed to read rentalcars response body")
    }

    /// Fetch the search page and save the raw HTML for inspecting why
    /// extraction finds nothing.
    pub async fn dump_page(&self, output: Option<&Path>) -> Result<PathBuf> {
        let out = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DUMP_PATH));
        let html = self.fetch_html().await?;
        tokio::fs::write(&out, &html)
            .await
            .with_context(|| format!("Failed to write HTML to {}", out.display()))?;
        info!(path = %out.display(), bytes = html.len(), "Saved HTML");
        Ok(out)
    }
}

#[async_trait]
impl PriceFetcher for RentalcarsClient {
    async fn fetch(&self) -> Result<Observation> {
        let html = self.fetch_html().await?;
        let extraction = extract_prices(&html);

        match extraction.strategy {
            Some(strategy) => info!(
                strategy = %strategy,
                offers = extraction.prices.len(),
                "Offer prices extracted"
            ),
            None => warn!(
                bytes = html.len(),
                "No prices found on page. Check strategies or run dump-html."
            ),
        }

        Ok(Observation::from_prices(
            &self.window,
            self.rental_days,
            self.url.clone(),
            extraction.prices,
        ))
    }
}
