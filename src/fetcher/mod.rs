//! Price fetching.
//!
//! Defines the `PriceFetcher` trait and the rentalcars.com implementation.
//! A fetcher turns the configured search into one `Observation`; an
//! observation without a price means the page loaded but no offers were
//! extracted, an `Err` means the fetch itself failed.

pub mod extract;
pub mod rentalcars;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Observation;

/// Abstraction over price sources.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    /// Fetch the current offers for the configured search.
    async fn fetch(&self) -> Result<Observation>;
}
