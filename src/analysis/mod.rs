//! Price-history analysis: summary statistics and the cheapness decision.
//!
//! Everything here is pure: functions take a history slice and return a
//! value. Scoping history to a rental window happens at the storage
//! boundary, so these functions work on any sequence of prices.

pub mod cheapness;
pub mod stats;

pub use cheapness::{is_cheap, MIN_HISTORY};
pub use stats::{average, get_stats, median, percentile};
