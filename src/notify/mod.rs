//! Cheap-price alerts.
//!
//! Defines the `Notifier` trait and the console and desktop channels.
//! Desktop delivery walks a fixed list of backends and stops at the first
//! that succeeds; if none does the alert is still on the console.

pub mod desktop;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::types::CheapAlert;
use desktop::DesktopNotifier;

/// Abstraction over alert channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one cheap-price alert.
    async fn notify(&self, alert: &CheapAlert) -> Result<()>;
}

/// Human-readable alert text, e.g.
/// "Rentalcars ALC: cheap rate €31.50/day (total €220.50 for 7 days).
/// Below 25th percentile (€34.00/day)."
pub fn alert_message(label: &str, alert: &CheapAlert, cheap_percentile: f64) -> String {
    let mut msg = format!(
        "{label}: cheap rate €{:.2}/day (total €{:.2} for {} days).",
        alert.price_per_day, alert.total_price, alert.rental_days,
    );
    if let Some(threshold) = alert.threshold {
        msg.push_str(&format!(
            " Below {} percentile (€{threshold:.2}/day).",
            ordinal((cheap_percentile * 100.0).round() as u32),
        ));
    }
    msg
}

/// `1` → "1st", `22` → "22nd", `13` → "13th".
fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

// ---------------------------------------------------------------------------
// Console + desktop dispatcher
// ---------------------------------------------------------------------------

/// Prints every alert to stderr and, when enabled, raises a desktop
/// notification. Desktop failures are logged and otherwise ignored.
pub struct AlertDispatcher {
    label: String,
    cheap_percentile: f64,
    desktop: Option<DesktopNotifier>,
}

impl AlertDispatcher {
    pub fn new(label: impl Into<String>, cheap_percentile: f64, desktop_notify: bool) -> Self {
        Self {
            label: label.into(),
            cheap_percentile,
            desktop: desktop_notify.then(DesktopNotifier::new),
        }
    }
}

#[async_trait]
impl Notifier for AlertDispatcher {
    async fn notify(&self, alert: &CheapAlert) -> Result<()> {
        let msg = alert_message(&self.label, alert, self.cheap_percentile);
        eprintln!("{msg}");
        eprintln!("Search: {}", alert.url);

        if let Some(desktop) = &self.desktop {
            let title = format!("{} – cheap rate", self.label);
            match desktop.send(&title, &msg).await {
                Ok(backend) => info!(backend, "Desktop notification sent"),
                Err(e) => warn!(error = %e, "Desktop notification not sent"),
            }
        }
        Ok(())
    }
}
