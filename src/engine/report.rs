//! Console reports for a finished cycle and for stored history.

use std::fmt::Write;

use crate::types::{CycleReport, RentalWindow, Run, Stats};

/// Number of most recent runs listed by [`stats_summary`].
pub const RECENT_RUNS: usize = 5;

/// Multi-line summary printed after a completed cycle.
pub fn cycle_summary(label: &str, report: &CycleReport) -> String {
    let obs = &report.observation;
    let total = obs.min_total_price.unwrap_or_default();
    let mut out = String::new();

    let _ = writeln!(out, "\n--- {label} ---");
    let _ = writeln!(
        out,
        "Pickup {} → Dropoff {} ({} days)",
        obs.pickup_date, obs.dropoff_date, obs.rental_days
    );
    let _ = writeln!(
        out,
        "Current min: €{total:.2} total (€{:.2}/day)",
        report.min_price_per_day
    );
    let _ = writeln!(out, "Offers found: {}", obs.all_prices.len());
    write_history_line(&mut out, &report.stats);
    if let Some(threshold) = report.evaluation.threshold {
        let verdict = if report.evaluation.cheap { "cheap" } else { "not cheap" };
        let _ = writeln!(out, "Cheap threshold: €{threshold:.2}/day ({verdict})");
    } else if report.evaluation.cheap {
        let _ = writeln!(out, "Not enough history yet: treated as cheap");
    }
    let _ = writeln!(out, "Search: {}", obs.url);
    out
}

fn write_history_line(out: &mut String, stats: &Stats) {
    if stats.count == 0 {
        return;
    }
    if let (Some(avg), Some(median)) = (stats.average, stats.median) {
        let _ = writeln!(
            out,
            "History: {} runs | avg €{avg:.2}/day | median €{median:.2}/day",
            stats.count
        );
    }
    if let Some(p25) = stats.p25 {
        let _ = writeln!(out, "25th percentile: €{p25:.2}/day (below = cheap)");
    }
}

/// Read-only report over the stored history of one window.
pub fn stats_summary(label: &str, window: &RentalWindow, stats: &Stats, runs: &[Run]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n--- Stats ({label}) ---");
    let _ = writeln!(out, "Date range: {window}");
    let _ = writeln!(out, "Runs recorded: {}", stats.count);

    match (stats.average, stats.median) {
        (Some(avg), Some(median)) => {
            let _ = writeln!(out, "Avg price/day: €{avg:.2}");
            let _ = writeln!(out, "Median price/day: €{median:.2}");
            if let Some(p25) = stats.p25 {
                let _ = writeln!(out, "25th percentile (cheap threshold): €{p25:.2}/day");
            }
            let _ = writeln!(out, "\nLast {RECENT_RUNS} runs:");
            let start = runs.len().saturating_sub(RECENT_RUNS);
            for run in &runs[start..] {
                let _ = writeln!(out, "  {run}");
            }
        }
        _ => {
            let _ = writeln!(out, "No data yet. Run `rentwatch once` to fetch prices.");
        }
    }
    out
}
