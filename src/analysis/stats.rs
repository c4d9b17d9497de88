//! Summary statistics over per-day price history.

use crate::types::Stats;

/// Percentile used for the `p25` field of [`Stats`].
pub const STATS_PERCENTILE: f64 = 0.25;

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut s = values.to_vec();
    s.sort_by(|a, b| a.total_cmp(b));
    s
}

/// Arithmetic mean. `None` on empty input.
pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Middle value of the sorted input; mean of the two middle values for an
/// even count. `None` on empty input.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let s = sorted(values);
    let n = s.len();
    if n % 2 == 1 {
        Some(s[n / 2])
    } else {
        Some((s[n / 2 - 1] + s[n / 2]) / 2.0)
    }
}

/// Percentile with linear interpolation between order statistics.
///
/// `p` is a fraction in `[0, 1]` (0.25 = 25th percentile). With the input
/// sorted into `s` and `k = (n - 1) * p`, the result is `s[k]` when `k` is
/// integral and otherwise the weighted mix of `s[floor(k)]` and
/// `s[ceil(k)]`. Returns `None` for empty input or `p` outside `[0, 1]`.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let s = sorted(values);
    let k = (s.len() - 1) as f64 * p;
    let f = k.floor();
    let c = k.ceil();
    if f == c {
        return Some(s[k as usize]);
    }
    Some(s[f as usize] * (c - k) + s[c as usize] * (k - f))
}

/// Average, median, 25th percentile and count in one record.
pub fn get_stats(history: &[f64]) -> Stats {
    Stats {
        average: average(history),
        median: median(history),
        p25: percentile(history, STATS_PERCENTILE),
        count: history.len(),
    }
}
