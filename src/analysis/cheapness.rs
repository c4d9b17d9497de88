//! The "is this cheap" decision.
//!
//! A price is cheap when it sits at or below the configured percentile of
//! past per-day prices for the same rental window. With too little history
//! to form a threshold every price counts as cheap, so the first runs are
//! always reported while history accumulates.

use tracing::debug;

use super::stats::percentile;
use crate::types::Evaluation;

/// History length below which no threshold is computed.
pub const MIN_HISTORY: usize = 3;

/// Decide whether `current_price_per_day` is cheap relative to `history`.
pub fn is_cheap(current_price_per_day: f64, cheap_percentile: f64, history: &[f64]) -> Evaluation {
    if history.len() < MIN_HISTORY {
        debug!(
            history = history.len(),
            "Not enough history for a threshold, treating price as cheap"
        );
        return Evaluation {
            cheap: true,
            threshold: None,
        };
    }

    let Some(threshold) = percentile(history, cheap_percentile) else {
        return Evaluation {
            cheap: false,
            threshold: None,
        };
    };

    Evaluation {
        cheap: current_price_per_day <= threshold,
        threshold: Some(threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HISTORY: [f64; 5] = [50.0, 60.0, 70.0, 80.0, 90.0];

    #[test]
    fn test_cold_start_is_always_cheap() {
        for history in [&[][..], &[10.0][..], &[10.0, 12.0][..]] {
            for price in [0.5, 11.0, 1_000.0] {
                let eval = is_cheap(price, 0.25, history);
                assert!(eval.cheap);
                assert_eq!(eval.threshold, None);
            }
        }
    }

    #[test]
    fn test_below_threshold_is_cheap() {
        let eval = is_cheap(55.0, 0.25, &HISTORY);
        assert_eq!(
            eval,
            Evaluation {
                cheap: true,
                threshold: Some(60.0)
            }
        );
    }

    #[test]
    fn test_above_threshold_is_not_cheap() {
        let eval = is_cheap(65.0, 0.25, &HISTORY);
        assert_eq!(
            eval,
            Evaluation {
                cheap: false,
                threshold: Some(60.0)
            }
        );
    }

    #[test]
    fn test_equal_to_threshold_is_cheap() {
        assert!(is_cheap(60.0, 0.25, &HISTORY).cheap);
    }

    #[test]
    fn test_invalid_percentile_is_not_cheap() {
        let eval = is_cheap(1.0, 1.5, &HISTORY);
        assert!(!eval.cheap);
        assert_eq!(eval.threshold, None);
    }

    #[test]
    fn test_exactly_min_history_uses_threshold() {
        let eval = is_cheap(100.0, 0.5, &[10.0, 20.0, 30.0]);
        assert_eq!(eval.threshold, Some(20.0));
        assert!(!eval.cheap);
    }
}
