// =============================================================================
// Stochastic Oscillator
// =============================================================================
//
//   %K_t = 100 * (close_t - min(low, period)) / (max(high, period) - min(low, period))
//   %D_t = SMA(%K, d_window)
//
// The low/high window includes bar t. A flat window (high == low) yields
// %K = 0.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::stats::{rolling_max, rolling_mean, rolling_min};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::{BarSeries, IndicatorResult};

pub const PERCENT_K: &str = "k";
pub const PERCENT_D: &str = "d";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticParams {
    pub period: usize,
    pub d_window: usize,
}

impl Default for StochasticParams {
    fn default() -> Self {
        Self {
            period: 14,
            d_window: 3,
        }
    }
}

/// Compute %K and %D for `series`.
///
/// %K is defined from index `period - 1`, %D from `period + d_window - 2`.
///
/// # Errors
/// - `InvalidParameter` when `period` or `d_window` is zero.
/// - `InsufficientData` when the series has fewer than `period` bars.
pub fn compute_stochastic(
    series: &BarSeries,
    params: StochasticParams,
) -> AnalyticsResult<IndicatorResult> {
    if params.period == 0 || params.d_window == 0 {
        return Err(AnalyticsError::InvalidParameter {
            name: "stochastic",
            reason: "period and d_window must be at least 1".to_string(),
        });
    }
    if series.len() < params.period {
        return Err(AnalyticsError::insufficient(
            "stochastic",
            params.period,
            series.len(),
        ));
    }

    let lowest = rolling_min(&series.lows(), params.period);
    let highest = rolling_max(&series.highs(), params.period);

    let k: Vec<Option<f64>> = series
        .bars()
        .iter()
        .zip(lowest.iter().zip(&highest))
        .map(|(bar, (lo, hi))| match (lo, hi) {
            (Some(lo), Some(hi)) => Some(percent_k(bar.close, *lo, *hi)),
            _ => None,
        })
        .collect();
    let d = rolling_mean(&k, params.d_window);

    debug!(source = %series.key(), k = ?k.last().copied().flatten(), "stochastic computed");

    Ok(IndicatorResult::new(series.timestamps())
        .with_column(PERCENT_K, k)
        .with_column(PERCENT_D, d))
}

fn percent_k(close: f64, lowest: f64, highest: f64) -> f64 {
    let range = highest - lowest;
    if range == 0.0 {
        return 0.0;
    }
    100.0 * (close - lowest) / range
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::{key, series_from_closes, ts};
    use crate::types::Bar;
    use proptest::prelude::*;

    #[test]
    fn stochastic_insufficient_data() {
        let series = series_from_closes(&[1.0; 13]);
        let err = compute_stochastic(&series, StochasticParams::default()).unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn flat_window_is_zero() {
        let bars = (0..20).map(|i| Bar::new(ts(i), 5.0, 5.0, 5.0, 5.0, 1.0)).collect();
        let series = BarSeries::new(key("x", "y"), bars);
        let result = compute_stochastic(&series, StochasticParams::default()).unwrap();
        for v in result.column(PERCENT_K).unwrap().iter().flatten() {
            assert_eq!(*v, 0.0);
        }
    }

    #[test]
    fn alignment_and_known_value() {
        // closes 1..=5, lows c-1, highs c+1, period 3
        let series = series_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let params = StochasticParams { period: 3, d_window: 2 };
        let result = compute_stochastic(&series, params).unwrap();
        let k = result.column(PERCENT_K).unwrap();
        let d = result.column(PERCENT_D).unwrap();

        assert_eq!(k[..2], [None, None]);
        // t=2: lows [0,1,2] => 0, highs [2,3,4] => 4, close 3 => 75
        assert!((k[2].unwrap() - 75.0).abs() < 1e-12);
        assert_eq!(d[..3], [None, None, None]);
        assert!((d[3].unwrap() - 75.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn percent_k_in_bounds(closes in prop::collection::vec(1.0f64..500.0, 14..80)) {
            let result = compute_stochastic(&series_from_closes(&closes), StochasticParams::default()).unwrap();
            for v in result.column(PERCENT_K).unwrap().iter().flatten() {
                prop_assert!((0.0..=100.0).contains(v), "%K {} out of range", v);
            }
        }
    }
}
