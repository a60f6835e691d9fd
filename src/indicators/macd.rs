// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   macd      = EMA(close, fast) - EMA(close, slow)
//   signal    = EMA(macd, signal)
//   histogram = macd - signal
//
// All EMAs are seeded with their first input (see `ema.rs`), so every column
// is defined from index 0.
//
// The zone thresholds (85th / 15th percentile of the macd line over the whole
// window) are an auxiliary statistic for charts, not part of the indicator.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ema::calculate_ema;
use super::stats::percentile;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::{BarSeries, IndicatorResult};

pub const MACD: &str = "macd";
pub const SIGNAL: &str = "signal";
pub const HISTOGRAM: &str = "histogram";

const UPPER_ZONE_QUANTILE: f64 = 0.85;
const LOWER_ZONE_QUANTILE: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// Presentation thresholds derived from the macd line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdZones {
    pub upper: f64,
    pub lower: f64,
}

/// Compute MACD, signal line, and histogram on the closes of `series`.
///
/// # Errors
/// - `InvalidParameter` when any span is zero or `fast >= slow`.
/// - `InsufficientData` when the series has fewer than `slow` bars.
pub fn compute_macd(series: &BarSeries, params: MacdParams) -> AnalyticsResult<IndicatorResult> {
    if params.fast == 0 || params.slow == 0 || params.signal == 0 {
        return Err(AnalyticsError::InvalidParameter {
            name: "macd",
            reason: "spans must be at least 1".to_string(),
        });
    }
    if params.fast >= params.slow {
        return Err(AnalyticsError::InvalidParameter {
            name: "macd.fast",
            reason: format!("fast span {} must be below slow span {}", params.fast, params.slow),
        });
    }
    if series.len() < params.slow {
        return Err(AnalyticsError::insufficient(MACD, params.slow, series.len()));
    }

    let closes = series.closes();
    let exp_fast = calculate_ema(&closes, params.fast);
    let exp_slow = calculate_ema(&closes, params.slow);

    let macd: Vec<f64> = exp_fast.iter().zip(&exp_slow).map(|(f, s)| f - s).collect();
    let signal = calculate_ema(&macd, params.signal);
    let histogram: Vec<f64> = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();

    debug!(
        source = %series.key(),
        macd = ?macd.last(),
        signal = ?signal.last(),
        "macd computed"
    );

    Ok(IndicatorResult::new(series.timestamps())
        .with_column(MACD, defined(macd))
        .with_column(SIGNAL, defined(signal))
        .with_column(HISTOGRAM, defined(histogram)))
}

/// 85th / 15th percentile of the macd column of a [`compute_macd`] result.
///
/// Returns `None` when the result carries no macd values.
pub fn macd_zones(result: &IndicatorResult) -> Option<MacdZones> {
    let line: Vec<f64> = result.column(MACD)?.iter().flatten().copied().collect();
    Some(MacdZones {
        upper: percentile(&line, UPPER_ZONE_QUANTILE)?,
        lower: percentile(&line, LOWER_ZONE_QUANTILE)?,
    })
}

fn defined(values: Vec<f64>) -> Vec<Option<f64>> {
    values.into_iter().map(Some).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::series_from_closes;

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.3).sin() * 8.0 + i as f64 * 0.1).collect()
    }

    #[test]
    fn macd_insufficient_data() {
        let series = series_from_closes(&wave(25));
        let err = compute_macd(&series, MacdParams::default()).unwrap_err();
        assert_eq!(err, AnalyticsError::insufficient("macd", 26, 25));
    }

    #[test]
    fn macd_rejects_inverted_spans() {
        let series = series_from_closes(&wave(40));
        let params = MacdParams { fast: 26, slow: 12, signal: 9 };
        assert!(matches!(
            compute_macd(&series, params),
            Err(AnalyticsError::InvalidParameter { name: "macd.fast", .. })
        ));
    }

    #[test]
    fn histogram_identity() {
        let result = compute_macd(&series_from_closes(&wave(120)), MacdParams::default()).unwrap();
        let macd = result.column(MACD).unwrap();
        let signal = result.column(SIGNAL).unwrap();
        let hist = result.column(HISTOGRAM).unwrap();

        assert_eq!(hist.len(), 120);
        for i in 0..hist.len() {
            let expected = macd[i].unwrap() - signal[i].unwrap();
            assert!((hist[i].unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn macd_starts_at_zero() {
        // Both EMAs are seeded with close[0].
        let result = compute_macd(&series_from_closes(&wave(30)), MacdParams::default()).unwrap();
        assert_eq!(result.column(MACD).unwrap()[0], Some(0.0));
        assert_eq!(result.column(HISTOGRAM).unwrap()[0], Some(0.0));
    }

    #[test]
    fn rising_market_has_positive_macd() {
        let closes: Vec<f64> = (1..=60).map(|x| x as f64).collect();
        let result = compute_macd(&series_from_closes(&closes), MacdParams::default()).unwrap();
        assert!(result.latest(MACD).unwrap() > 0.0);
    }

    #[test]
    fn zones_bracket_the_line() {
        let result = compute_macd(&series_from_closes(&wave(200)), MacdParams::default()).unwrap();
        let zones = macd_zones(&result).unwrap();
        let line: Vec<f64> = result.column(MACD).unwrap().iter().flatten().copied().collect();
        let min = line.iter().copied().fold(f64::INFINITY, f64::min);
        let max = line.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        assert!(zones.lower <= zones.upper);
        assert!(zones.lower >= min && zones.upper <= max);
    }
}
