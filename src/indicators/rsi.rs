// =============================================================================
// Relative Strength Index (RSI) - simple rolling averages
// =============================================================================
//
// Step 1: delta_t = close_t - close_{t-1}
// Step 2: gain_t = max(delta_t, 0), loss_t = max(-delta_t, 0)
// Step 3: avg_gain / avg_loss = simple mean of the trailing `period` gains /
//          losses (no Wilder smoothing)
// Step 4: RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// avg_loss == 0 yields RSI = 100. A 3-period SMA of RSI is emitted alongside
// as a smoothing overlay.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::stats::rolling_mean;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::{BarSeries, IndicatorResult};

pub const RSI: &str = "rsi";
pub const RSI_SMA: &str = "rsi_sma";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiParams {
    pub period: usize,
    pub smoothing: usize,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self {
            period: 14,
            smoothing: 3,
        }
    }
}

/// Compute RSI and its SMA overlay on the closes of `series`.
///
/// Columns: [`RSI`] defined from index `period`, [`RSI_SMA`] defined from
/// index `period + smoothing - 1`.
///
/// # Errors
/// - `InvalidParameter` when `period` or `smoothing` is zero.
/// - `InsufficientData` when the series has fewer than `period + 1` bars.
pub fn compute_rsi(series: &BarSeries, params: RsiParams) -> AnalyticsResult<IndicatorResult> {
    if params.period == 0 {
        return Err(AnalyticsError::InvalidParameter {
            name: "rsi.period",
            reason: "must be at least 1".to_string(),
        });
    }
    if params.smoothing == 0 {
        return Err(AnalyticsError::InvalidParameter {
            name: "rsi.smoothing",
            reason: "must be at least 1".to_string(),
        });
    }
    if series.len() < params.period + 1 {
        return Err(AnalyticsError::insufficient(RSI, params.period + 1, series.len()));
    }

    let rsi = calculate_rsi(&series.closes(), params.period);
    let rsi_sma = rolling_mean(&rsi, params.smoothing);

    debug!(
        source = %series.key(),
        period = params.period,
        last = ?rsi.last().copied().flatten(),
        "rsi computed"
    );

    Ok(IndicatorResult::new(series.timestamps())
        .with_column(RSI, rsi)
        .with_column(RSI_SMA, rsi_sma))
}

/// RSI column for raw closes. Entries before index `period` are `None`.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut gains = vec![None; n];
    let mut losses = vec![None; n];

    for t in 1..n {
        let delta = closes[t] - closes[t - 1];
        gains[t] = Some(delta.max(0.0));
        losses[t] = Some((-delta).max(0.0));
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(g, l)| match (g, l) {
            (Some(g), Some(l)) => Some(rsi_from_averages(*g, *l)),
            _ => None,
        })
        .collect()
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::series_from_closes;
    use proptest::prelude::*;

    #[test]
    fn rsi_insufficient_data() {
        // Need period+1 closes (period deltas). 14 closes => 13 deltas < 14.
        let series = series_from_closes(&(1..=14).map(|x| x as f64).collect::<Vec<_>>());
        let err = compute_rsi(&series, RsiParams::default()).unwrap_err();
        assert_eq!(err, AnalyticsError::insufficient("rsi", 15, 14));
    }

    #[test]
    fn rsi_period_zero() {
        let series = series_from_closes(&[1.0, 2.0, 3.0]);
        let params = RsiParams { period: 0, smoothing: 3 };
        assert!(matches!(
            compute_rsi(&series, params),
            Err(AnalyticsError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn rsi_alignment() {
        let closes: Vec<f64> = (0..30).map(|x| 100.0 + (x as f64).sin() * 5.0).collect();
        let result = compute_rsi(&series_from_closes(&closes), RsiParams::default()).unwrap();
        let rsi = result.column(RSI).unwrap();
        let sma = result.column(RSI_SMA).unwrap();

        assert_eq!(rsi.len(), 30);
        assert!(rsi[..14].iter().all(Option::is_none));
        assert!(rsi[14..].iter().all(Option::is_some));
        assert!(sma[..16].iter().all(Option::is_none));
        assert!(sma[16..].iter().all(Option::is_some));

        for t in 16..30 {
            let window: Vec<f64> = rsi[t - 2..=t].iter().flatten().copied().collect();
            let mean = window.iter().sum::<f64>() / 3.0;
            assert_eq!(window.len(), 3);
            assert!((sma[t].unwrap() - mean).abs() < 1e-9, "rsi_sma[{t}]");
        }
    }

    #[test]
    fn rsi_all_gains() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let result = compute_rsi(&series_from_closes(&closes), RsiParams::default()).unwrap();
        for v in result.column(RSI).unwrap().iter().flatten() {
            assert!((v - 100.0).abs() < 1e-10, "expected 100.0, got {v}");
        }
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let result = compute_rsi(&series_from_closes(&closes), RsiParams::default()).unwrap();
        for v in result.column(RSI).unwrap().iter().flatten() {
            assert!(v.abs() < 1e-10, "expected 0.0, got {v}");
        }
    }

    #[test]
    fn rsi_flat_market_has_no_losses() {
        let result = compute_rsi(&series_from_closes(&[100.0; 20]), RsiParams::default()).unwrap();
        assert_eq!(result.latest(RSI), Some(100.0));
    }

    #[test]
    fn rsi_uses_simple_means() {
        // period 2: deltas +2, -1 => avg_gain 1, avg_loss 0.5 => rs 2 => 66.67
        let closes = [10.0, 12.0, 11.0];
        let rsi = calculate_rsi(&closes, 2);
        assert_eq!(rsi[..2], [None, None]);
        assert!((rsi[2].unwrap() - 200.0 / 3.0).abs() < 1e-10);
    }

    proptest! {
        #[test]
        fn rsi_stays_in_bounds(closes in prop::collection::vec(1.0f64..1000.0, 15..80)) {
            let result = compute_rsi(&series_from_closes(&closes), RsiParams::default()).unwrap();
            for v in result.column(RSI).unwrap().iter().flatten() {
                prop_assert!((0.0..=100.0).contains(v), "RSI {} out of range", v);
            }
        }
    }
}
