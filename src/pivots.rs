// =============================================================================
// Pivot / Fibonacci Analyzer
// =============================================================================
//
// A high pivot is a bar whose high is strictly above both neighbours; a low
// pivot is a bar whose low is strictly below both neighbours. The most recent
// of each anchors the retracement:
//
//   start  = swing high, end = swing low
//   height = start - end
//   level  = start - height * ratio        for each of the 13 ratios
//
// Direction is fixed (high to low). Without both pivots the analyzer fails
// with `InsufficientData` rather than returning a partial level set.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::{BarSeries, FibonacciLevel};

/// Retracement / extension ratios, ascending.
pub const FIBONACCI_RATIOS: [f64; 13] = [
    0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0, 1.272, 1.414, 1.618, 2.618, 3.618, 4.236,
];

/// A detected swing point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pivot {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Swing anchors plus the derived price levels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FibonacciRetracement {
    pub swing_high: Pivot,
    pub swing_low: Pivot,
    pub levels: Vec<FibonacciLevel>,
}

/// Indices of all strict local maxima of `high`.
pub fn high_pivots(series: &BarSeries) -> Vec<usize> {
    let highs = series.highs();
    local_extrema(&highs, |mid, side| mid > side)
}

/// Indices of all strict local minima of `low`.
pub fn low_pivots(series: &BarSeries) -> Vec<usize> {
    let lows = series.lows();
    local_extrema(&lows, |mid, side| mid < side)
}

fn local_extrema(values: &[f64], beats: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    values
        .windows(3)
        .enumerate()
        .filter(|(_, w)| beats(w[1], w[0]) && beats(w[1], w[2]))
        .map(|(i, _)| i + 1)
        .collect()
}

/// Price levels between `start` and `end` for every ratio in
/// [`FIBONACCI_RATIOS`].
pub fn fibonacci_levels(start: f64, end: f64) -> Vec<FibonacciLevel> {
    let height = start - end;
    FIBONACCI_RATIOS
        .iter()
        .map(|&ratio| FibonacciLevel {
            ratio,
            price: start - height * ratio,
        })
        .collect()
}

/// Find the latest swing high / swing low of `series` and derive the levels.
pub fn compute_fibonacci_levels(series: &BarSeries) -> AnalyticsResult<FibonacciRetracement> {
    let bars = series.bars();

    let last_high = high_pivots(series).last().copied();
    let last_low = low_pivots(series).last().copied();

    let (Some(hi), Some(lo)) = (last_high, last_low) else {
        debug!(
            source = %series.key(),
            bars = bars.len(),
            has_high = last_high.is_some(),
            has_low = last_low.is_some(),
            "fibonacci: missing pivot"
        );
        return Err(AnalyticsError::insufficient(
            "fibonacci pivots",
            2,
            usize::from(last_high.is_some()) + usize::from(last_low.is_some()),
        ));
    };

    let swing_high = Pivot {
        index: hi,
        timestamp: bars[hi].timestamp,
        price: bars[hi].high,
    };
    let swing_low = Pivot {
        index: lo,
        timestamp: bars[lo].timestamp,
        price: bars[lo].low,
    };

    let levels = fibonacci_levels(swing_high.price, swing_low.price);

    debug!(
        source = %series.key(),
        swing_high = swing_high.price,
        swing_low = swing_low.price,
        "fibonacci levels computed"
    );

    Ok(FibonacciRetracement {
        swing_high,
        swing_low,
        levels,
    })
}
