// =============================================================================
// Shared types used across the Aurora analytics core
// =============================================================================
//
// Everything downstream of the fetch layer speaks these types: bars arrive as
// a `BarSeries`, the aggregator emits `CompositeRow`s, and the indicator
// engine emits `IndicatorResult`s aligned 1:1 with the source series.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AnalyticsError;

// =============================================================================
// Bars
// =============================================================================

/// A single OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// `low <= open, close <= high`, `volume >= 0`, and every field finite.
    pub fn is_consistent(&self) -> bool {
        let finite = [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite());

        finite
            && self.volume >= 0.0
            && self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
    }
}

/// Identifies the origin of a series: one instrument on one exchange at one
/// resolution.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceKey {
    pub exchange: String,
    pub instrument: String,
    pub resolution: String,
}

impl SourceKey {
    pub fn new(
        exchange: impl Into<String>,
        instrument: impl Into<String>,
        resolution: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            instrument: instrument.into(),
            resolution: resolution.into(),
        }
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}@{}", self.exchange, self.instrument, self.resolution)
    }
}

/// Ordered bars for a single [`SourceKey`].
///
/// Timestamps are strictly increasing and unique. The series is immutable
/// once built; every transform returns a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    key: SourceKey,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Build a series from bars in any order.
    ///
    /// Bars are sorted by timestamp; on a duplicate timestamp the later bar in
    /// the input wins. Inconsistent bars (see [`Bar::is_consistent`]) are
    /// dropped.
    pub fn new(key: SourceKey, bars: Vec<Bar>) -> Self {
        let total = bars.len();
        let mut by_ts: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
        let mut rejected = 0usize;

        for bar in bars {
            if bar.is_consistent() {
                by_ts.insert(bar.timestamp, bar);
            } else {
                rejected += 1;
            }
        }

        if rejected > 0 {
            warn!(source = %key, rejected, total, "dropped inconsistent bars");
        }

        Self {
            key,
            bars: by_ts.into_values().collect(),
        }
    }

    pub fn empty(key: SourceKey) -> Self {
        Self {
            key,
            bars: Vec::new(),
        }
    }

    pub fn key(&self) -> &SourceKey {
        &self.key
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    /// Merge native bars into bars `aggregate` times as long.
    ///
    /// Buckets are aligned to the Unix epoch in steps of
    /// `aggregate x resolution`, so two series of the same resolution share
    /// bucket timestamps even when one of them is missing bars. A merged bar
    /// is stamped with its bucket start and takes the first bar's open, the
    /// last bar's close, the extreme high/low, and the summed volume. Partial
    /// buckets at either end are kept.
    pub fn resample(&self, aggregate: usize) -> Result<BarSeries, AnalyticsError> {
        if aggregate == 0 {
            return Err(AnalyticsError::InvalidParameter {
                name: "aggregate",
                reason: "must be at least 1".to_string(),
            });
        }
        if aggregate == 1 {
            return Ok(self.clone());
        }

        let width = resolution_interval(&self.key.resolution)
            .and_then(|interval| interval.checked_mul(i32::try_from(aggregate).ok()?))
            .ok_or_else(|| AnalyticsError::InvalidParameter {
                name: "resolution",
                reason: format!(
                    "cannot merge {aggregate} bars of '{}': no fixed bar length",
                    self.key.resolution
                ),
            })?;
        let width_ms = width.num_milliseconds();

        let mut buckets: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
        for bar in &self.bars {
            let offset = bar.timestamp.timestamp_millis().rem_euclid(width_ms);
            let start = bar.timestamp - Duration::milliseconds(offset);
            buckets
                .entry(start)
                .and_modify(|merged| {
                    merged.high = merged.high.max(bar.high);
                    merged.low = merged.low.min(bar.low);
                    merged.close = bar.close;
                    merged.volume += bar.volume;
                })
                .or_insert(Bar {
                    timestamp: start,
                    ..*bar
                });
        }

        Ok(BarSeries {
            key: self.key.clone(),
            bars: buckets.into_values().collect(),
        })
    }
}

/// Length of one bar at `resolution` (`"15m"`, `"4h"`, `"1d"`, `"1w"`).
///
/// Calendar months (`"1M"`) and unrecognised labels have no fixed length.
pub fn resolution_interval(resolution: &str) -> Option<Duration> {
    let (unit_at, _) = resolution.char_indices().last()?;
    let (count, unit) = resolution.split_at(unit_at);
    let count: i64 = count.parse().ok().filter(|c| *c > 0)?;
    match unit {
        "m" => Duration::try_minutes(count),
        "h" => Duration::try_hours(count),
        "d" => Duration::try_days(count),
        "w" => Duration::try_weeks(count),
        _ => None,
    }
}

// =============================================================================
// Composite price
// =============================================================================

/// One `(exchange, instrument)` observation feeding the VWAP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeQuote {
    pub timestamp: DateTime<Utc>,
    pub exchange: String,
    pub instrument: String,
    pub price: f64,
    pub volume: f64,
}

/// Composite reference price at one timestamp.
///
/// `per_exchange_delta` only holds exchanges that produced a VWAP at this
/// timestamp; a missing exchange is absent, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRow {
    pub timestamp: DateTime<Utc>,
    pub composite_price: f64,
    pub per_exchange_vwap: BTreeMap<String, f64>,
    pub per_exchange_delta: BTreeMap<String, f64>,
}

// =============================================================================
// Indicator output
// =============================================================================

/// One named output column. `None` marks indices without enough history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorColumn {
    pub name: &'static str,
    pub values: Vec<Option<f64>>,
}

/// Indicator output aligned 1:1 with the source [`BarSeries`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorResult {
    pub timestamps: Vec<DateTime<Utc>>,
    pub columns: Vec<IndicatorColumn>,
}

impl IndicatorResult {
    pub(crate) fn new(timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            timestamps,
            columns: Vec::new(),
        }
    }

    pub(crate) fn with_column(mut self, name: &'static str, values: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(values.len(), self.timestamps.len());
        self.columns.push(IndicatorColumn { name, values });
        self
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Most recent defined value of `name`.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.column(name)?.iter().rev().find_map(|v| *v)
    }
}

/// One Fibonacci retracement price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibonacciLevel {
    pub ratio: f64,
    pub price: f64,
}
