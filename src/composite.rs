// =============================================================================
// Composite Price Aggregator
// =============================================================================
//
// Merges many (exchange, instrument) quote series for one logical asset into a
// single reference price:
//
//   1. Per exchange and timestamp, VWAP across that exchange's instruments:
//        vwap[e,t] = Σ price·volume / Σ volume
//      Instruments without a quote at t contribute nothing. Zero total volume
//      leaves vwap[e,t] undefined and the point is dropped.
//   2. Outer join of all exchanges on timestamp.
//   3. composite[t] = arithmetic mean of the vwap[e,t] present at t
//      (equal weight per exchange, not volume-weighted).
//   4. delta[e,t] = (vwap[e,t] - composite[t]) / composite[t], only where
//      vwap[e,t] exists.
//
// Every reduction runs over sorted inputs so the result does not depend on the
// order quotes arrived in.
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::types::{BarSeries, CompositeRow, ExchangeQuote};

/// exchange -> timestamp -> VWAP
pub type ExchangeVwaps = BTreeMap<String, BTreeMap<DateTime<Utc>, f64>>;

/// Turn fetched bars into VWAP inputs: one quote per bar, priced at the close.
pub fn quotes_from_series<'a>(series: impl IntoIterator<Item = &'a BarSeries>) -> Vec<ExchangeQuote> {
    series
        .into_iter()
        .flat_map(|s| {
            let key = s.key();
            s.bars().iter().map(move |bar| ExchangeQuote {
                timestamp: bar.timestamp,
                exchange: key.exchange.clone(),
                instrument: key.instrument.clone(),
                price: bar.close,
                volume: bar.volume,
            })
        })
        .collect()
}

/// Per-exchange, per-timestamp VWAP across instruments.
///
/// Quotes with a non-finite price or a negative / non-finite volume are
/// ignored. Points whose total volume is zero are absent from the output.
pub fn exchange_vwaps(quotes: &[ExchangeQuote]) -> ExchangeVwaps {
    let mut grouped: BTreeMap<(&str, DateTime<Utc>), Vec<(&str, f64, f64)>> = BTreeMap::new();
    let mut rejected = 0usize;

    for q in quotes {
        if !q.price.is_finite() || !q.volume.is_finite() || q.volume < 0.0 {
            rejected += 1;
            continue;
        }
        grouped
            .entry((q.exchange.as_str(), q.timestamp))
            .or_default()
            .push((q.instrument.as_str(), q.price, q.volume));
    }

    if rejected > 0 {
        warn!(rejected, "ignored malformed quotes");
    }

    let mut out: ExchangeVwaps = BTreeMap::new();
    let mut zero_volume = 0usize;

    for ((exchange, ts), mut rows) in grouped {
        rows.sort_by(|a, b| {
            a.0.cmp(b.0)
                .then(a.1.total_cmp(&b.1))
                .then(a.2.total_cmp(&b.2))
        });

        // Weighted deviations from the first price, so a constant-price group
        // returns that price exactly.
        let anchor = rows[0].1;
        let (dev, v) = rows
            .iter()
            .fold((0.0_f64, 0.0_f64), |(dev, v), (_, price, volume)| {
                (dev + (price - anchor) * volume, v + volume)
            });

        if v > 0.0 {
            out.entry(exchange.to_string())
                .or_default()
                .insert(ts, anchor + dev / v);
        } else {
            zero_volume += 1;
        }
    }

    if zero_volume > 0 {
        debug!(zero_volume, "dropped zero-volume VWAP points");
    }

    out
}

/// Outer-join per-exchange VWAPs into composite rows, ordered by timestamp.
pub fn composite_from_vwaps(vwaps: &ExchangeVwaps) -> Vec<CompositeRow> {
    let mut by_ts: BTreeMap<DateTime<Utc>, BTreeMap<String, f64>> = BTreeMap::new();
    for (exchange, series) in vwaps {
        for (ts, vwap) in series {
            by_ts.entry(*ts).or_default().insert(exchange.clone(), *vwap);
        }
    }

    by_ts
        .into_iter()
        .map(|(timestamp, per_exchange_vwap)| {
            let composite_price =
                per_exchange_vwap.values().sum::<f64>() / per_exchange_vwap.len() as f64;

            let per_exchange_delta = per_exchange_vwap
                .iter()
                .filter_map(|(exchange, vwap)| {
                    basis_delta(*vwap, composite_price).map(|d| (exchange.clone(), d))
                })
                .collect();

            CompositeRow {
                timestamp,
                composite_price,
                per_exchange_vwap,
                per_exchange_delta,
            }
        })
        .collect()
}

/// Composite reference price and basis deltas for a set of quotes.
pub fn aggregate_composite_price(quotes: &[ExchangeQuote]) -> Vec<CompositeRow> {
    let vwaps = exchange_vwaps(quotes);
    let rows = composite_from_vwaps(&vwaps);
    debug!(
        exchanges = vwaps.len(),
        quotes = quotes.len(),
        rows = rows.len(),
        "composite price aggregated"
    );
    rows
}

/// Relative deviation of `vwap` from `composite`. `None` for a zero composite.
fn basis_delta(vwap: f64, composite: f64) -> Option<f64> {
    if composite == 0.0 {
        return None;
    }
    Some((vwap - composite) / composite)
}
