// =============================================================================
// Kline REST Source - Binance-compatible spot `/api/v3/klines`
// =============================================================================
//
// Binance, Binance.US, and MEXC share the same public kline endpoint and the
// same array-of-arrays payload, so one client covers all of them; each
// instance is bound to one exchange name and base URL.
//
// Array indices:
//   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
//   [6] closeTime, ...
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use tracing::{debug, instrument, warn};

use super::source::{BarSource, FetchRequest};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::{Bar, BarSeries};

/// Resolution labels accepted by the kline endpoint.
const SUPPORTED_INTERVALS: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

/// Public kline client for one Binance-compatible exchange.
#[derive(Clone)]
pub struct KlineRestSource {
    exchange: String,
    base_url: String,
    client: reqwest::Client,
}

impl KlineRestSource {
    /// Build a source that re-uses an existing HTTP client (and its pool).
    pub fn with_client(
        exchange: impl Into<String>,
        base_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        let exchange = exchange.into();
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(exchange = %exchange, base_url = %base_url, "KlineRestSource initialised");
        Self {
            exchange,
            base_url,
            client,
        }
    }

    /// GET /api/v3/klines (public - no signature required).
    #[instrument(skip(self), name = "kline_rest::get_klines", fields(exchange = %self.exchange))]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Bar>> {
        if !SUPPORTED_INTERVALS.contains(&interval) {
            anyhow::bail!("unsupported interval '{interval}'");
        }

        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("GET /api/v3/klines returned {}: {}", status, body);
        }

        let bars = parse_klines(&body)?;
        debug!(symbol, interval, count = bars.len(), "klines fetched");
        Ok(bars)
    }
}

impl BarSource for KlineRestSource {
    fn fetch_bars<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, AnalyticsResult<BarSeries>> {
        Box::pin(async move {
            let key = &request.key;
            let bars = self
                .get_klines(&key.instrument, &key.resolution, request.limit)
                .await
                .map_err(|e| AnalyticsError::source_unavailable(key, format!("{e:#}")))?;

            BarSeries::new(key.clone(), bars).resample(request.aggregate)
        })
    }
}

impl std::fmt::Debug for KlineRestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KlineRestSource")
            .field("exchange", &self.exchange)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Parse the kline array-of-arrays payload. Short entries are skipped.
pub fn parse_klines(body: &serde_json::Value) -> Result<Vec<Bar>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut bars = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;

        if arr.len() < 6 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time = arr[0].as_i64().context("kline open time is not an integer")?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(open_time)
            .with_context(|| format!("kline open time {open_time} out of range"))?;

        bars.push(Bar::new(
            timestamp,
            parse_str_f64(&arr[1])?,
            parse_str_f64(&arr[2])?,
            parse_str_f64(&arr[3])?,
            parse_str_f64(&arr[4])?,
            parse_str_f64(&arr[5])?,
        ));
    }

    Ok(bars)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
pub(crate) fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}
