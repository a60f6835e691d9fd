// =============================================================================
// Funding Rate History - perpetual futures funding from `/fapi/v1/fundingRate`
// =============================================================================
//
// Funding is settled every 8 hours, so each record is a per-8h rate. The
// dashboard plots the history alongside its annualized equivalent (see
// `rates::annualize_history`).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use super::kline_rest::parse_str_f64;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::rates::{annualize_history, AnnualizedRate, RateRecord};
use crate::types::SourceKey;

/// Settlement interval of perpetual funding.
pub const FUNDING_RESOLUTION: &str = "8h";

/// Fetches funding-rate history from a Binance-compatible futures API.
#[derive(Clone)]
pub struct FundingRateClient {
    base_url: String,
    client: reqwest::Client,
}

impl FundingRateClient {
    /// Create a client that re-uses an existing HTTP client.
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Fetch the last `limit` funding records for `symbol`, oldest first.
    #[instrument(skip(self), name = "funding::fetch_history")]
    pub async fn fetch_history(&self, symbol: &str, limit: u32) -> AnalyticsResult<Vec<RateRecord>> {
        let key = SourceKey::new("binance-futures", symbol, FUNDING_RESOLUTION);
        self.get_funding(symbol, limit)
            .await
            .map_err(|e| AnalyticsError::source_unavailable(&key, format!("{e:#}")))
    }

    /// Fetch history and annualize every record.
    pub async fn fetch_annualized(&self, symbol: &str, limit: u32) -> AnalyticsResult<Vec<AnnualizedRate>> {
        let records = self.fetch_history(symbol, limit).await?;
        Ok(annualize_history(&records, FUNDING_RESOLUTION))
    }

    async fn get_funding(&self, symbol: &str, limit: u32) -> Result<Vec<RateRecord>> {
        let url = format!(
            "{}/fapi/v1/fundingRate?symbol={}&limit={}",
            self.base_url, symbol, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET funding rate for {symbol}"))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse funding rate response body")?;

        if !status.is_success() {
            anyhow::bail!("funding rate API returned {}: {}", status, body);
        }

        let records = parse_funding_history(&body)?;
        debug!(symbol, count = records.len(), "funding history fetched");
        Ok(records)
    }
}

impl std::fmt::Debug for FundingRateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FundingRateClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Parse `[{"symbol", "fundingTime", "fundingRate", ...}, ...]`.
pub fn parse_funding_history(body: &serde_json::Value) -> Result<Vec<RateRecord>> {
    let arr = body
        .as_array()
        .context("funding rate response is not an array")?;

    let mut records = arr
        .iter()
        .map(|entry| -> Result<RateRecord> {
            let millis = entry["fundingTime"]
                .as_i64()
                .context("funding entry missing fundingTime")?;
            let timestamp = DateTime::<Utc>::from_timestamp_millis(millis)
                .with_context(|| format!("fundingTime {millis} out of range"))?;
            let rate = parse_str_f64(&entry["fundingRate"])?;
            Ok(RateRecord { timestamp, rate })
        })
        .collect::<Result<Vec<_>>>()?;

    records.sort_by_key(|r| r.timestamp);
    Ok(records)
}
