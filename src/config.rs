// =============================================================================
// Analytics Configuration - JSON file with environment overrides
// =============================================================================
//
// Every field carries `#[serde(default)]` so that a partial (or empty) file
// still loads. Environment variables win over the file:
//
//   AURORA_EXCHANGES        comma-separated subset of configured exchanges
//   AURORA_RESOLUTION       bar resolution label (e.g. "1h")
//   AURORA_MAX_CONCURRENCY  fetch worker cap
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::fetch::FetchRequest;
use crate::fetch::orchestrator::DEFAULT_MAX_CONCURRENCY;
use crate::indicators::{MacdParams, RsiParams, StochasticParams};
use crate::types::{resolution_interval, SourceKey};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_exchanges() -> Vec<ExchangeConfig> {
    vec![
        ExchangeConfig {
            name: "binance".to_string(),
            base_url: "https://api.binance.com".to_string(),
            instruments: vec!["BTCUSDT".into(), "BTCFDUSD".into(), "BTCUSDC".into()],
        },
        ExchangeConfig {
            name: "binanceus".to_string(),
            base_url: "https://api.binance.us".to_string(),
            instruments: vec!["BTCUSDT".into(), "BTCUSD".into()],
        },
        ExchangeConfig {
            name: "mexc".to_string(),
            base_url: "https://api.mexc.com".to_string(),
            instruments: vec!["BTCUSDT".into(), "BTCUSDC".into()],
        },
    ]
}

fn default_resolution() -> String {
    "1h".to_string()
}

fn default_aggregate() -> usize {
    1
}

fn default_limit() -> u32 {
    200
}

fn default_max_concurrent_fetches() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_funding_symbol() -> Option<String> {
    Some("BTCUSDT".to_string())
}

fn default_funding_limit() -> u32 {
    90
}

fn default_funding_base_url() -> String {
    "https://fapi.binance.com".to_string()
}

// =============================================================================
// ExchangeConfig
// =============================================================================

/// One spot exchange and the instruments that price the tracked asset there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub instruments: Vec<String>,
}

// =============================================================================
// AnalyticsConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<ExchangeConfig>,

    /// Bar resolution label shared by every source.
    #[serde(default = "default_resolution")]
    pub resolution: String,

    /// Native bars merged into one output bar.
    #[serde(default = "default_aggregate")]
    pub aggregate: usize,

    /// Native bars requested per source.
    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Per-source wait before the source counts as failed.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub rsi: RsiParams,

    #[serde(default)]
    pub macd: MacdParams,

    #[serde(default)]
    pub stochastic: StochasticParams,

    /// Perpetual symbol whose funding history is annualized; `null` skips it.
    #[serde(default = "default_funding_symbol")]
    pub funding_symbol: Option<String>,

    #[serde(default = "default_funding_limit")]
    pub funding_limit: u32,

    /// Binance-compatible futures host serving `/fapi/v1/fundingRate`.
    #[serde(default = "default_funding_base_url")]
    pub funding_base_url: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            exchanges: default_exchanges(),
            resolution: default_resolution(),
            aggregate: default_aggregate(),
            limit: default_limit(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            rsi: RsiParams::default(),
            macd: MacdParams::default(),
            stochastic: StochasticParams::default(),
            funding_symbol: default_funding_symbol(),
            funding_limit: default_funding_limit(),
            funding_base_url: default_funding_base_url(),
        }
    }
}

impl AnalyticsConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read analytics config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse analytics config from {}", path.display()))?;

        info!(
            path = %path.display(),
            exchanges = config.exchanges.len(),
            resolution = %config.resolution,
            "analytics config loaded"
        );

        Ok(config)
    }

    /// Apply `AURORA_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(list) = lookup("AURORA_EXCHANGES") {
            let wanted: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            self.exchanges.retain(|e| wanted.contains(&e.name.to_lowercase()));
        }

        if let Some(res) = lookup("AURORA_RESOLUTION") {
            let res = res.trim();
            if !res.is_empty() {
                self.resolution = res.to_string();
            }
        }

        if let Some(cap) = lookup("AURORA_MAX_CONCURRENCY") {
            self.max_concurrent_fetches = cap
                .trim()
                .parse()
                .with_context(|| format!("AURORA_MAX_CONCURRENCY is not a number: '{cap}'"))?;
        }

        Ok(())
    }

    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_fetches == 0 {
            anyhow::bail!("max_concurrent_fetches must be at least 1");
        }
        if self.limit == 0 {
            anyhow::bail!("limit must be at least 1");
        }
        if self.aggregate == 0 {
            anyhow::bail!("aggregate must be at least 1");
        }
        if self.aggregate > 1 && resolution_interval(&self.resolution).is_none() {
            anyhow::bail!(
                "aggregate {} needs a fixed-length resolution, got '{}'",
                self.aggregate,
                self.resolution
            );
        }
        if self.exchanges.is_empty() {
            anyhow::bail!("no exchanges configured");
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// One request per configured `(exchange, instrument)` pair.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.exchanges
            .iter()
            .flat_map(|ex| {
                ex.instruments.iter().map(move |inst| {
                    FetchRequest::new(
                        SourceKey::new(&ex.name, inst, &self.resolution),
                        self.aggregate,
                        self.limit,
                    )
                })
            })
            .collect()
    }
}
