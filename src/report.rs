// =============================================================================
// Dashboard Report - one request/response cycle end to end
// =============================================================================
//
//   fetch every configured source (bounded, partial results allowed)
//     -> composite price + basis deltas across exchanges
//     -> RSI / MACD / Stochastic / Fibonacci on the primary series
//     -> optional annualized funding history
//
// Each indicator section carries either its data or the reason it could not
// be computed, so one short series never blanks the whole report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::composite::aggregate_composite_price;
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::fetch::{FetchOrchestrator, FetchOutcome, FundingRateClient};
use crate::indicators::{compute_macd, compute_rsi, compute_stochastic, macd_zones, MacdZones};
use crate::pivots::{compute_fibonacci_levels, FibonacciRetracement};
use crate::rates::AnnualizedRate;
use crate::types::{BarSeries, CompositeRow, IndicatorResult, SourceKey};

/// Outcome of one report section.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Ready { data: T },
    InsufficientData { message: String },
    Failed { message: String },
}

impl<T> Section<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Ready { data } => Some(data),
            _ => None,
        }
    }
}

impl<T> From<AnalyticsResult<T>> for Section<T> {
    fn from(result: AnalyticsResult<T>) -> Self {
        match result {
            Ok(data) => Self::Ready { data },
            Err(err @ AnalyticsError::InsufficientData { .. }) => Self::InsufficientData {
                message: err.to_string(),
            },
            Err(err) => Self::Failed {
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MacdSection {
    pub series: IndicatorResult,
    pub zones: Option<MacdZones>,
}

/// Indicators for one series.
#[derive(Debug, Serialize)]
pub struct IndicatorReport {
    pub source: SourceKey,
    pub rsi: Section<IndicatorResult>,
    pub macd: Section<MacdSection>,
    pub stochastic: Section<IndicatorResult>,
    pub fibonacci: Section<FibonacciRetracement>,
}

#[derive(Debug, Serialize)]
pub struct FailedSource {
    pub source: SourceKey,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardReport {
    pub generated_at: DateTime<Utc>,
    pub resolution: String,
    pub sources_ok: Vec<SourceKey>,
    pub sources_failed: Vec<FailedSource>,
    pub composite: Vec<CompositeRow>,
    pub indicators: Option<IndicatorReport>,
    pub funding: Option<Section<Vec<AnnualizedRate>>>,
}

/// Run every indicator on `series` with the configured parameters.
pub fn analyze_series(series: &BarSeries, config: &AnalyticsConfig) -> IndicatorReport {
    let macd = compute_macd(series, config.macd).map(|result| MacdSection {
        zones: macd_zones(&result),
        series: result,
    });

    IndicatorReport {
        source: series.key().clone(),
        rsi: compute_rsi(series, config.rsi).into(),
        macd: macd.into(),
        stochastic: compute_stochastic(series, config.stochastic).into(),
        fibonacci: compute_fibonacci_levels(series).into(),
    }
}

/// Series the indicators run on: the first configured request that returned
/// bars.
fn primary_series<'a>(outcome: &'a FetchOutcome, config: &AnalyticsConfig) -> Option<&'a BarSeries> {
    config
        .requests()
        .iter()
        .filter_map(|r| outcome.series.get(&r.key))
        .find(|s| !s.is_empty())
        .or_else(|| outcome.primary())
}

/// Assemble a report from an already-completed fetch round.
pub fn assemble(
    outcome: &FetchOutcome,
    config: &AnalyticsConfig,
    funding: Option<Section<Vec<AnnualizedRate>>>,
) -> DashboardReport {
    let composite = aggregate_composite_price(&outcome.quotes());

    let indicators = primary_series(outcome, config).map(|s| analyze_series(s, config));
    if indicators.is_none() {
        warn!("no source returned bars; indicators skipped");
    }

    DashboardReport {
        generated_at: Utc::now(),
        resolution: config.resolution.clone(),
        sources_ok: outcome.series.keys().cloned().collect(),
        sources_failed: outcome
            .failures
            .iter()
            .map(|(k, e)| FailedSource {
                source: k.clone(),
                reason: e.to_string(),
            })
            .collect(),
        composite,
        indicators,
        funding,
    }
}

/// Fetch, aggregate, and analyse in one go.
pub async fn build_report(
    orchestrator: &FetchOrchestrator,
    funding_client: Option<&FundingRateClient>,
    config: &AnalyticsConfig,
) -> DashboardReport {
    let requests = config.requests();

    // Funding history is independent of the bar sources; fetch both together.
    let funding_fut = async {
        match (funding_client, config.funding_symbol.as_deref()) {
            (Some(client), Some(symbol)) => Some(Section::from(
                client
                    .fetch_annualized(symbol, config.funding_limit)
                    .await,
            )),
            _ => None,
        }
    };
    let (outcome, funding) = tokio::join!(orchestrator.fetch_all(&requests), funding_fut);

    let report = assemble(&outcome, config, funding);
    info!(
        sources_ok = report.sources_ok.len(),
        sources_failed = report.sources_failed.len(),
        composite_rows = report.composite.len(),
        "dashboard report built"
    );
    report
}
