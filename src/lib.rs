// =============================================================================
// Aurora Analytics - market-data core for the crypto dashboard
// =============================================================================
//
// Library entry points used by the HTTP layer:
//
//   annualize_rate            - per-period rate -> yearly rate
//   aggregate_composite_price - multi-exchange VWAP composite + basis deltas
//   compute_rsi / compute_macd / compute_stochastic
//   compute_fibonacci_levels  - swing pivots + 13 retracement levels
//   FetchOrchestrator         - bounded-parallel fetch of the bar sources
//
// The computation modules are synchronous and allocation-only; the network
// lives exclusively under `fetch`.
// =============================================================================

pub mod composite;
pub mod config;
pub mod error;
pub mod fetch;
pub mod indicators;
pub mod pivots;
pub mod rates;
pub mod report;
pub mod types;

pub use composite::aggregate_composite_price;
pub use error::{AnalyticsError, AnalyticsResult};
pub use fetch::{BarSource, FetchOrchestrator, FetchOutcome, FetchRequest};
pub use indicators::{compute_macd, compute_rsi, compute_stochastic};
pub use pivots::compute_fibonacci_levels;
pub use rates::annualize_rate;
pub use types::{Bar, BarSeries, CompositeRow, ExchangeQuote, FibonacciLevel, IndicatorResult, SourceKey};
