// =============================================================================
// Fetch Layer
// =============================================================================
//
// Everything that suspends on the network lives here:
//
//   source       - `BarSource` trait, `FetchRequest`, `SourceRegistry`
//   orchestrator - bounded fan-out / fan-in over many sources
//   kline_rest   - Binance-compatible spot kline endpoint
//   funding      - perpetual funding-rate history
//
// The computation modules never import from here; they only see the
// materialised `BarSeries` values the orchestrator hands back.

pub mod funding;
pub mod kline_rest;
pub mod orchestrator;
pub mod source;

pub use funding::FundingRateClient;
pub use kline_rest::KlineRestSource;
pub use orchestrator::{FetchOrchestrator, FetchOutcome};
pub use source::{BarSource, FetchRequest, SourceRegistry};
