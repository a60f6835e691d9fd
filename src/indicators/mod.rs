// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, stateless transforms over an immutable `BarSeries`. Every public
// `compute_*` function returns an `IndicatorResult` aligned 1:1 with the input
// bars; leading entries are `None` until the rolling window has enough
// history. Too-short input is an `InsufficientData` error, never a column of
// zeros.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod stats;
pub mod stochastic;

pub use macd::{compute_macd, macd_zones, MacdParams, MacdZones};
pub use rsi::{compute_rsi, RsiParams};
pub use stochastic::{compute_stochastic, StochasticParams};
