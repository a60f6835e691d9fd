// =============================================================================
// Error taxonomy for the analytics core
// =============================================================================
//
// Only three kinds of failure ever leave a public function:
//
//   SourceUnavailable - one exchange/instrument fetch failed or timed out.
//                       The orchestrator records it and keeps going.
//   InsufficientData  - a rolling window or pivot search had too few bars.
//                       Propagates to the caller untouched.
//   InvalidParameter  - a zero period, zero aggregate, fast >= slow, etc.
//
// Division-by-zero cases (RSI with no losses, Stochastic with a flat range,
// VWAP with zero volume) are defined numeric outcomes and never show up here.

use thiserror::Error;

use crate::types::SourceKey;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("source {key} unavailable: {reason}")]
    SourceUnavailable { key: SourceKey, reason: String },

    #[error("not enough data for {operation}: need {required}, have {available}")]
    InsufficientData {
        operation: &'static str,
        required: usize,
        available: usize,
    },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl AnalyticsError {
    pub fn source_unavailable(key: &SourceKey, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            key: key.clone(),
            reason: reason.into(),
        }
    }

    pub fn insufficient(operation: &'static str, required: usize, available: usize) -> Self {
        Self::InsufficientData {
            operation,
            required,
            available,
        }
    }

    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

pub type AnalyticsResult<T> = std::result::Result<T, AnalyticsError>;
