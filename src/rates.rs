// =============================================================================
// Rate Annualizer
// =============================================================================
//
// Converts a per-period rate (e.g. an 8h perpetual funding rate) into its
// yearly equivalent by simple multiplication:
//
//   annualized = period_rate * periods_per_year[resolution]
//
// Unknown resolutions fall back to 365 periods per year. That is a lenient
// default, not a validation failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Periods per year used when a resolution label is not in the table.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 365.0;

/// Static resolution → periods-per-year table.
#[derive(Debug, Clone, Copy)]
pub struct AnnualizationTable {
    entries: &'static [(&'static str, f64)],
}

/// The process-wide table.
pub const ANNUALIZATION_TABLE: AnnualizationTable = AnnualizationTable {
    entries: &[
        ("1m", 525_600.0),
        ("15m", 35_040.0),
        ("30m", 17_520.0),
        ("1h", 8_760.0),
        ("2h", 4_380.0),
        ("4h", 2_190.0),
        ("8h", 1_095.0),
        ("12h", 730.0),
        ("1d", 365.0),
        ("1w", 52.0),
    ],
};

impl AnnualizationTable {
    /// Exact lookup; `None` for labels the table does not know.
    pub fn get(&self, resolution: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(label, _)| *label == resolution)
            .map(|(_, periods)| *periods)
    }

    /// Lookup with the 365 fallback.
    pub fn periods_per_year(&self, resolution: &str) -> f64 {
        self.get(resolution).unwrap_or(DEFAULT_PERIODS_PER_YEAR)
    }

    pub fn resolutions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(label, _)| *label)
    }
}

/// Annualize `period_rate` sampled at `resolution`.
pub fn annualize_rate(period_rate: f64, resolution: &str) -> f64 {
    period_rate * ANNUALIZATION_TABLE.periods_per_year(resolution)
}

// =============================================================================
// Rate history
// =============================================================================

/// One historical rate observation (funding, borrow, ...).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub timestamp: DateTime<Utc>,
    pub rate: f64,
}

/// A rate observation together with its annualized value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnualizedRate {
    pub timestamp: DateTime<Utc>,
    pub rate: f64,
    pub annualized: f64,
}

/// Annualize every record of a history, ordered by timestamp.
pub fn annualize_history(records: &[RateRecord], resolution: &str) -> Vec<AnnualizedRate> {
    let factor = ANNUALIZATION_TABLE.periods_per_year(resolution);
    let mut out: Vec<AnnualizedRate> = records
        .iter()
        .map(|r| AnnualizedRate {
            timestamp: r.timestamp,
            rate: r.rate,
            annualized: r.rate * factor,
        })
        .collect();
    out.sort_by_key(|r| r.timestamp);
    out
}
