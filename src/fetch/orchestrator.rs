// =============================================================================
// Concurrent Fetch Orchestrator
// =============================================================================
//
// Fan-out / fan-in over many `(exchange, instrument)` sources:
//
//   - at most `max_concurrency` fetches in flight (default 10)
//   - each fetch bounded by `fetch_timeout`; exceeding it marks that source
//     as failed, nothing else is cancelled
//   - one attempt per source per call, no retries
//   - results keyed by `SourceKey` in ordered maps, so the outcome is the
//     same whichever fetch completes first
//
// Computation only starts once `fetch_all` has returned.
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, StreamExt};
use tracing::{debug, info, instrument, warn};

use super::source::{BarSource, FetchRequest};
use crate::composite::quotes_from_series;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::{BarSeries, ExchangeQuote, SourceKey};

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything one `fetch_all` produced.
#[derive(Debug, Default, Clone)]
pub struct FetchOutcome {
    pub series: BTreeMap<SourceKey, BarSeries>,
    pub failures: BTreeMap<SourceKey, AnalyticsError>,
}

impl FetchOutcome {
    /// VWAP inputs built from every successful series.
    pub fn quotes(&self) -> Vec<ExchangeQuote> {
        quotes_from_series(self.series.values())
    }

    /// Exchanges with at least one successful, non-empty series.
    pub fn contributing_exchanges(&self) -> BTreeSet<&str> {
        self.series
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(k, _)| k.exchange.as_str())
            .collect()
    }

    /// First non-empty series in key order.
    pub fn primary(&self) -> Option<&BarSeries> {
        self.series.values().find(|s| !s.is_empty())
    }
}

/// Bounded-parallel fetcher owned by the caller.
pub struct FetchOrchestrator {
    source: Arc<dyn BarSource>,
    max_concurrency: usize,
    fetch_timeout: Duration,
}

impl FetchOrchestrator {
    /// # Errors
    /// `InvalidParameter` when `max_concurrency` is zero.
    pub fn new(
        source: Arc<dyn BarSource>,
        max_concurrency: usize,
        fetch_timeout: Duration,
    ) -> AnalyticsResult<Self> {
        if max_concurrency == 0 {
            return Err(AnalyticsError::InvalidParameter {
                name: "max_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            source,
            max_concurrency,
            fetch_timeout,
        })
    }

    pub fn with_defaults(source: Arc<dyn BarSource>) -> Self {
        Self {
            source,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Fetch every request, tolerating individual failures.
    ///
    /// Each `SourceKey` is fetched once. When several requests name the same
    /// key, the first one wins and the rest are dropped with a warning.
    #[instrument(skip_all, name = "orchestrator::fetch_all", fields(requests = requests.len()))]
    pub async fn fetch_all(&self, requests: &[FetchRequest]) -> FetchOutcome {
        let mut unique: BTreeMap<&SourceKey, &FetchRequest> = BTreeMap::new();
        for request in requests {
            match unique.get(&request.key) {
                None => {
                    unique.insert(&request.key, request);
                }
                Some(kept) if *kept != request => {
                    warn!(
                        source = %request.key,
                        kept_aggregate = kept.aggregate,
                        kept_limit = kept.limit,
                        dropped_aggregate = request.aggregate,
                        dropped_limit = request.limit,
                        "conflicting request for an already requested source, ignoring it"
                    );
                }
                Some(_) => {}
            }
        }

        let results: Vec<(SourceKey, AnalyticsResult<BarSeries>)> = stream::iter(unique.into_values())
            .map(|request| self.fetch_one(request))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut outcome = FetchOutcome::default();
        for (key, result) in results {
            match result {
                Ok(series) => {
                    outcome.series.insert(key, series);
                }
                Err(err) => {
                    outcome.failures.insert(key, err);
                }
            }
        }

        info!(
            ok = outcome.series.len(),
            failed = outcome.failures.len(),
            "fetch round complete"
        );
        outcome
    }

    async fn fetch_one(&self, request: &FetchRequest) -> (SourceKey, AnalyticsResult<BarSeries>) {
        let key = request.key.clone();
        let result = match tokio::time::timeout(self.fetch_timeout, self.source.fetch_bars(request)).await {
            Ok(Ok(series)) => {
                debug!(source = %key, bars = series.len(), "source fetched");
                Ok(series)
            }
            Ok(Err(err)) => {
                warn!(source = %key, error = %err, "source failed, excluding it");
                Err(err)
            }
            Err(_) => {
                warn!(source = %key, timeout_ms = self.fetch_timeout.as_millis() as u64, "source timed out, excluding it");
                Err(AnalyticsError::source_unavailable(
                    &key,
                    format!("no response within {:?}", self.fetch_timeout),
                ))
            }
        };
        (key, result)
    }
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("max_concurrency", &self.max_concurrency)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::composite::aggregate_composite_price;
    use crate::fetch::source::tests::StaticSource;

    fn requests(exchanges: &[&str]) -> Vec<FetchRequest> {
        exchanges
            .iter()
            .map(|e| FetchRequest::new(SourceKey::new(*e, "BTCUSDT", "1h"), 1, 100))
            .collect()
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let source = Arc::new(StaticSource::default());
        assert!(FetchOrchestrator::new(source, 0, DEFAULT_FETCH_TIMEOUT).is_err());
    }

    #[tokio::test]
    async fn partial_failure_keeps_remaining_sources() {
        let source = StaticSource::default()
            .with_closes("a", vec![100.0, 101.0, 102.0])
            .with_closes("b", vec![100.5, 101.5, 102.5, 103.5])
            .with_closes("c", vec![99.0, 99.0])
            .failing("c");
        let orch = FetchOrchestrator::with_defaults(Arc::new(source));

        let outcome = orch.fetch_all(&requests(&["a", "b", "c"])).await;
        assert_eq!(outcome.series.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome
            .failures
            .contains_key(&SourceKey::new("c", "BTCUSDT", "1h")));

        let rows = aggregate_composite_price(&outcome.quotes());
        // union of a (3 bars) and b (4 bars)
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| !r.per_exchange_delta.contains_key("c")));
        assert_eq!(rows[3].per_exchange_delta.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[tokio::test]
    async fn completion_order_does_not_change_the_result() {
        let build = |slow: &str| {
            StaticSource::default()
                .with_closes("a", vec![100.0, 101.0, 99.5])
                .with_closes("b", vec![100.2, 100.9, 99.9])
                .with_closes("c", vec![100.4, 101.3])
                .with_delay(slow, Duration::from_millis(30))
        };

        let first = FetchOrchestrator::with_defaults(Arc::new(build("a")))
            .fetch_all(&requests(&["a", "b", "c"]))
            .await;
        let second = FetchOrchestrator::with_defaults(Arc::new(build("c")))
            .fetch_all(&requests(&["c", "b", "a"]))
            .await;

        assert_eq!(
            aggregate_composite_price(&first.quotes()),
            aggregate_composite_price(&second.quotes())
        );
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let names: Vec<String> = (0..12).map(|i| format!("ex{i}")).collect();
        let mut source = StaticSource::default();
        for n in &names {
            source = source
                .with_closes(n, vec![1.0])
                .with_delay(n, Duration::from_millis(20));
        }
        let source = Arc::new(source);
        let orch = FetchOrchestrator::new(source.clone(), 3, DEFAULT_FETCH_TIMEOUT).unwrap();

        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let outcome = orch.fetch_all(&requests(&refs)).await;

        assert_eq!(outcome.series.len(), 12);
        assert!(source.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn slow_source_times_out_alone() {
        let source = StaticSource::default()
            .with_closes("fast", vec![1.0, 2.0])
            .with_closes("slow", vec![1.0, 2.0])
            .with_delay("slow", Duration::from_secs(5));
        let orch =
            FetchOrchestrator::new(Arc::new(source), 4, Duration::from_millis(50)).unwrap();

        let outcome = orch.fetch_all(&requests(&["fast", "slow"])).await;
        assert_eq!(outcome.contributing_exchanges().into_iter().collect::<Vec<_>>(), vec!["fast"]);
        assert!(matches!(
            outcome.failures.get(&SourceKey::new("slow", "BTCUSDT", "1h")),
            Some(AnalyticsError::SourceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_requests_fetch_once() {
        let source = Arc::new(StaticSource::default().with_closes("a", vec![1.0]));
        let orch = FetchOrchestrator::with_defaults(source.clone());
        let outcome = orch.fetch_all(&requests(&["a", "a", "a"])).await;
        assert_eq!(outcome.series.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn conflicting_requests_for_one_source_keep_the_first() {
        let source = Arc::new(StaticSource::default().with_closes("a", vec![1.0, 2.0, 3.0, 4.0]));
        let orch = FetchOrchestrator::with_defaults(source.clone());
        let key = SourceKey::new("a", "BTCUSDT", "1h");

        let outcome = orch
            .fetch_all(&[
                FetchRequest::new(key.clone(), 1, 100),
                FetchRequest::new(key.clone(), 2, 50),
            ])
            .await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.series[&key].len(), 4);
    }
}
