use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::{BarSeries, SourceKey};

/// Parameters of one `fetch_bars` call.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FetchRequest {
    pub key: SourceKey,
    /// Number of native bars merged into each returned bar.
    pub aggregate: usize,
    /// Maximum number of native bars requested from the exchange.
    pub limit: u32,
}

impl FetchRequest {
    pub fn new(key: SourceKey, aggregate: usize, limit: u32) -> Self {
        Self {
            key,
            aggregate,
            limit,
        }
    }
}

/// Anything that can deliver a [`BarSeries`] for a request.
///
/// Implementations return `SourceUnavailable` on transport or server
/// failure and an empty series (not an error) when the exchange has no bars.
pub trait BarSource: Send + Sync {
    fn fetch_bars<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, AnalyticsResult<BarSeries>>;
}

impl<S: BarSource + ?Sized> BarSource for Arc<S> {
    fn fetch_bars<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, AnalyticsResult<BarSeries>> {
        (**self).fetch_bars(request)
    }
}

/// Routes each request to the source registered for its exchange.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn BarSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, exchange: impl Into<String>, source: Arc<dyn BarSource>) {
        self.sources.insert(exchange.into(), source);
    }

    pub fn with(mut self, exchange: impl Into<String>, source: Arc<dyn BarSource>) -> Self {
        self.register(exchange, source);
        self
    }
}

impl BarSource for SourceRegistry {
    fn fetch_bars<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, AnalyticsResult<BarSeries>> {
        match self.sources.get(&request.key.exchange) {
            Some(source) => source.fetch_bars(request),
            None => Box::pin(future::ready(Err(AnalyticsError::source_unavailable(
                &request.key,
                "no source registered for exchange",
            )))),
        }
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("exchanges", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Test support
// =============================================================================
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::types::tests::ts;
    use crate::types::Bar;

    /// In-memory source: fixed closes per exchange, optional delay, optional
    /// failure. Tracks the peak number of concurrent calls.
    #[derive(Default)]
    pub(crate) struct StaticSource {
        pub closes: BTreeMap<String, Vec<f64>>,
        pub delays: BTreeMap<String, Duration>,
        pub failing: Vec<String>,
        pub in_flight: AtomicUsize,
        pub peak: AtomicUsize,
        pub calls: AtomicUsize,
    }

    impl StaticSource {
        pub(crate) fn with_closes(mut self, exchange: &str, closes: Vec<f64>) -> Self {
            self.closes.insert(exchange.to_string(), closes);
            self
        }

        pub(crate) fn with_delay(mut self, exchange: &str, delay: Duration) -> Self {
            self.delays.insert(exchange.to_string(), delay);
            self
        }

        pub(crate) fn failing(mut self, exchange: &str) -> Self {
            self.failing.push(exchange.to_string());
            self
        }
    }

    impl BarSource for StaticSource {
        fn fetch_bars<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, AnalyticsResult<BarSeries>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);

                let exchange = &request.key.exchange;
                if let Some(delay) = self.delays.get(exchange) {
                    tokio::time::sleep(*delay).await;
                }
                self.in_flight.fetch_sub(1, Ordering::SeqCst);

                if self.failing.contains(exchange) {
                    return Err(AnalyticsError::source_unavailable(&request.key, "HTTP 503"));
                }

                let bars = self
                    .closes
                    .get(exchange)
                    .map(|closes| {
                        closes
                            .iter()
                            .enumerate()
                            .map(|(i, &c)| Bar::new(ts(i as i64), c, c, c, c, 1.0))
                            .collect()
                    })
                    .unwrap_or_default();
                BarSeries::new(request.key.clone(), bars).resample(request.aggregate)
            })
        }
    }

    #[tokio::test]
    async fn registry_routes_by_exchange() {
        let a = Arc::new(StaticSource::default().with_closes("a", vec![1.0, 2.0]));
        let registry = SourceRegistry::new().with("a", a.clone());

        let ok = FetchRequest::new(SourceKey::new("a", "X", "1h"), 1, 10);
        assert_eq!(registry.fetch_bars(&ok).await.unwrap().len(), 2);

        let missing = FetchRequest::new(SourceKey::new("zz", "X", "1h"), 1, 10);
        assert!(matches!(
            registry.fetch_bars(&missing).await,
            Err(AnalyticsError::SourceUnavailable { .. })
        ));
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
    }
}
