// =============================================================================
// Aurora Analytics - one-shot dashboard report
// =============================================================================
//
// Fetches every configured (exchange, instrument) series, builds the composite
// price and indicator sections, and prints the report as JSON on stdout.
// Logs go to stderr so the JSON stays machine-readable.
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aurora_analytics::config::AnalyticsConfig;
use aurora_analytics::fetch::{FetchOrchestrator, FundingRateClient, KlineRestSource, SourceRegistry};
use aurora_analytics::report::build_report;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── 2. Config ────────────────────────────────────────────────────────
    let config_path =
        std::env::var("AURORA_CONFIG").unwrap_or_else(|_| "analytics_config.json".into());
    let mut config = AnalyticsConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AnalyticsConfig::default()
    });
    config.apply_env()?;
    config.validate()?;

    info!(
        exchanges = ?config.exchanges.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        resolution = %config.resolution,
        max_concurrency = config.max_concurrent_fetches,
        "Configured sources"
    );

    // ── 3. Sources (one shared HTTP pool) ────────────────────────────────
    let http = reqwest::Client::builder()
        .timeout(config.fetch_timeout())
        .build()
        .context("failed to build HTTP client")?;

    let mut registry = SourceRegistry::new();
    for ex in &config.exchanges {
        let source = KlineRestSource::with_client(&ex.name, &ex.base_url, http.clone());
        registry.register(&ex.name, Arc::new(source));
    }

    let orchestrator = FetchOrchestrator::new(
        Arc::new(registry),
        config.max_concurrent_fetches,
        config.fetch_timeout(),
    )?;
    let funding = FundingRateClient::with_client(&config.funding_base_url, http);

    // ── 4. Report ────────────────────────────────────────────────────────
    let report = build_report(&orchestrator, Some(&funding), &config).await;

    let json = serde_json::to_string_pretty(&report).context("failed to serialise report")?;
    println!("{json}");

    Ok(())
}
