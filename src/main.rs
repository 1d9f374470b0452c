//! Sentiment service: boots the Axum HTTP server over the configured store.
//!
//! Messages arrive through `POST /ingest` (or the `replay` tool); summaries are
//! served from `/summary/{ticker}` and `/market`.

use std::sync::Arc;

use anyhow::Context;
use ticker_sentiment::{api, app, clock, metrics::Metrics, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cfg = AppConfig::load().context("loading configuration")?;
    app::init_tracing(&cfg.log);
    tracing::info!(
        tickers = ?cfg.tickers,
        backend = ?cfg.store.backend,
        retention_days = cfg.store.retention_days,
        "starting ticker-sentiment"
    );

    let metrics = Metrics::init(cfg.store.retention_days)?;
    let clock = clock::system();
    let store = app::build_store(&cfg, clock.clone())?;
    let pipeline = Arc::new(app::build_pipeline(&cfg, store.clone(), clock.clone())?);

    match pipeline.cleanup() {
        Ok(n) => tracing::info!(removed = n, "startup retention cleanup"),
        Err(e) => tracing::warn!(error = %e, "startup cleanup failed"),
    }

    let state = api::AppState {
        pipeline,
        reporter: app::build_reporter(&cfg, store)?,
        tickers: Arc::new(cfg.tickers.clone()),
        default_window: cfg.default_window(),
        clock,
    };
    let router = api::router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(cfg.server.bind.as_str())
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    tracing::info!(addr = %cfg.server.bind, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
