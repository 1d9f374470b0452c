// src/app.rs
//! Wiring shared by the server and the replay tool: tracing, store backend,
//! pipeline and notifiers built from an `AppConfig`.

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::analyze::{SentimentScorer, SpamFilter};
use crate::clock::SharedClock;
use crate::config::{AppConfig, LogConfig, StoreBackend};
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::pipeline::Pipeline;
use crate::report::Reporter;
use crate::store::{MemoryStore, RecordStore, SqliteStore};

/// Install the global subscriber. `RUST_LOG` overrides the configured filter.
/// Safe to call twice; the second call is a no-op.
pub fn init_tracing(cfg: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.filter));
    let registry = tracing_subscriber::registry().with(filter);
    let res = if cfg.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing already initialized");
    }
}

pub fn build_store(cfg: &AppConfig, clock: SharedClock) -> anyhow::Result<Arc<dyn RecordStore>> {
    Ok(match cfg.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new(clock)),
        StoreBackend::Sqlite => Arc::new(
            SqliteStore::open(&cfg.store.path, clock)
                .with_context(|| format!("opening {}", cfg.store.path.display()))?,
        ),
    })
}

pub fn build_pipeline(
    cfg: &AppConfig,
    store: Arc<dyn RecordStore>,
    clock: SharedClock,
) -> anyhow::Result<Pipeline> {
    let scorer = SentimentScorer::with_builtin(&cfg.scorer.weights)?;
    tracing::info!(models = ?scorer.model_names(), "sentiment scorer configured");
    Ok(Pipeline::new(
        SpamFilter::new(cfg.spam.clone(), clock.clone()),
        Arc::new(scorer),
        store,
        clock,
        cfg.retention(),
    ))
}

pub fn build_reporter(cfg: &AppConfig, store: Arc<dyn RecordStore>) -> anyhow::Result<Reporter> {
    Ok(Reporter::new(store)
        .with_thresholds(cfg.report.bullish_threshold, cfg.report.bearish_threshold)?)
}

/// Log notifier always; webhook when a URL is configured.
pub fn build_notifiers(cfg: &AppConfig) -> Vec<Box<dyn Notifier>> {
    let mut out: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier)];
    if let Some(url) = &cfg.notify.webhook_url {
        out.push(Box::new(
            WebhookNotifier::new(url.clone())
                .with_timeout(cfg.notify.timeout_secs)
                .with_retries(cfg.notify.max_retries),
        ));
    }
    out
}
