// src/pipeline.rs
//! Ingest cycle: source -> normalize -> spam -> score -> store, then retention cleanup.
//!
//! Every ticker can run its own cycle concurrently; they share the store, the
//! scorer and the daily spam state.

use chrono::Duration;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::analyze::{DailyState, SentimentScorer, SpamFilter, SpamReason};
use crate::clock::SharedClock;
use crate::error::{PipelineError, Result};
use crate::ingest::normalize;
use crate::ingest::types::{MessageSource, RawMessage};
use crate::store::{InsertOutcome, RecordStore, StoredRecord};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_messages_total", "Messages received from sources.");
        describe_counter!("pipeline_spam_total", "Messages dropped as spam, by reason.");
        describe_counter!(
            "pipeline_model_failures_total",
            "Sentiment model calls that failed or returned non-finite output."
        );
        describe_counter!(
            "pipeline_unscored_total",
            "Messages dropped because no sentiment model answered."
        );
        describe_counter!("store_inserted_total", "Records inserted.");
        describe_counter!("store_skipped_total", "Inserts skipped on duplicate source_id.");
        describe_counter!("store_invalid_total", "Records rejected by validation.");
        describe_counter!(
            "store_cleanup_removed_total",
            "Records removed by retention cleanup."
        );
        describe_gauge!(
            "pipeline_last_cycle_ts",
            "Unix ts when an ingest cycle last finished."
        );
    });
}

/// What happened to a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum Disposition {
    Stored,
    Duplicate,
    Spam(SpamReason),
    Unscored,
    Invalid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub ticker: String,
    pub fetched: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub spam: usize,
    pub unscored: usize,
    pub invalid: usize,
    pub store_errors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,
}

impl CycleReport {
    fn new(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            ..Self::default()
        }
    }

    fn tally(&mut self, d: Disposition) {
        match d {
            Disposition::Stored => self.inserted += 1,
            Disposition::Duplicate => self.skipped += 1,
            Disposition::Spam(_) => self.spam += 1,
            Disposition::Unscored => self.unscored += 1,
            Disposition::Invalid => self.invalid += 1,
        }
    }
}

pub struct Pipeline {
    spam: SpamFilter,
    spam_state: Arc<Mutex<DailyState>>,
    scorer: Arc<SentimentScorer>,
    store: Arc<dyn RecordStore>,
    clock: SharedClock,
    retention: Duration,
}

impl Pipeline {
    pub fn new(
        spam: SpamFilter,
        scorer: Arc<SentimentScorer>,
        store: Arc<dyn RecordStore>,
        clock: SharedClock,
        retention: Duration,
    ) -> Self {
        ensure_metrics_described();
        Self {
            spam,
            spam_state: Arc::new(Mutex::new(DailyState::new())),
            scorer,
            store,
            clock,
            retention,
        }
    }

    /// Share daily spam state with another pipeline instance.
    pub fn with_spam_state(mut self, state: Arc<Mutex<DailyState>>) -> Self {
        self.spam_state = state;
        self
    }

    pub fn spam_state(&self) -> Arc<Mutex<DailyState>> {
        self.spam_state.clone()
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Push one message through the stages. Only storage failures surface as `Err`.
    pub fn process(&self, raw: &RawMessage) -> Result<Disposition> {
        counter!("pipeline_messages_total").increment(1);
        let msg = normalize(raw);

        let verdict = {
            let mut state = self
                .spam_state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.spam.classify(&msg, &mut state)
        };
        if let Some(reason) = verdict.reason.filter(|_| verdict.is_spam) {
            counter!("pipeline_spam_total", "reason" => reason.as_str()).increment(1);
            return Ok(Disposition::Spam(reason));
        }

        let sentiment = match self.scorer.score(&msg) {
            Ok(s) => s,
            Err(PipelineError::ModelUnavailable { attempted }) => {
                tracing::warn!(target: "pipeline", id = msg.short_id(), attempted, "message unscored, dropped");
                counter!("pipeline_unscored_total").increment(1);
                return Ok(Disposition::Unscored);
            }
            Err(e) => return Err(e),
        };

        let record = StoredRecord {
            source_id: msg.source_id().to_string(),
            ticker: msg.ticker.clone(),
            timestamp: msg.timestamp(),
            sentiment,
            inserted_at: self.clock.now(),
        };
        match self.store.insert(record) {
            Ok(InsertOutcome::Inserted) => {
                counter!("store_inserted_total").increment(1);
                Ok(Disposition::Stored)
            }
            Ok(InsertOutcome::Skipped) => {
                counter!("store_skipped_total").increment(1);
                Ok(Disposition::Duplicate)
            }
            Err(PipelineError::Validation(why)) => {
                tracing::warn!(target: "store", id = msg.short_id(), %why, "record rejected");
                counter!("store_invalid_total").increment(1);
                Ok(Disposition::Invalid)
            }
            Err(e) => Err(e),
        }
    }

    /// Process a batch without cleanup. Storage errors are counted and the batch continues.
    pub fn process_batch(&self, ticker: &str, batch: &[RawMessage]) -> CycleReport {
        let mut report = CycleReport::new(ticker);
        report.fetched = batch.len();
        for raw in batch {
            match self.process(raw) {
                Ok(d) => report.tally(d),
                Err(e) => {
                    tracing::error!(target: "store", source_id = %raw.source_id, error = %e, "insert failed");
                    report.store_errors += 1;
                }
            }
        }
        report
    }

    /// Retention cleanup against the shared store.
    pub fn cleanup(&self) -> Result<usize> {
        let removed = self.store.cleanup(self.retention)?;
        counter!("store_cleanup_removed_total").increment(removed as u64);
        if removed > 0 {
            tracing::info!(target: "store", removed, "retention cleanup");
        }
        Ok(removed)
    }

    /// One fetch-process-cleanup cycle for a ticker. Never fails: source and
    /// cleanup errors are reported in the `CycleReport`.
    ///
    /// The fetch is awaited; processing and cleanup hit the store synchronously
    /// and run on the blocking pool.
    pub async fn run_cycle(self: &Arc<Self>, source: &dyn MessageSource, ticker: &str) -> CycleReport {
        let fetched = source.fetch(ticker).await;
        if let Err(e) = &fetched {
            tracing::warn!(target: "pipeline", source = source.name(), ticker, error = ?e, "source error");
        }

        let this = Arc::clone(self);
        let owned = ticker.to_string();
        let work = tokio::task::spawn_blocking(move || {
            let mut report = match fetched {
                Ok(batch) => this.process_batch(&owned, &batch),
                Err(e) => {
                    let mut r = CycleReport::new(&owned);
                    r.source_error = Some(format!("{e:#}"));
                    r
                }
            };
            match this.cleanup() {
                Ok(n) => report.cleanup_removed = Some(n),
                Err(e) => {
                    tracing::error!(target: "store", error = %e, "cleanup failed");
                    report.cleanup_error = Some(e.to_string());
                }
            }
            report
        });
        let report = match work.await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(target: "pipeline", ticker, error = %e, "cycle worker failed");
                let mut r = CycleReport::new(ticker);
                r.cleanup_error = Some(format!("cycle worker failed: {e}"));
                r
            }
        };

        gauge!("pipeline_last_cycle_ts").set(self.clock.now().timestamp() as f64);
        tracing::info!(
            target: "pipeline",
            ticker,
            fetched = report.fetched,
            inserted = report.inserted,
            skipped = report.skipped,
            spam = report.spam,
            "cycle done"
        );
        report
    }

    /// Run one cycle per ticker, each on its own task. Reports come back in
    /// `tickers` order; a panicked task is logged and left out.
    pub async fn run_tickers(
        self: &Arc<Self>,
        source: Arc<dyn MessageSource>,
        tickers: &[String],
    ) -> Vec<CycleReport> {
        let handles: Vec<_> = tickers
            .iter()
            .map(|t| {
                let this = Arc::clone(self);
                let source = Arc::clone(&source);
                let ticker = t.clone();
                tokio::spawn(async move { this.run_cycle(source.as_ref(), &ticker).await })
            })
            .collect();

        let mut out = Vec::with_capacity(handles.len());
        for (h, t) in handles.into_iter().zip(tickers) {
            match h.await {
                Ok(r) => out.push(r),
                Err(e) => tracing::error!(target: "pipeline", ticker = %t, error = %e, "cycle task failed"),
            }
        }
        out
    }
}
