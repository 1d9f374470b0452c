// src/store/mod.rs
//! Deduplicating record store.
//!
//! `source_id` is globally unique: a second insert with the same id is a no-op
//! reported as `Skipped`, never an overwrite. Records leave the store only through
//! retention cleanup.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::scoring::SentimentScore;
use crate::error::{PipelineError, Result};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub source_id: String,
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub sentiment: SentimentScore,
    pub inserted_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Boundary check applied by every backend before anything is written.
    pub fn validate(&self) -> Result<()> {
        if self.source_id.trim().is_empty() {
            return Err(PipelineError::validation("empty source_id"));
        }
        if self.ticker.trim().is_empty() {
            return Err(PipelineError::validation(format!(
                "record {}: empty ticker",
                self.source_id
            )));
        }
        let s = &self.sentiment;
        let in_range = |v: f64, lo: f64, hi: f64| v.is_finite() && (lo..=hi).contains(&v);
        if !in_range(s.polarity, -1.0, 1.0)
            || !in_range(s.compound, -1.0, 1.0)
            || !in_range(s.subjectivity, 0.0, 1.0)
        {
            return Err(PipelineError::validation(format!(
                "record {}: sentiment out of range",
                self.source_id
            )));
        }
        if s.model_weights.is_empty()
            || s.model_weights.values().any(|w| !w.is_finite() || *w <= 0.0)
        {
            return Err(PipelineError::validation(format!(
                "record {}: incomplete model weights",
                self.source_id
            )));
        }
        if s.components.values().any(|c| !in_range(*c, -1.0, 1.0)) {
            return Err(PipelineError::validation(format!(
                "record {}: model component out of range",
                self.source_id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    Skipped,
}

/// Half-open time range `[start, end)` over record timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(PipelineError::validation(format!(
                "window end {end} precedes start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `span` leading up to `end`.
    pub fn trailing(end: DateTime<Utc>, span: Duration) -> Self {
        Self {
            start: end - span,
            end,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// The whole persistence surface. Implementations must be safe to share across
/// per-ticker tasks.
pub trait RecordStore: Send + Sync {
    fn insert(&self, record: StoredRecord) -> Result<InsertOutcome>;

    /// Removes records whose `inserted_at` is older than `now - retention`.
    /// Returns how many were removed.
    fn cleanup(&self, retention: Duration) -> Result<usize>;

    /// Records for `ticker` inside `window`, ascending by timestamp then source_id.
    fn query(&self, ticker: &str, window: &TimeWindow) -> Result<Vec<StoredRecord>>;

    fn backend(&self) -> &'static str;
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    pub fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    pub fn record(id: &str, ticker: &str, ts: DateTime<Utc>, compound: f64) -> StoredRecord {
        StoredRecord {
            source_id: id.to_string(),
            ticker: ticker.to_string(),
            timestamp: ts,
            sentiment: SentimentScore {
                polarity: compound,
                subjectivity: 0.4,
                compound,
                model_weights: BTreeMap::from([("valence".to_string(), 0.6)]),
                components: BTreeMap::from([("valence".to_string(), compound)]),
            },
            inserted_at: ts,
        }
    }
}
