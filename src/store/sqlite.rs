// src/store/sqlite.rs
//! Embedded SQLite backend.
//!
//! One connection behind a mutex. `source_id` is the primary key and inserts go
//! through `INSERT OR IGNORE`, so a colliding insert is a zero-row change rather
//! than an error. Cleanup is a single DELETE inside a transaction.
//! Instants are stored as Unix milliseconds; model weights and per-model
//! components as JSON objects. `ticker` carries NOCASE collation so the
//! case-insensitive lookup still hits `idx_records_ticker_ts`.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{InsertOutcome, RecordStore, StoredRecord, TimeWindow};
use crate::analyze::scoring::SentimentScore;
use crate::clock::{self, SharedClock};
use crate::error::{PipelineError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sentiment_records (
    source_id      TEXT PRIMARY KEY NOT NULL,
    ticker         TEXT NOT NULL COLLATE NOCASE,
    ts_ms          INTEGER NOT NULL,
    polarity       REAL NOT NULL,
    subjectivity   REAL NOT NULL,
    compound       REAL NOT NULL,
    model_weights  TEXT NOT NULL,
    components     TEXT NOT NULL DEFAULT '{}',
    inserted_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_ticker_ts ON sentiment_records(ticker, ts_ms);
CREATE INDEX IF NOT EXISTS idx_records_inserted ON sentiment_records(inserted_at_ms);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    clock: SharedClock,
}

impl SqliteStore {
    /// Open (or create) a database file. Parent directories are created.
    pub fn open(path: impl AsRef<Path>, clock: SharedClock) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::storage(format!("creating {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;",
        )?;
        tracing::info!(target: "store", path = %path.display(), "sqlite store opened (WAL)");
        Self::with_connection(conn, clock)
    }

    pub fn open_in_memory(clock: SharedClock) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, clock)
    }

    /// In-memory database on the system clock.
    pub fn in_memory() -> Result<Self> {
        Self::open_in_memory(clock::system())
    }

    fn with_connection(conn: Connection, clock: SharedClock) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PipelineError::storage("sqlite connection lock poisoned"))
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| PipelineError::storage(format!("timestamp out of range: {ms}")))
}

struct Row {
    source_id: String,
    ticker: String,
    ts_ms: i64,
    polarity: f64,
    subjectivity: f64,
    compound: f64,
    model_weights: String,
    components: String,
    inserted_at_ms: i64,
}

fn from_json(source_id: &str, column: &str, raw: &str) -> Result<BTreeMap<String, f64>> {
    serde_json::from_str(raw)
        .map_err(|e| PipelineError::storage(format!("record {source_id}: bad {column}: {e}")))
}

impl Row {
    fn into_record(self) -> Result<StoredRecord> {
        let model_weights = from_json(&self.source_id, "model_weights", &self.model_weights)?;
        let components = from_json(&self.source_id, "components", &self.components)?;
        Ok(StoredRecord {
            timestamp: from_millis(self.ts_ms)?,
            inserted_at: from_millis(self.inserted_at_ms)?,
            sentiment: SentimentScore {
                polarity: self.polarity,
                subjectivity: self.subjectivity,
                compound: self.compound,
                model_weights,
                components,
            },
            source_id: self.source_id,
            ticker: self.ticker,
        })
    }
}

impl RecordStore for SqliteStore {
    fn insert(&self, record: StoredRecord) -> Result<InsertOutcome> {
        record.validate()?;
        let weights = serde_json::to_string(&record.sentiment.model_weights)
            .map_err(PipelineError::storage)?;
        let components = serde_json::to_string(&record.sentiment.components)
            .map_err(PipelineError::storage)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO sentiment_records
             (source_id, ticker, ts_ms, polarity, subjectivity, compound, model_weights, components, inserted_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.source_id,
                record.ticker,
                record.timestamp.timestamp_millis(),
                record.sentiment.polarity,
                record.sentiment.subjectivity,
                record.sentiment.compound,
                weights,
                components,
                record.inserted_at.timestamp_millis(),
            ],
        )?;
        Ok(if changed == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Skipped
        })
    }

    fn cleanup(&self, retention: Duration) -> Result<usize> {
        // A retention reaching past the representable range keeps everything.
        let Some(cutoff) = self.clock.now().checked_sub_signed(retention) else {
            return Ok(0);
        };
        let cutoff = cutoff.timestamp_millis();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM sentiment_records WHERE inserted_at_ms < ?1",
            params![cutoff],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    fn query(&self, ticker: &str, window: &TimeWindow) -> Result<Vec<StoredRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT source_id, ticker, ts_ms, polarity, subjectivity, compound, model_weights, components, inserted_at_ms
             FROM sentiment_records
             WHERE ticker = ?1 AND ts_ms >= ?2 AND ts_ms < ?3
             ORDER BY ts_ms ASC, source_id ASC",
        )?;
        let rows = stmt
            .query_map(
                params![
                    ticker,
                    window.start.timestamp_millis(),
                    window.end.timestamp_millis()
                ],
                |r| {
                    Ok(Row {
                        source_id: r.get(0)?,
                        ticker: r.get(1)?,
                        ts_ms: r.get(2)?,
                        polarity: r.get(3)?,
                        subjectivity: r.get(4)?,
                        compound: r.get(5)?,
                        model_weights: r.get(6)?,
                        components: r.get(7)?,
                        inserted_at_ms: r.get(8)?,
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<Row>>>()?;
        rows.into_iter().map(Row::into_record).collect()
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::store::testutil::{record, t};
    use std::sync::Arc;

    #[test]
    fn file_roundtrip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");
        let clock = Arc::new(ManualClock::new(t(12, 0)));
        {
            let s = SqliteStore::open(&path, clock.clone()).unwrap();
            let mut r = record("m1", "TSLA", t(9, 0), -0.25);
            r.sentiment
                .model_weights
                .insert("polarity".to_string(), 0.4);
            r.sentiment
                .components
                .insert("polarity".to_string(), -0.5);
            assert_eq!(s.insert(r).unwrap(), InsertOutcome::Inserted);
        }
        let s = SqliteStore::open(&path, clock).unwrap();
        let w = TimeWindow::new(t(0, 0), t(23, 0)).unwrap();
        let got = s.query("TSLA", &w).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].timestamp, t(9, 0));
        assert_eq!(got[0].sentiment.compound, -0.25);
        assert_eq!(got[0].sentiment.model_weights.get("polarity"), Some(&0.4));
        assert_eq!(got[0].sentiment.components.get("polarity"), Some(&-0.5));
        assert_eq!(got[0].sentiment.components.get("valence"), Some(&-0.25));
    }

    #[test]
    fn ticker_lookup_uses_index_and_ignores_case() {
        let s = SqliteStore::in_memory().unwrap();
        s.insert(record("m1", "TSLA", t(9, 0), 0.3)).unwrap();
        let w = TimeWindow::new(t(0, 0), t(23, 0)).unwrap();
        assert_eq!(s.query("tsla", &w).unwrap().len(), 1);

        let conn = s.conn().unwrap();
        let mut stmt = conn
            .prepare(
                "EXPLAIN QUERY PLAN SELECT source_id FROM sentiment_records
                 WHERE ticker = ?1 AND ts_ms >= ?2 AND ts_ms < ?3",
            )
            .unwrap();
        let plan: Vec<String> = stmt
            .query_map(params!["tsla", 0i64, i64::MAX], |r| r.get::<_, String>(3))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert!(
            plan.iter().any(|d| d.contains("idx_records_ticker_ts")),
            "{plan:?}"
        );
    }

    #[test]
    fn huge_retention_removes_nothing() {
        let s = SqliteStore::open_in_memory(Arc::new(ManualClock::new(t(12, 0)))).unwrap();
        s.insert(record("m1", "SPY", t(9, 0), 0.1)).unwrap();
        let retention = Duration::days(i64::from(u32::MAX));
        assert_eq!(s.cleanup(retention).unwrap(), 0);
        assert_eq!(s.cleanup(Duration::MAX).unwrap(), 0);
    }

    #[test]
    fn journal_mode_is_wal_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let s = SqliteStore::open(dir.path().join("r.db"), clock::system()).unwrap();
        let mode: String = s
            .conn()
            .unwrap()
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn duplicate_is_skipped_without_overwrite() {
        let s = SqliteStore::in_memory().unwrap();
        s.insert(record("m1", "TSLA", t(9, 0), 0.5)).unwrap();
        assert_eq!(
            s.insert(record("m1", "TSLA", t(9, 5), -0.5)).unwrap(),
            InsertOutcome::Skipped
        );
        let w = TimeWindow::new(t(0, 0), t(23, 0)).unwrap();
        let got = s.query("tsla", &w).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].sentiment.compound, 0.5);
    }

    #[test]
    fn query_is_ordered_and_half_open() {
        let s = SqliteStore::in_memory().unwrap();
        for (id, ts) in [("b", t(9, 30)), ("a", t(9, 30)), ("c", t(9, 0)), ("z", t(10, 0))] {
            s.insert(record(id, "SPY", ts, 0.0)).unwrap();
        }
        let w = TimeWindow::new(t(9, 0), t(10, 0)).unwrap();
        let ids: Vec<_> = s
            .query("SPY", &w)
            .unwrap()
            .into_iter()
            .map(|r| r.source_id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn cleanup_uses_inserted_at() {
        let clock = Arc::new(ManualClock::new(t(0, 0)));
        let s = SqliteStore::open_in_memory(clock.clone()).unwrap();
        s.insert(record("old", "QQQ", t(0, 0), 0.1)).unwrap();
        clock.advance(Duration::days(8));
        let mut fresh = record("new", "QQQ", t(0, 0), 0.1);
        fresh.inserted_at = clock.now();
        s.insert(fresh).unwrap();

        assert_eq!(s.cleanup(Duration::days(7)).unwrap(), 1);
        let w = TimeWindow::new(t(0, 0), t(1, 0)).unwrap();
        let left: Vec<_> = s.query("QQQ", &w).unwrap().into_iter().map(|r| r.source_id).collect();
        assert_eq!(left, vec!["new"]);
    }
}
