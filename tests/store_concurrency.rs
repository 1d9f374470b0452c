// tests/store_concurrency.rs
//
// Both backends under concurrent writers: colliding source_ids resolve to
// exactly one Inserted, distinct ids never interfere, and cleanup racing with
// inserts never drops a fresh record or leaves an expired one behind.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ticker_sentiment::analyze::SentimentScore;
use ticker_sentiment::clock::{ManualClock, SharedClock};
use ticker_sentiment::store::{MemoryStore, SqliteStore};
use ticker_sentiment::{InsertOutcome, RecordStore, StoredRecord, TimeWindow};

const WRITERS: usize = 8;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

fn record(id: &str, ticker: &str, inserted_at: DateTime<Utc>, writer: usize) -> StoredRecord {
    StoredRecord {
        source_id: id.to_string(),
        ticker: ticker.to_string(),
        timestamp: now() - Duration::minutes(30),
        sentiment: SentimentScore {
            polarity: 0.1,
            subjectivity: 0.5,
            compound: writer as f64 / 100.0,
            model_weights: BTreeMap::from([("valence".to_string(), 0.6)]),
            components: BTreeMap::from([("valence".to_string(), writer as f64 / 100.0)]),
        },
        inserted_at,
    }
}

fn window() -> TimeWindow {
    TimeWindow::trailing(now(), Duration::hours(1))
}

fn backends(clock: SharedClock) -> Vec<(Arc<dyn RecordStore>, Option<tempfile::TempDir>)> {
    let dir = tempfile::tempdir().unwrap();
    let sqlite: Arc<dyn RecordStore> =
        Arc::new(SqliteStore::open(dir.path().join("c.db"), clock.clone()).unwrap());
    let memory: Arc<dyn RecordStore> = Arc::new(MemoryStore::new(clock));
    vec![(memory, None), (sqlite, Some(dir))]
}

#[test]
fn colliding_inserts_have_exactly_one_winner() {
    let clock: SharedClock = Arc::new(ManualClock::new(now()));
    for (store, _guard) in backends(clock) {
        let outcomes: Vec<Vec<InsertOutcome>> = thread::scope(|s| {
            let handles: Vec<_> = (0..WRITERS)
                .map(|w| {
                    let store = store.clone();
                    s.spawn(move || {
                        (0..50)
                            .map(|i| {
                                store
                                    .insert(record(&format!("shared-{i}"), "TSLA", now(), w))
                                    .unwrap()
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for i in 0..50 {
            let winners = outcomes
                .iter()
                .filter(|o| o[i] == InsertOutcome::Inserted)
                .count();
            assert_eq!(winners, 1, "{} id shared-{i}", store.backend());
        }

        let stored = store.query("TSLA", &window()).unwrap();
        assert_eq!(stored.len(), 50, "{}", store.backend());
        for r in &stored {
            assert!(r.sentiment.compound >= 0.0 && r.sentiment.compound < WRITERS as f64 / 100.0);
            assert_eq!(r.sentiment.model_weights.len(), 1);
        }
    }
}

#[test]
fn distinct_tickers_do_not_interfere() {
    let clock: SharedClock = Arc::new(ManualClock::new(now()));
    for (store, _guard) in backends(clock) {
        thread::scope(|s| {
            for (w, ticker) in ["TSLA", "SPY", "QQQ", "NVDA"].into_iter().enumerate() {
                let store = store.clone();
                s.spawn(move || {
                    for i in 0..25 {
                        let id = format!("{ticker}-{i}");
                        assert_eq!(
                            store.insert(record(&id, ticker, now(), w)).unwrap(),
                            InsertOutcome::Inserted
                        );
                    }
                });
            }
        });
        for t in ["TSLA", "SPY", "QQQ", "NVDA"] {
            assert_eq!(store.query(t, &window()).unwrap().len(), 25, "{}", store.backend());
        }
    }
}

#[test]
fn cleanup_racing_inserts_is_all_or_nothing_per_record() {
    let clock: SharedClock = Arc::new(ManualClock::new(now()));
    for (store, _guard) in backends(clock) {
        let old = now() - Duration::days(40);
        for i in 0..100 {
            store.insert(record(&format!("old-{i}"), "SPY", old, 0)).unwrap();
        }

        let removed = thread::scope(|s| {
            let writers: Vec<_> = (0..4)
                .map(|w| {
                    let store = store.clone();
                    s.spawn(move || {
                        for i in 0..50 {
                            store
                                .insert(record(&format!("new-{w}-{i}"), "SPY", now(), w))
                                .unwrap();
                        }
                    })
                })
                .collect();
            let cleaner = {
                let store = store.clone();
                s.spawn(move || {
                    (0..10)
                        .map(|_| store.cleanup(Duration::days(30)).unwrap())
                        .sum::<usize>()
                })
            };
            for w in writers {
                w.join().unwrap();
            }
            cleaner.join().unwrap()
        });

        assert_eq!(removed, 100, "{}", store.backend());
        let left = store.query("SPY", &window()).unwrap();
        assert_eq!(left.len(), 200, "{}", store.backend());
        assert!(left.iter().all(|r| r.source_id.starts_with("new-")));
    }
}
