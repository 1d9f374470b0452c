// src/report.rs
//! Per-ticker and market-wide rollups over stored records. Read-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::store::{RecordStore, TimeWindow};

pub const DEFAULT_BULLISH_THRESHOLD: f64 = 0.05;
pub const DEFAULT_BEARISH_THRESHOLD: f64 = -0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bullish,
    Bearish,
    Neutral,
}

impl Category {
    pub fn from_compound(c: f64, bullish: f64, bearish: f64) -> Self {
        if c > bullish {
            Category::Bullish
        } else if c < bearish {
            Category::Bearish
        } else {
            Category::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSummary {
    pub ticker: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub mean_compound: f64,
    pub message_count: usize,
    pub bullish_ratio: f64,
    pub bearish_ratio: f64,
    pub neutral_ratio: f64,
    pub mean_polarity: f64,
    pub mean_subjectivity: f64,
    /// Per-model mean compound, over the records that model contributed to.
    pub mean_by_model: BTreeMap<String, f64>,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub tickers: Vec<TickerSummary>,
    pub bullish_tickers: usize,
    pub bearish_tickers: usize,
    pub total_messages: usize,
    pub overall: Category,
}

#[derive(Clone)]
pub struct Reporter {
    store: Arc<dyn RecordStore>,
    bullish_threshold: f64,
    bearish_threshold: f64,
}

impl Reporter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            bullish_threshold: DEFAULT_BULLISH_THRESHOLD,
            bearish_threshold: DEFAULT_BEARISH_THRESHOLD,
        }
    }

    /// Thresholds must be finite with `bearish <= bullish`.
    pub fn with_thresholds(mut self, bullish: f64, bearish: f64) -> Result<Self> {
        if !bullish.is_finite() || !bearish.is_finite() || bearish > bullish {
            return Err(PipelineError::config(format!(
                "invalid thresholds: bullish={bullish} bearish={bearish}"
            )));
        }
        self.bullish_threshold = bullish;
        self.bearish_threshold = bearish;
        Ok(self)
    }

    pub fn bullish_threshold(&self) -> f64 {
        self.bullish_threshold
    }

    pub fn summarize(&self, ticker: &str, window: &TimeWindow) -> Result<TickerSummary> {
        let records = self.store.query(ticker, window)?;
        let n = records.len();
        let mut summary = TickerSummary {
            ticker: ticker.to_ascii_uppercase(),
            window_start: window.start,
            window_end: window.end,
            mean_compound: 0.0,
            message_count: n,
            bullish_ratio: 0.0,
            bearish_ratio: 0.0,
            neutral_ratio: 0.0,
            mean_polarity: 0.0,
            mean_subjectivity: 0.0,
            mean_by_model: BTreeMap::new(),
            category: Category::Neutral,
        };
        if n == 0 {
            return Ok(summary);
        }

        let (mut comp, mut pol, mut subj) = (0.0f64, 0.0f64, 0.0f64);
        let (mut bull, mut bear) = (0usize, 0usize);
        let mut by_model: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for r in &records {
            let s = &r.sentiment;
            for (name, c) in &s.components {
                let e = by_model.entry(name.as_str()).or_insert((0.0, 0));
                e.0 += c;
                e.1 += 1;
            }
            comp += s.compound;
            pol += s.polarity;
            subj += s.subjectivity;
            if s.compound > self.bullish_threshold {
                bull += 1;
            } else if s.compound < self.bearish_threshold {
                bear += 1;
            }
        }
        let nf = n as f64;
        summary.mean_compound = comp / nf;
        summary.mean_polarity = pol / nf;
        summary.mean_subjectivity = subj / nf;
        summary.bullish_ratio = bull as f64 / nf;
        summary.bearish_ratio = bear as f64 / nf;
        summary.neutral_ratio = (n - bull - bear) as f64 / nf;
        summary.mean_by_model = by_model
            .into_iter()
            .map(|(name, (sum, k))| (name.to_string(), sum / k as f64))
            .collect();
        summary.category = Category::from_compound(
            summary.mean_compound,
            self.bullish_threshold,
            self.bearish_threshold,
        );
        Ok(summary)
    }

    /// Summaries for every ticker plus an overall call: bullish when more tickers
    /// lean bullish than bearish, bearish for the reverse, neutral on a tie.
    pub fn market<S: AsRef<str>>(&self, tickers: &[S], window: &TimeWindow) -> Result<MarketReport> {
        let summaries = tickers
            .iter()
            .map(|t| self.summarize(t.as_ref(), window))
            .collect::<Result<Vec<_>>>()?;
        let bullish = summaries
            .iter()
            .filter(|s| s.category == Category::Bullish)
            .count();
        let bearish = summaries
            .iter()
            .filter(|s| s.category == Category::Bearish)
            .count();
        let overall = match bullish.cmp(&bearish) {
            std::cmp::Ordering::Greater => Category::Bullish,
            std::cmp::Ordering::Less => Category::Bearish,
            std::cmp::Ordering::Equal => Category::Neutral,
        };
        Ok(MarketReport {
            window_start: window.start,
            window_end: window.end,
            total_messages: summaries.iter().map(|s| s.message_count).sum(),
            tickers: summaries,
            bullish_tickers: bullish,
            bearish_tickers: bearish,
            overall,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil::{record, t};
    use crate::store::MemoryStore;

    fn reporter_with(records: &[(&str, &str, f64)]) -> Reporter {
        let store = Arc::new(MemoryStore::default());
        for (i, (id, ticker, c)) in records.iter().enumerate() {
            store
                .insert(record(id, ticker, t(9, i as u32), *c))
                .unwrap();
        }
        Reporter::new(store)
    }

    fn morning() -> TimeWindow {
        TimeWindow::new(t(8, 0), t(12, 0)).unwrap()
    }

    #[test]
    fn empty_window_is_all_zero() {
        let r = reporter_with(&[]);
        let s = r.summarize("TSLA", &morning()).unwrap();
        assert_eq!(s.message_count, 0);
        assert_eq!(s.mean_compound, 0.0);
        assert_eq!(s.bullish_ratio, 0.0);
        assert_eq!(s.category, Category::Neutral);
    }

    #[test]
    fn mean_and_ratios() {
        let r = reporter_with(&[
            ("1", "TSLA", 0.6),
            ("2", "TSLA", 0.05), // not above the threshold
            ("3", "TSLA", -0.4),
            ("4", "TSLA", 0.3),
            ("5", "SPY", -0.9),
        ]);
        let s = r.summarize("TSLA", &morning()).unwrap();
        assert_eq!(s.message_count, 4);
        assert!((s.mean_compound - 0.1375).abs() < 1e-12);
        assert!((s.bullish_ratio - 0.5).abs() < 1e-12);
        assert!((s.bearish_ratio - 0.25).abs() < 1e-12);
        assert!((s.neutral_ratio - 0.25).abs() < 1e-12);
        assert_eq!(s.category, Category::Bullish);
    }

    #[test]
    fn per_model_means_cover_only_contributing_records() {
        let store = Arc::new(MemoryStore::default());
        let mut a = record("1", "TSLA", t(9, 0), 0.4);
        a.sentiment.components = BTreeMap::from([("valence".into(), 0.6), ("polarity".into(), 0.1)]);
        let mut b = record("2", "TSLA", t(9, 5), -0.2);
        // polarity was down for this one
        b.sentiment.components = BTreeMap::from([("valence".into(), -0.2)]);
        store.insert(a).unwrap();
        store.insert(b).unwrap();

        let s = Reporter::new(store).summarize("TSLA", &morning()).unwrap();
        assert!((s.mean_by_model["valence"] - 0.2).abs() < 1e-12);
        assert!((s.mean_by_model["polarity"] - 0.1).abs() < 1e-12);
        assert_eq!(s.mean_by_model.len(), 2);
        assert!(reporter_with(&[])
            .summarize("TSLA", &morning())
            .unwrap()
            .mean_by_model
            .is_empty());
    }

    #[test]
    fn custom_threshold_changes_ratio() {
        let r = reporter_with(&[("1", "QQQ", 0.2), ("2", "QQQ", 0.4)])
            .with_thresholds(0.3, -0.3)
            .unwrap();
        let s = r.summarize("QQQ", &morning()).unwrap();
        assert!((s.bullish_ratio - 0.5).abs() < 1e-12);
        assert!(Reporter::new(Arc::new(MemoryStore::default()))
            .with_thresholds(-0.1, 0.1)
            .is_err());
    }

    #[test]
    fn market_overall_by_ticker_counts() {
        let r = reporter_with(&[
            ("1", "TSLA", 0.5),
            ("2", "SPY", 0.4),
            ("3", "QQQ", -0.6),
        ]);
        let m = r.market(&["TSLA", "SPY", "QQQ"], &morning()).unwrap();
        assert_eq!(m.bullish_tickers, 2);
        assert_eq!(m.bearish_tickers, 1);
        assert_eq!(m.total_messages, 3);
        assert_eq!(m.overall, Category::Bullish);

        let tie = r.market(&["TSLA", "QQQ"], &morning()).unwrap();
        assert_eq!(tie.overall, Category::Neutral);
    }
}
