//! Daily-reset spam filter.
//!
//! Three independent rules, checked in this order:
//! - keyword noise list (whole-phrase match on the canonical body)
//! - repetition: a fingerprint (or a near-duplicate cluster) seen more than
//!   `repetition_threshold` times since the last UTC midnight
//! - source heuristic: blocked authors and author volume, plus content-shape
//!   signals that mark bot output (cashtag stuffing, shouting); one reason
//!   covers both
//!
//! A `source_id` already classified today gets its earlier verdict back and
//! leaves every counter alone, so overlapping scrapes do not inflate repetition
//! or author volume.
//!
//! All counters live in an explicit `DailyState` that the caller owns. The state
//! rolls over when the injected clock crosses a UTC day boundary, or on `reset()`.
//!
//! Near-duplicate similarity: normalized Levenshtein (`strsim`) over canonical bodies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::clock::SharedClock;
use crate::ingest::canonical_form;
use crate::ingest::types::NormalizedMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpamReason {
    Keyword,
    Repetition,
    SourceHeuristic,
}

impl SpamReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpamReason::Keyword => "keyword",
            SpamReason::Repetition => "repetition",
            SpamReason::SourceHeuristic => "source_heuristic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpamVerdict {
    pub is_spam: bool,
    pub reason: Option<SpamReason>,
}

impl SpamVerdict {
    pub fn clean() -> Self {
        Self {
            is_spam: false,
            reason: None,
        }
    }

    pub fn spam(reason: SpamReason) -> Self {
        Self {
            is_spam: true,
            reason: Some(reason),
        }
    }
}

/// Tunables. Every field has a default so a partial `[spam]` table works.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiSpamParams {
    /// Noise phrases; matched case- and punctuation-insensitively on word boundaries.
    pub keywords: Vec<String>,
    /// Occurrences allowed per day; the next one is spam.
    pub repetition_threshold: u32,
    /// Near-duplicate similarity in [0.0, 1.0].
    pub similarity_threshold: f64,
    /// Bodies shorter than this (canonical chars) skip near-duplicate matching.
    pub fuzzy_min_chars: usize,
    /// How many recent distinct bodies are kept for near-duplicate matching.
    pub fuzzy_window: usize,
    /// Upper bound on tracked fingerprints / authors / source ids per day.
    pub max_tracked: usize,
    /// Source heuristic score above this is spam.
    pub source_heuristic_threshold: f64,
    /// Cashtag count that maps to a stuffing score of 1.0.
    pub max_cashtags: usize,
    /// Messages per author per day that map to a volume score of 1.0.
    pub author_daily_cap: u32,
    /// Minimum letters before the upper-case ratio counts as shouting.
    pub shouting_min_letters: usize,
    pub blocked_authors: Vec<String>,
}

impl Default for AntiSpamParams {
    fn default() -> Self {
        Self {
            keywords: vec![
                "join my discord".into(),
                "free signals".into(),
                "dm me".into(),
                "guaranteed returns".into(),
                "promo code".into(),
            ],
            repetition_threshold: 3,
            similarity_threshold: 0.85,
            fuzzy_min_chars: 5,
            fuzzy_window: 100,
            max_tracked: 10_000,
            source_heuristic_threshold: 0.8,
            max_cashtags: 5,
            author_daily_cap: 50,
            shouting_min_letters: 20,
            blocked_authors: Vec::new(),
        }
    }
}

impl AntiSpamParams {
    /// Basic parameter hygiene; keeps the filter usable with odd configs.
    fn sanitized(mut self) -> Self {
        self.repetition_threshold = self.repetition_threshold.max(1);
        self.similarity_threshold = self.similarity_threshold.clamp(0.0, 1.0);
        self.fuzzy_window = self.fuzzy_window.max(1);
        self.max_tracked = self.max_tracked.max(1);
        self.source_heuristic_threshold = self.source_heuristic_threshold.clamp(0.0, 1.0);
        self.max_cashtags = self.max_cashtags.max(1);
        self.author_daily_cap = self.author_daily_cap.max(1);
        self
    }
}

#[derive(Debug, Clone)]
struct RecentBody {
    canonical: String,
    hits: u32,
}

/// Per-day tracking state. Owned by the caller; share it behind a mutex when
/// several pipelines run at once.
#[derive(Debug, Default)]
pub struct DailyState {
    day: Option<NaiveDate>,
    counts: HashMap<String, u32>,
    order: VecDeque<String>,
    authors: HashMap<String, u32>,
    recent: VecDeque<RecentBody>,
    seen: HashMap<String, SpamVerdict>,
    seen_order: VecDeque<String>,
}

impl DailyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything seen so far.
    pub fn reset(&mut self) {
        self.counts.clear();
        self.order.clear();
        self.authors.clear();
        self.recent.clear();
        self.seen.clear();
        self.seen_order.clear();
    }

    pub fn day(&self) -> Option<NaiveDate> {
        self.day
    }

    pub fn count_for(&self, fingerprint: &str) -> u32 {
        self.counts.get(fingerprint).copied().unwrap_or(0)
    }

    pub fn tracked_fingerprints(&self) -> usize {
        self.counts.len()
    }

    pub fn tracked_messages(&self) -> usize {
        self.seen.len()
    }

    fn remember(&mut self, source_id: &str, verdict: SpamVerdict, max_tracked: usize) {
        if source_id.is_empty() || self.seen.contains_key(source_id) {
            return;
        }
        while self.seen.len() >= max_tracked {
            match self.seen_order.pop_front() {
                Some(old) => {
                    self.seen.remove(&old);
                }
                None => break,
            }
        }
        self.seen.insert(source_id.to_string(), verdict);
        self.seen_order.push_back(source_id.to_string());
    }

    /// Returns true when the state was cleared for a new day.
    fn roll_to(&mut self, today: NaiveDate) -> bool {
        match self.day {
            Some(d) if d == today => false,
            Some(_) => {
                self.reset();
                self.day = Some(today);
                true
            }
            None => {
                self.day = Some(today);
                false
            }
        }
    }

    fn bump_fingerprint(&mut self, fp: &str, max_tracked: usize) -> u32 {
        if let Some(c) = self.counts.get_mut(fp) {
            *c = c.saturating_add(1);
            return *c;
        }
        while self.counts.len() >= max_tracked {
            match self.order.pop_front() {
                Some(old) => {
                    self.counts.remove(&old);
                }
                None => break,
            }
        }
        self.counts.insert(fp.to_string(), 1);
        self.order.push_back(fp.to_string());
        1
    }

    fn bump_author(&mut self, author: &str, max_tracked: usize) -> u32 {
        if let Some(c) = self.authors.get_mut(author) {
            *c = c.saturating_add(1);
            return *c;
        }
        if self.authors.len() < max_tracked {
            self.authors.insert(author.to_string(), 1);
        }
        1
    }

    /// Bump the best-matching recent cluster (or open a new one) and return its hits.
    fn bump_cluster(&mut self, canonical: &str, similarity: f64, window: usize) -> u32 {
        let mut best: Option<(usize, f64)> = None;
        for (i, r) in self.recent.iter().enumerate() {
            let sim = if r.canonical == canonical {
                1.0
            } else {
                strsim::normalized_levenshtein(canonical, &r.canonical)
            };
            if sim >= similarity && best.map_or(true, |(_, b)| sim > b) {
                best = Some((i, sim));
            }
        }

        if let Some((i, _)) = best {
            let r = &mut self.recent[i];
            r.hits = r.hits.saturating_add(1);
            return r.hits;
        }

        if self.recent.len() >= window {
            self.recent.pop_front();
        }
        self.recent.push_back(RecentBody {
            canonical: canonical.to_string(),
            hits: 1,
        });
        1
    }
}

pub struct SpamFilter {
    params: AntiSpamParams,
    keywords: Vec<String>,
    blocked: HashSet<String>,
    clock: SharedClock,
}

impl std::fmt::Debug for SpamFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpamFilter")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl SpamFilter {
    pub fn new(params: AntiSpamParams, clock: SharedClock) -> Self {
        let params = params.sanitized();
        let keywords = params
            .keywords
            .iter()
            .map(|k| canonical_form(k))
            .filter(|k| !k.is_empty())
            .collect();
        let blocked = params
            .blocked_authors
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        Self {
            params,
            keywords,
            blocked,
            clock,
        }
    }

    pub fn params(&self) -> &AntiSpamParams {
        &self.params
    }

    /// Classify one message and record it in `state`.
    ///
    /// Counters are bumped once per `source_id`, spam or not. A message with
    /// nothing left after normalization is passed through untouched.
    pub fn classify(&self, msg: &NormalizedMessage, state: &mut DailyState) -> SpamVerdict {
        let today = self.clock.now().date_naive();
        if state.roll_to(today) {
            tracing::info!(target: "spam", %today, "daily spam state reset");
        }

        let source_id = msg.source_id().trim();
        if let Some(earlier) = state.seen.get(source_id) {
            return *earlier;
        }

        if msg.canonical.is_empty() {
            return SpamVerdict::clean();
        }

        let p = &self.params;
        let fp_count = state.bump_fingerprint(&msg.fingerprint, p.max_tracked);
        let cluster_hits = if msg.canonical.chars().count() >= p.fuzzy_min_chars {
            state.bump_cluster(&msg.canonical, p.similarity_threshold, p.fuzzy_window)
        } else {
            0
        };
        let author_count = state.bump_author(msg.author_id(), p.max_tracked);

        let verdict = if self.matches_keyword(&msg.canonical) {
            SpamVerdict::spam(SpamReason::Keyword)
        } else if fp_count.max(cluster_hits) > p.repetition_threshold {
            SpamVerdict::spam(SpamReason::Repetition)
        } else if self.source_score(msg, author_count) > p.source_heuristic_threshold {
            SpamVerdict::spam(SpamReason::SourceHeuristic)
        } else {
            SpamVerdict::clean()
        };

        if let Some(reason) = verdict.reason {
            tracing::debug!(
                target: "spam",
                id = msg.short_id(),
                reason = reason.as_str(),
                fp_count,
                cluster_hits,
                "message flagged"
            );
        }
        state.remember(source_id, verdict, p.max_tracked);
        verdict
    }

    fn matches_keyword(&self, canonical: &str) -> bool {
        let padded = format!(" {canonical} ");
        self.keywords
            .iter()
            .any(|k| padded.contains(&format!(" {k} ")))
    }

    /// Heuristic in [0,1]: max of stuffing, shouting and author-volume ratios.
    /// Stuffing and shouting look at the body; they stand in for bot-like sources.
    pub fn source_score(&self, msg: &NormalizedMessage, author_count_today: u32) -> f64 {
        let p = &self.params;
        if self.blocked.contains(msg.author_id().trim()) {
            return 1.0;
        }

        let stuffing = msg.extracted_tickers.len() as f64 / p.max_cashtags as f64;

        let (letters, upper) = msg
            .clean_body
            .chars()
            .filter(|c| c.is_alphabetic())
            .fold((0usize, 0usize), |(l, u), c| {
                (l + 1, u + usize::from(c.is_uppercase()))
            });
        let shouting = if letters >= p.shouting_min_letters {
            upper as f64 / letters as f64
        } else {
            0.0
        };

        let volume = author_count_today as f64 / p.author_daily_cap as f64;

        stuffing.max(shouting).max(volume).clamp(0.0, 1.0)
    }
}
