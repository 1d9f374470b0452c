// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One message as handed over by the scraper. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawMessage {
    pub ticker: String,    // e.g. "TSLA"
    pub author_id: String, // opaque platform user id
    pub body: String,      // raw scraped text (may contain HTML/entities)
    pub timestamp: DateTime<Utc>,
    pub source_id: String, // platform-unique message id
}

/// RawMessage plus the derived, cleaned representation. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub raw: RawMessage,
    /// Upper-cased, trimmed copy of `raw.ticker`.
    pub ticker: String,
    pub clean_body: String,
    pub extracted_tickers: BTreeSet<String>,
    /// Lower-case alphanumeric form used for fingerprinting and fuzzy matching.
    pub canonical: String,
    /// Hex SHA-256 of `canonical`.
    pub fingerprint: String,
}

impl NormalizedMessage {
    pub fn source_id(&self) -> &str {
        &self.raw.source_id
    }

    pub fn author_id(&self) -> &str {
        &self.raw.author_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.raw.timestamp
    }

    /// First 12 hex chars of the fingerprint; safe to log.
    pub fn short_id(&self) -> &str {
        &self.fingerprint[..self.fingerprint.len().min(12)]
    }
}

/// Scraper collaborator: one call = one scrape cycle for one ticker.
/// The core never retries a failed fetch.
#[async_trait::async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch(&self, ticker: &str) -> Result<Vec<RawMessage>>;
    fn name(&self) -> &'static str;
}
