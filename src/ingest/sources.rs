// src/ingest/sources.rs
//! Message sources that stand in for the live scraper: in-memory fixtures and
//! newline-delimited JSON dumps.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::ingest::normalize_ticker;
use crate::ingest::types::{MessageSource, RawMessage};

/// Fixed set of messages; `fetch` returns the ones for the requested ticker.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    messages: Vec<RawMessage>,
}

impl StaticSource {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self { messages }
    }

    /// Parse a JSON array of messages (fixture files, request bodies).
    pub fn from_json(json: &str) -> Result<Self> {
        let messages: Vec<RawMessage> =
            serde_json::from_str(json).context("parsing message fixture")?;
        Ok(Self::new(messages))
    }
}

#[async_trait::async_trait]
impl MessageSource for StaticSource {
    async fn fetch(&self, ticker: &str) -> Result<Vec<RawMessage>> {
        Ok(select_ticker(self.messages.iter().cloned(), ticker))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Reads one JSON `RawMessage` per line. Blank lines and `#` comments are skipped;
/// a malformed line fails the whole fetch with its line number.
#[derive(Debug, Clone)]
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

pub fn parse_jsonl(content: &str) -> Result<Vec<RawMessage>> {
    let mut out = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let msg: RawMessage = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid message JSON", i + 1))?;
        out.push(msg);
    }
    Ok(out)
}

#[async_trait::async_trait]
impl MessageSource for JsonlSource {
    async fn fetch(&self, ticker: &str) -> Result<Vec<RawMessage>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let all = parse_jsonl(&content)?;
        Ok(select_ticker(all, ticker))
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

fn select_ticker<I>(messages: I, ticker: &str) -> Vec<RawMessage>
where
    I: IntoIterator<Item = RawMessage>,
{
    let want = normalize_ticker(ticker);
    messages
        .into_iter()
        .filter(|m| normalize_ticker(&m.ticker) == want)
        .collect()
}
