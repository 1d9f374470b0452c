// src/ingest/mod.rs
//! Message normalizer: turns scraped text into a clean body, a set of cashtags
//! and a content fingerprint.

pub mod sources;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::ingest::types::{NormalizedMessage, RawMessage};

/// Hard cap on the cleaned body, in chars.
pub const MAX_BODY_CHARS: usize = 1000;

/// Normalize text: decode entities, strip tags and links, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Strip URLs
    static RE_URL: OnceCell<Regex> = OnceCell::new();
    let re_url = RE_URL.get_or_init(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").unwrap());
    out = re_url.replace_all(&out, " ").to_string();

    // 4) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 5) Collapse whitespace (nbsp included, \s is Unicode-aware)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 6) Length cap
    if out.chars().count() > MAX_BODY_CHARS {
        out = out.chars().take(MAX_BODY_CHARS).collect();
    }

    out
}

/// Extract cashtags like `$TSLA` or `$BRK.B`. Returns upper-case symbols without `$`.
/// Pure numbers (`$100`) are not tickers.
pub fn parse_cashtags(input: &str) -> BTreeSet<String> {
    static RE_TAG: OnceCell<Regex> = OnceCell::new();
    let re = RE_TAG.get_or_init(|| {
        Regex::new(r"(?:^|[^A-Za-z0-9_$])\$(?P<tag>[A-Za-z]{1,5}(?:\.[A-Za-z])?)\b").unwrap()
    });
    re.captures_iter(input)
        .filter_map(|c| c.name("tag"))
        .map(|m| m.as_str().to_ascii_uppercase())
        .collect()
}

/// Lower-case, alphanumerics separated by single spaces.
pub fn canonical_form(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn fingerprint(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub fn normalize_ticker(t: &str) -> String {
    t.trim().trim_start_matches('$').to_ascii_uppercase()
}

/// Derive a `NormalizedMessage`. The raw message is cloned, never modified.
pub fn normalize(raw: &RawMessage) -> NormalizedMessage {
    let clean_body = normalize_text(&raw.body);
    let ticker = normalize_ticker(&raw.ticker);

    let mut extracted_tickers = parse_cashtags(&clean_body);
    if !ticker.is_empty() {
        extracted_tickers.insert(ticker.clone());
    }

    let canonical = canonical_form(&clean_body);
    let fingerprint = fingerprint(&canonical);

    NormalizedMessage {
        raw: raw.clone(),
        ticker,
        clean_body,
        extracted_tickers,
        canonical,
        fingerprint,
    }
}
