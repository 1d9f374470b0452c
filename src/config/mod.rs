// src/config/mod.rs
//! Application configuration: one TOML file plus a few env overrides.
//!
//! Lookup: `$SENTIMENT_CONFIG_PATH`, else `config/sentiment.toml`, else built-in
//! defaults. Every table is optional and every field has a default, so a config
//! file only needs the values it changes.

use anyhow::{anyhow, Context};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::analyze::{builtin_models, AntiSpamParams, ModelWeights};
use crate::error::{PipelineError, Result};
use crate::ingest::normalize_ticker;
use crate::report::{DEFAULT_BEARISH_THRESHOLD, DEFAULT_BULLISH_THRESHOLD};

pub const DEFAULT_CONFIG_PATH: &str = "config/sentiment.toml";

/// A century; anything longer is a typo.
pub const MAX_RETENTION_DAYS: u32 = 36_500;

pub const ENV_CONFIG_PATH: &str = "SENTIMENT_CONFIG_PATH";
pub const ENV_RETENTION_DAYS: &str = "SENTIMENT_RETENTION_DAYS";
pub const ENV_BULLISH_THRESHOLD: &str = "SENTIMENT_BULLISH_THRESHOLD";
pub const ENV_WEBHOOK_URL: &str = "SENTIMENT_WEBHOOK_URL";
pub const ENV_BIND: &str = "SENTIMENT_BIND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tickers: Vec<String>,
    pub spam: AntiSpamParams,
    pub scorer: ScorerConfig,
    pub store: StoreConfig,
    pub report: ReportConfig,
    pub server: ServerConfig,
    pub notify: NotifyConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tickers: vec!["TSLA".into(), "SPY".into(), "QQQ".into()],
            spam: AntiSpamParams::default(),
            scorer: ScorerConfig::default(),
            store: StoreConfig::default(),
            report: ReportConfig::default(),
            server: ServerConfig::default(),
            notify: NotifyConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub weights: ModelWeights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    pub retention_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from("data/sentiment.db"),
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub bullish_threshold: f64,
    pub bearish_threshold: f64,
    pub default_window_hours: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            bullish_threshold: DEFAULT_BULLISH_THRESHOLD,
            bearish_threshold: DEFAULT_BEARISH_THRESHOLD,
            default_window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u8,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 5,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "ticker_sentiment=info,pipeline=info,store=info,spam=info,notify=info,warn"
                .into(),
            json: false,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: Option<String>) -> anyhow::Result<Option<T>> {
    match raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("{name}={s:?} is not a valid value")),
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Resolve the file, apply env overrides, validate.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!(
                        "{ENV_CONFIG_PATH} points to non-existent path {}",
                        pb.display()
                    ));
                }
                Self::load_from(&pb)?
            }
            Err(_) => {
                let pb = PathBuf::from(DEFAULT_CONFIG_PATH);
                if pb.exists() {
                    Self::load_from(&pb)?
                } else {
                    tracing::info!(path = DEFAULT_CONFIG_PATH, "no config file, using defaults");
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Some(d) = parse_env::<u32>(ENV_RETENTION_DAYS, std::env::var(ENV_RETENTION_DAYS).ok())? {
            self.store.retention_days = d;
        }
        if let Some(t) =
            parse_env::<f64>(ENV_BULLISH_THRESHOLD, std::env::var(ENV_BULLISH_THRESHOLD).ok())?
        {
            self.report.bullish_threshold = t;
        }
        if let Some(url) = parse_env::<String>(ENV_WEBHOOK_URL, std::env::var(ENV_WEBHOOK_URL).ok())? {
            self.notify.webhook_url = Some(url);
        }
        if let Some(bind) = parse_env::<String>(ENV_BIND, std::env::var(ENV_BIND).ok())? {
            self.server.bind = bind;
        }
        Ok(())
    }

    /// Fail-fast checks. Also normalizes and dedups the ticker list.
    pub fn validate(&mut self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        let tickers: Vec<String> = self
            .tickers
            .iter()
            .map(|t| normalize_ticker(t))
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();
        if tickers.is_empty() {
            return Err(PipelineError::config("no tickers configured"));
        }
        self.tickers = tickers;

        let names: Vec<String> = builtin_models().iter().map(|m| m.name().to_string()).collect();
        let known: Vec<&str> = names.iter().map(String::as_str).collect();
        self.scorer.weights.validate(&known)?;

        if !(1..=MAX_RETENTION_DAYS).contains(&self.store.retention_days) {
            return Err(PipelineError::config(format!(
                "store.retention_days must be within 1..={MAX_RETENTION_DAYS}, got {}",
                self.store.retention_days
            )));
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.path.as_os_str().is_empty() {
            return Err(PipelineError::config("store.path is required for the sqlite backend"));
        }

        let r = &self.report;
        if !r.bullish_threshold.is_finite()
            || !r.bearish_threshold.is_finite()
            || r.bearish_threshold > r.bullish_threshold
        {
            return Err(PipelineError::config(format!(
                "report thresholds invalid: bullish={} bearish={}",
                r.bullish_threshold, r.bearish_threshold
            )));
        }
        if r.default_window_hours == 0 {
            return Err(PipelineError::config("report.default_window_hours must be at least 1"));
        }

        self.server
            .bind
            .parse::<SocketAddr>()
            .map_err(|e| PipelineError::config(format!("server.bind {:?}: {e}", self.server.bind)))?;

        if self.notify.timeout_secs == 0 {
            return Err(PipelineError::config("notify.timeout_secs must be at least 1"));
        }
        if let Some(url) = &self.notify.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(PipelineError::config("notify.webhook_url must be an http(s) URL"));
            }
        }
        Ok(())
    }

    pub fn retention(&self) -> Duration {
        Duration::days(i64::from(self.store.retention_days))
    }

    pub fn default_window(&self) -> Duration {
        Duration::hours(i64::from(self.report.default_window_hours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let mut cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        cfg.validate().unwrap();
        assert_eq!(cfg.retention(), Duration::days(30));
    }

    #[test]
    fn partial_tables_merge_with_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            tickers = ["$tsla", "spy"]
            [spam]
            repetition_threshold = 5
            [scorer.weights]
            valence = 1.0
            finance = 1.0
            [store]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.spam.repetition_threshold, 5);
        assert_eq!(cfg.spam.similarity_threshold, 0.85);
        assert_eq!(cfg.scorer.weights.get("finance"), Some(1.0));
        assert_eq!(cfg.scorer.weights.get("polarity"), None);
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.store.retention_days, 30);

        let mut cfg = cfg;
        cfg.validate().unwrap();
        assert_eq!(cfg.tickers, vec!["TSLA", "SPY"]);
    }

    #[test]
    fn zero_sum_weights_fail_validation() {
        let mut cfg = AppConfig::from_toml_str(
            "[scorer.weights]\nvalence = 0.0\npolarity = 0.0\n",
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn bad_scalars_fail_validation() {
        let mut cfg = AppConfig::default();
        cfg.report.bearish_threshold = 0.5;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.server.bind = "localhost".into();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.store.retention_days = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.store.retention_days = 200_000_000;
        assert!(cfg.validate().is_err());
        cfg.store.retention_days = MAX_RETENTION_DAYS;
        assert!(cfg.validate().is_ok());

        let mut cfg = AppConfig::default();
        cfg.notify.timeout_secs = 0;
        assert!(matches!(cfg.validate(), Err(PipelineError::Configuration(_))));

        let mut cfg = AppConfig::default();
        cfg.tickers = vec!["  ".into()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_env_rejects_garbage_and_ignores_blank() {
        assert_eq!(parse_env::<u32>("X", Some(" 7 ".into())).unwrap(), Some(7));
        assert_eq!(parse_env::<u32>("X", Some("".into())).unwrap(), None);
        assert!(parse_env::<u32>("X", Some("seven".into())).is_err());
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        assert!(AppConfig::from_toml_str("[store]\nbackend = \"redis\"\n").is_err());
    }
}
