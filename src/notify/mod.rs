// src/notify/mod.rs
//! Downstream delivery of market reports. Formatting for a specific chat
//! platform is the receiver's job; notifiers hand over the report as-is.

pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;

use crate::report::MarketReport;

pub use webhook::WebhookNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, report: &MarketReport) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Writes a one-line digest per ticker to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, report: &MarketReport) -> Result<()> {
        for s in &report.tickers {
            tracing::info!(
                target: "notify",
                ticker = %s.ticker,
                messages = s.message_count,
                mean_compound = s.mean_compound,
                bullish_ratio = s.bullish_ratio,
                category = ?s.category,
                "ticker summary"
            );
        }
        tracing::info!(
            target: "notify",
            overall = ?report.overall,
            bullish = report.bullish_tickers,
            bearish = report.bearish_tickers,
            "market summary"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Fan out to every notifier; failures are logged and do not stop the others.
/// Returns how many deliveries succeeded.
pub async fn notify_all(notifiers: &[Box<dyn Notifier>], report: &MarketReport) -> usize {
    let mut ok = 0;
    for n in notifiers {
        match n.notify(report).await {
            Ok(()) => ok += 1,
            Err(e) => tracing::warn!(target: "notify", notifier = n.name(), error = ?e, "delivery failed"),
        }
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Category;
    use chrono::{TimeZone, Utc};

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn notify(&self, _report: &MarketReport) -> Result<()> {
            anyhow::bail!("unreachable receiver")
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let t = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        let report = MarketReport {
            window_start: t,
            window_end: t,
            tickers: vec![],
            bullish_tickers: 0,
            bearish_tickers: 0,
            total_messages: 0,
            overall: Category::Neutral,
        };
        let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(Failing), Box::new(LogNotifier)];
        assert_eq!(notify_all(&notifiers, &report).await, 1);
    }
}
