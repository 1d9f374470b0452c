// src/notify/webhook.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::Notifier;
use crate::report::MarketReport;

/// POSTs the report as JSON. Retries non-2xx and transport errors with
/// 500ms, 1s, 2s, ... backoff until `max_retries` attempts are used.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn backoff(attempt: u8) {
        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1).min(6))).await;
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, report: &MarketReport) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.url)
                .timeout(self.timeout)
                .json(report)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            Self::backoff(attempt).await;
                            continue;
                        }
                        return Err(anyhow!("webhook HTTP error: {e}"));
                    }
                    tracing::debug!(target: "notify", attempt, "webhook delivered");
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        Self::backoff(attempt).await;
                        continue;
                    }
                    return Err(anyhow!("webhook request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Category;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn report() -> MarketReport {
        let t = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        MarketReport {
            window_start: t,
            window_end: t,
            tickers: vec![],
            bullish_tickers: 0,
            bearish_tickers: 0,
            total_messages: 7,
            overall: Category::Bearish,
        }
    }

    /// Local receiver that fails the first `fail_first` requests with 503.
    async fn receiver(fail_first: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let app = Router::new().route(
            "/hook",
            post(move |Json(body): Json<serde_json::Value>| {
                let h = h.clone();
                async move {
                    let n = h.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(body["total_messages"], 7);
                    if n < fail_first {
                        StatusCode::SERVICE_UNAVAILABLE
                    } else {
                        StatusCode::NO_CONTENT
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/hook"), hits)
    }

    #[tokio::test]
    async fn retries_until_success() {
        let (url, hits) = receiver(1).await;
        WebhookNotifier::new(url).notify(&report()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let (url, hits) = receiver(usize::MAX).await;
        let err = WebhookNotifier::new(url)
            .with_retries(2)
            .notify(&report())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP error"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
