//! Replays a newline-delimited JSON dump of scraped messages through the
//! pipeline and prints the cycle reports plus a market summary.
//!
//! Usage: replay <messages.jsonl> [--tickers TSLA,SPY] [--hours N] [--notify]
//!
//! The summary window ends just after the newest message in the dump, so old
//! captures still produce a meaningful report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::Duration;
use ticker_sentiment::ingest::sources::{parse_jsonl, JsonlSource};
use ticker_sentiment::ingest::types::MessageSource;
use ticker_sentiment::{app, clock, notify, AppConfig, TimeWindow};

struct Args {
    path: PathBuf,
    tickers: Option<Vec<String>>,
    hours: Option<u32>,
    notify: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut it = std::env::args().skip(1);
    let mut path = None;
    let mut tickers = None;
    let mut hours = None;
    let mut notify = false;
    while let Some(a) = it.next() {
        match a.as_str() {
            "--tickers" => {
                let v = it.next().ok_or_else(|| anyhow!("--tickers needs a value"))?;
                tickers = Some(v.split(',').map(|s| s.trim().to_string()).collect());
            }
            "--hours" => {
                let v = it.next().ok_or_else(|| anyhow!("--hours needs a value"))?;
                hours = Some(v.parse().with_context(|| format!("--hours {v:?}"))?);
            }
            "--notify" => notify = true,
            s if s.starts_with("--") => bail!("unknown flag {s}"),
            _ => path = Some(PathBuf::from(a)),
        }
    }
    let path = path.ok_or_else(|| {
        anyhow!("usage: replay <messages.jsonl> [--tickers TSLA,SPY] [--hours N] [--notify]")
    })?;
    Ok(Args {
        path,
        tickers,
        hours,
        notify,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = parse_args()?;

    let mut cfg = AppConfig::load().context("loading configuration")?;
    if let Some(t) = args.tickers {
        cfg.tickers = t;
        cfg.validate()?;
    }
    app::init_tracing(&cfg.log);

    let content = tokio::fs::read_to_string(&args.path)
        .await
        .with_context(|| format!("reading {}", args.path.display()))?;
    let newest = parse_jsonl(&content)?
        .iter()
        .map(|m| m.timestamp)
        .max()
        .ok_or_else(|| anyhow!("{} has no messages", args.path.display()))?;

    let clock = clock::system();
    let store = app::build_store(&cfg, clock.clone())?;
    let pipeline = Arc::new(app::build_pipeline(&cfg, store.clone(), clock)?);
    let source: Arc<dyn MessageSource> = Arc::new(JsonlSource::new(&args.path));

    let reports = pipeline.run_tickers(source, &cfg.tickers).await;
    println!("{}", serde_json::to_string_pretty(&reports)?);

    let span = args
        .hours
        .map(|h| Duration::hours(i64::from(h)))
        .unwrap_or_else(|| cfg.default_window());
    let window = TimeWindow::trailing(newest + Duration::seconds(1), span);
    let market = app::build_reporter(&cfg, store)?.market(cfg.tickers.as_slice(), &window)?;
    println!("{}", serde_json::to_string_pretty(&market)?);

    if args.notify {
        let notifiers = app::build_notifiers(&cfg);
        let ok = notify::notify_all(&notifiers, &market).await;
        tracing::info!(delivered = ok, total = notifiers.len(), "notifications sent");
    }
    Ok(())
}
