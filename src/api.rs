// src/api.rs
//! HTTP surface: summaries for the notifier side, a push-style ingest endpoint
//! and an admin hook for retention cleanup.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::clock::SharedClock;
use crate::error::PipelineError;
use crate::ingest::normalize_ticker;
use crate::ingest::types::RawMessage;
use crate::pipeline::{CycleReport, Pipeline};
use crate::report::{MarketReport, Reporter, TickerSummary};
use crate::store::TimeWindow;

/// Longest window a caller may ask for.
const MAX_WINDOW_HOURS: u32 = 24 * 90;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub reporter: Reporter,
    pub tickers: Arc<Vec<String>>,
    pub default_window: Duration,
    pub clock: SharedClock,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/summary/{ticker}", get(summary))
        .route("/market", get(market))
        .route("/ingest", post(ingest))
        .route("/admin/cleanup", post(admin_cleanup))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::ModelUnavailable { .. } | PipelineError::Storage(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            PipelineError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status != StatusCode::BAD_REQUEST {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Store access is synchronous; keep it off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let out = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::storage(format!("worker task failed: {e}")))?;
    Ok(out?)
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    hours: Option<u32>,
}

impl AppState {
    fn window(&self, q: &WindowQuery) -> Result<TimeWindow, ApiError> {
        let span = match q.hours {
            None => self.default_window,
            Some(h) if (1..=MAX_WINDOW_HOURS).contains(&h) => Duration::hours(i64::from(h)),
            Some(h) => {
                return Err(PipelineError::validation(format!(
                    "hours must be within 1..={MAX_WINDOW_HOURS}, got {h}"
                ))
                .into())
            }
        };
        Ok(TimeWindow::trailing(self.clock.now(), span))
    }
}

async fn summary(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(q): Query<WindowQuery>,
) -> Result<Json<TickerSummary>, ApiError> {
    let ticker = normalize_ticker(&ticker);
    if ticker.is_empty() {
        return Err(PipelineError::validation("empty ticker").into());
    }
    let window = state.window(&q)?;
    let reporter = state.reporter.clone();
    Ok(Json(
        blocking(move || reporter.summarize(&ticker, &window)).await?,
    ))
}

async fn market(
    State(state): State<AppState>,
    Query(q): Query<WindowQuery>,
) -> Result<Json<MarketReport>, ApiError> {
    let window = state.window(&q)?;
    let reporter = state.reporter.clone();
    let tickers = Arc::clone(&state.tickers);
    Ok(Json(
        blocking(move || reporter.market(tickers.as_slice(), &window)).await?,
    ))
}

/// Accepts a JSON array of raw messages, grouped per ticker.
async fn ingest(
    State(state): State<AppState>,
    Json(items): Json<Vec<RawMessage>>,
) -> Result<Json<Vec<CycleReport>>, ApiError> {
    let mut groups: BTreeMap<String, Vec<RawMessage>> = BTreeMap::new();
    for m in items {
        groups.entry(normalize_ticker(&m.ticker)).or_default().push(m);
    }
    let pipeline = Arc::clone(&state.pipeline);
    let reports: Vec<CycleReport> = blocking(move || {
        Ok(groups
            .iter()
            .map(|(ticker, batch)| pipeline.process_batch(ticker, batch))
            .collect())
    })
    .await?;
    Ok(Json(reports))
}

#[derive(Serialize)]
struct CleanupOut {
    removed: usize,
    retention_days: i64,
}

async fn admin_cleanup(State(state): State<AppState>) -> Result<Json<CleanupOut>, ApiError> {
    let pipeline = Arc::clone(&state.pipeline);
    let removed = blocking(move || pipeline.cleanup()).await?;
    Ok(Json(CleanupOut {
        removed,
        retention_days: state.pipeline.retention().num_days(),
    }))
}
