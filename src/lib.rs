// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod sentiment;
pub mod store;

// Per-message analysis (spam, weighted scoring)
pub mod analyze;

// Sources in, notifications out
pub mod ingest;
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::AppConfig;
pub use crate::error::{PipelineError, Result};
pub use crate::pipeline::{CycleReport, Disposition, Pipeline};
pub use crate::report::{Category, MarketReport, Reporter, TickerSummary};
pub use crate::store::{InsertOutcome, RecordStore, StoredRecord, TimeWindow};
