// src/analyze/mod.rs
//! Per-message analysis: spam classification and weighted sentiment scoring.

pub mod antispam;
pub mod scoring;
pub mod weights;

pub use crate::analyze::antispam::{AntiSpamParams, DailyState, SpamFilter, SpamReason, SpamVerdict};
pub use crate::analyze::scoring::{builtin_models, SentimentScore, SentimentScorer};
pub use crate::analyze::weights::ModelWeights;
