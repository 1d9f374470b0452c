//! Error kinds surfaced by the aggregation core.
//!
//! Duplicate keys are not errors (see `store::InsertOutcome::Skipped`) and a
//! single failing model is recovered inside the scorer, so neither shows up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or incomplete record, rejected at the store boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// Every configured sentiment model failed for one message.
    #[error("all sentiment models unavailable ({attempted} attempted)")]
    ModelUnavailable { attempted: usize },

    /// Bad configuration (zero-sum weights, unknown model, ...). Raised at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Storage backend failure (connection, query, poisoned lock).
    #[error("storage error: {0}")]
    Storage(String),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Self::Storage(msg.to_string())
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
