//! Sentiment model capability set.
//!
//! Any type implementing `SentimentModel` can join the scorer. The built-in
//! models are pure lexicon/rule engines, so the same text always yields the same
//! output.

pub mod finance;
pub mod polarity;
pub mod valence;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use finance::FinanceTermModel;
pub use polarity::PolarityModel;
pub use valence::ValenceModel;

/// Raw output of one model. Ranges: polarity/compound in [-1,1], subjectivity in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub polarity: f64,
    pub subjectivity: f64,
    pub compound: f64,
}

impl ModelOutput {
    pub fn neutral() -> Self {
        Self {
            polarity: 0.0,
            subjectivity: 0.0,
            compound: 0.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.polarity.is_finite() && self.subjectivity.is_finite() && self.compound.is_finite()
    }

    /// Clamp every component into its documented range.
    pub fn clamped(self) -> Self {
        Self {
            polarity: self.polarity.clamp(-1.0, 1.0),
            subjectivity: self.subjectivity.clamp(0.0, 1.0),
            compound: self.compound.clamp(-1.0, 1.0),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    /// Collaborator could not produce a result (backend down, timeout, ...).
    #[error("model {model} unavailable: {reason}")]
    Unavailable { model: String, reason: String },
    /// Collaborator answered with NaN/inf.
    #[error("model {model} returned a non-finite score")]
    InvalidOutput { model: String },
}

pub trait SentimentModel: Send + Sync {
    /// Stable name; configuration weights are keyed by it.
    fn name(&self) -> &str;
    fn analyze(&self, text: &str) -> Result<ModelOutput, ModelError>;
}

/// Whitespace token with surrounding ASCII punctuation removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Word {
    pub raw: String,
    pub lower: String,
}

pub(crate) fn words(text: &str) -> Vec<Word> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|t| !t.is_empty())
        .map(|t| Word {
            raw: t.to_string(),
            lower: t.to_lowercase(),
        })
        .collect()
}

/// Simple negator set plus any "...n't" contraction.
pub(crate) fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "cannot" | "without" | "nothing" | "nor" | "neither" | "none"
    ) || tok.ends_with("n't")
}

/// Is any of the 1..=3 tokens before `i` a negator?
pub(crate) fn negated(tokens: &[Word], i: usize) -> bool {
    (1..=3).any(|k| i >= k && is_negator(tokens[i - k].lower.as_str()))
}

/// `x / sqrt(x^2 + alpha)`: maps an unbounded sum into (-1, 1).
pub(crate) fn normalize_sum(sum: f64, alpha: f64) -> f64 {
    if sum == 0.0 {
        return 0.0;
    }
    (sum / (sum * sum + alpha).sqrt()).clamp(-1.0, 1.0)
}
