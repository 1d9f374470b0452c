//! Per-model blend weights, keyed by `SentimentModel::name()`.
//!
//! TOML shape (inside `config/sentiment.toml`, or standalone):
//! ```toml
//! [scorer.weights]
//! valence = 0.6
//! polarity = 0.4
//! finance = 0.0
//! ```
//!
//! A model whose weight is 0.0 is kept in the set but never invoked.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::Path};

use crate::error::{PipelineError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelWeights(pub BTreeMap<String, f64>);

impl Default for ModelWeights {
    fn default() -> Self {
        Self::from_pairs([("valence", 0.6), ("polarity", 0.4)])
    }
}

impl ModelWeights {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn get(&self, model: &str) -> Option<f64> {
        self.0.get(model).copied()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Rejects negative or non-finite weights, names outside `known`, and a
    /// non-positive total. Runs once at startup.
    pub fn validate(&self, known: &[&str]) -> Result<()> {
        for (name, w) in &self.0 {
            if !known.contains(&name.as_str()) {
                return Err(PipelineError::config(format!(
                    "weight given for unknown model '{name}' (known: {})",
                    known.join(", ")
                )));
            }
            if !w.is_finite() || *w < 0.0 {
                return Err(PipelineError::config(format!(
                    "weight for '{name}' must be a finite non-negative number, got {w}"
                )));
            }
        }
        let total = self.total();
        if !(total > 0.0) {
            return Err(PipelineError::config(format!(
                "model weights must sum to a positive total, got {total}"
            )));
        }
        Ok(())
    }
}

/// Load a standalone weights table (`name = weight` pairs). Public for tools/tests.
pub fn load_weights_file(path: &Path) -> anyhow::Result<ModelWeights> {
    use anyhow::Context;
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let w: ModelWeights =
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(w)
}
