//! Weighted blend of several sentiment models into one `SentimentScore`.
//!
//! compound = Σ w_i * c_i / Σ w_i, taken over the models that answered.
//! Polarity and subjectivity are blended the same way.
//!
//! A model that errors or returns a non-finite value is dropped for that message
//! and the remaining weights are renormalized. If nothing answers the message
//! fails with `ModelUnavailable`.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analyze::weights::ModelWeights;
use crate::error::{PipelineError, Result};
use crate::ingest::types::NormalizedMessage;
use crate::sentiment::{
    FinanceTermModel, ModelError, PolarityModel, SentimentModel, ValenceModel,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub polarity: f64,
    pub subjectivity: f64,
    pub compound: f64,
    /// Weights of the models that actually contributed (as configured, not renormalized).
    pub model_weights: BTreeMap<String, f64>,
    /// Each contributing model's own compound, before blending.
    #[serde(default)]
    pub components: BTreeMap<String, f64>,
}

/// Built-in model set. Names: "valence", "polarity", "finance".
pub fn builtin_models() -> Vec<Box<dyn SentimentModel>> {
    vec![
        Box::new(ValenceModel::new()),
        Box::new(PolarityModel::new()),
        Box::new(FinanceTermModel::new()),
    ]
}

pub struct SentimentScorer {
    // (model, weight) in a fixed order, zero weights already dropped.
    models: Vec<(Box<dyn SentimentModel>, f64)>,
}

impl std::fmt::Debug for SentimentScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.models.iter().map(|(m, w)| (m.name().to_string(), *w)))
            .finish()
    }
}

impl SentimentScorer {
    /// Pairs every weighted name with a model from `models`. Models without a
    /// weight entry are left out; weights naming a missing model are an error.
    pub fn new(models: Vec<Box<dyn SentimentModel>>, weights: &ModelWeights) -> Result<Self> {
        let names: Vec<String> = models.iter().map(|m| m.name().to_string()).collect();
        let known: Vec<&str> = names.iter().map(String::as_str).collect();
        weights.validate(&known)?;

        let mut seen = std::collections::HashSet::new();
        for n in &known {
            if !seen.insert(*n) {
                return Err(PipelineError::config(format!("duplicate model name '{n}'")));
            }
        }

        let models: Vec<_> = models
            .into_iter()
            .filter_map(|m| match weights.get(m.name()) {
                Some(w) if w > 0.0 => Some((m, w)),
                _ => None,
            })
            .collect();
        tracing::debug!(target: "pipeline", models = models.len(), "scorer ready");
        Ok(Self { models })
    }

    /// Built-in models with the given weights.
    pub fn with_builtin(weights: &ModelWeights) -> Result<Self> {
        Self::new(builtin_models(), weights)
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|(m, _)| m.name()).collect()
    }

    pub fn score(&self, msg: &NormalizedMessage) -> Result<SentimentScore> {
        self.score_text(&msg.clean_body)
    }

    pub fn score_text(&self, text: &str) -> Result<SentimentScore> {
        let mut wsum = 0.0f64;
        let (mut pol, mut subj, mut comp) = (0.0f64, 0.0f64, 0.0f64);
        let mut used = BTreeMap::new();
        let mut components = BTreeMap::new();

        for (model, w) in &self.models {
            let out = model.analyze(text).and_then(|o| {
                if o.is_finite() {
                    Ok(o.clamped())
                } else {
                    Err(ModelError::InvalidOutput {
                        model: model.name().to_string(),
                    })
                }
            });
            match out {
                Ok(o) => {
                    pol += w * o.polarity;
                    subj += w * o.subjectivity;
                    comp += w * o.compound;
                    wsum += w;
                    used.insert(model.name().to_string(), *w);
                    components.insert(model.name().to_string(), o.compound);
                }
                Err(e) => {
                    tracing::warn!(target: "pipeline", model = model.name(), error = %e, "model skipped");
                    counter!("pipeline_model_failures_total", "model" => model.name().to_string())
                        .increment(1);
                }
            }
        }

        if used.is_empty() {
            return Err(PipelineError::ModelUnavailable {
                attempted: self.models.len(),
            });
        }

        Ok(SentimentScore {
            polarity: (pol / wsum).clamp(-1.0, 1.0),
            subjectivity: (subj / wsum).clamp(0.0, 1.0),
            compound: (comp / wsum).clamp(-1.0, 1.0),
            model_weights: used,
            components,
        })
    }
}
