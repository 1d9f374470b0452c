//! Rule-based valence model (VADER-style).
//!
//! Per-word valence from `lexicon/valence.json`, adjusted by:
//! - booster/dampener words up to three tokens back
//! - ALL-CAPS emphasis when the rest of the text is mixed case
//! - negation in the preceding three tokens (scaled flip)
//! - contrastive "but" (before x0.5, after x1.5)
//! - trailing exclamation marks (up to four)
//!
//! The summed valence is squashed into [-1,1] with `x / sqrt(x^2 + 15)`.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::{negated, normalize_sum, words, ModelError, ModelOutput, SentimentModel, Word};

static LEXICON: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    let raw = include_str!("../../lexicon/valence.json");
    serde_json::from_str::<HashMap<String, f64>>(raw).expect("valid valence lexicon")
});

const ALPHA: f64 = 15.0;
const B_INCR: f64 = 0.293;
const B_DECR: f64 = -0.293;
const CAPS_INCR: f64 = 0.733;
const NEGATION_SCALAR: f64 = -0.74;
const BANG_INCR: f64 = 0.292;
const MAX_BANGS: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct ValenceModel;

impl ValenceModel {
    pub fn new() -> Self {
        Self
    }

    /// Unbounded valence sum (before squashing); useful for diagnostics.
    pub fn raw_sum(&self, text: &str) -> (f64, usize, usize) {
        let tokens = words(text);
        if tokens.is_empty() {
            return (0.0, 0, 0);
        }
        let all_caps_text = tokens.iter().all(|w| is_caps(&w.raw));

        let mut vals = vec![0.0f64; tokens.len()];
        let mut hits = 0usize;
        for i in 0..tokens.len() {
            let Some(&base) = LEXICON.get(&tokens[i].lower) else {
                continue;
            };
            hits += 1;

            let mut v = base;
            if !all_caps_text && is_caps(&tokens[i].raw) {
                v += CAPS_INCR * v.signum();
            }
            for (k, scale) in [(1usize, 1.0f64), (2, 0.95), (3, 0.9)] {
                if i >= k {
                    if let Some(b) = booster(&tokens[i - k]) {
                        v += b * scale * v.signum();
                    }
                }
            }
            if negated(&tokens, i) {
                v *= NEGATION_SCALAR;
            }
            vals[i] = v;
        }

        if let Some(bi) = tokens.iter().position(|w| w.lower == "but") {
            for (i, v) in vals.iter_mut().enumerate() {
                if i < bi {
                    *v *= 0.5;
                } else if i > bi {
                    *v *= 1.5;
                }
            }
        }

        let mut sum: f64 = vals.iter().sum();
        if sum != 0.0 {
            let bangs = text.chars().filter(|c| *c == '!').count().min(MAX_BANGS) as f64;
            sum += sum.signum() * bangs * BANG_INCR;
        }
        (sum, hits, tokens.len())
    }
}

impl SentimentModel for ValenceModel {
    fn name(&self) -> &str {
        "valence"
    }

    fn analyze(&self, text: &str) -> Result<ModelOutput, ModelError> {
        let (sum, hits, n) = self.raw_sum(text);
        if n == 0 {
            return Ok(ModelOutput::neutral());
        }
        let compound = normalize_sum(sum, ALPHA);
        Ok(ModelOutput {
            polarity: compound,
            subjectivity: hits as f64 / n as f64,
            compound,
        }
        .clamped())
    }
}

fn is_caps(raw: &str) -> bool {
    let mut letters = 0;
    for c in raw.chars().filter(|c| c.is_alphabetic()) {
        if !c.is_uppercase() {
            return false;
        }
        letters += 1;
    }
    letters >= 2
}

fn booster(w: &Word) -> Option<f64> {
    match w.lower.as_str() {
        "absolutely" | "amazingly" | "completely" | "extremely" | "very" | "really" | "so"
        | "totally" | "hugely" | "incredibly" | "massively" | "super" | "highly" | "insanely" => {
            Some(B_INCR)
        }
        "slightly" | "somewhat" | "barely" | "marginally" | "hardly" | "partly" | "kinda"
        | "sorta" => Some(B_DECR),
        _ => None,
    }
}
