//! Trading-slang model: "to the moon", "bagholder", "rug pull", rocket emoji...
//!
//! General-purpose lexicons miss most of these or score them backwards
//! ("short", "calls", "puts"). Phrases of up to three words are matched greedily,
//! longest first; a negator in the three preceding tokens flips the term.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::{negated, normalize_sum, words, ModelError, ModelOutput, SentimentModel};

static TERMS: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    let raw = include_str!("../../lexicon/finance.json");
    serde_json::from_str::<HashMap<String, f64>>(raw).expect("valid finance lexicon")
});

const ALPHA: f64 = 4.0;
const MAX_PHRASE: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct FinanceTermModel;

impl FinanceTermModel {
    pub fn new() -> Self {
        Self
    }
}

impl SentimentModel for FinanceTermModel {
    fn name(&self) -> &str {
        "finance"
    }

    fn analyze(&self, text: &str) -> Result<ModelOutput, ModelError> {
        let tokens = words(text);
        if tokens.is_empty() {
            return Ok(ModelOutput::neutral());
        }

        let mut sum = 0.0f64;
        let mut matched = 0usize;
        let mut i = 0usize;
        while i < tokens.len() {
            let longest = (1..=MAX_PHRASE.min(tokens.len() - i)).rev().find_map(|len| {
                let phrase = tokens[i..i + len]
                    .iter()
                    .map(|w| w.lower.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                TERMS.get(&phrase).map(|v| (len, *v))
            });
            match longest {
                Some((len, v)) => {
                    sum += if negated(&tokens, i) { -v } else { v };
                    matched += len;
                    i += len;
                }
                None => i += 1,
            }
        }

        let compound = normalize_sum(sum, ALPHA);
        Ok(ModelOutput {
            polarity: compound,
            subjectivity: matched as f64 / tokens.len() as f64,
            compound,
        }
        .clamped())
    }
}
