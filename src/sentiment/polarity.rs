//! Pattern-lexicon polarity/subjectivity model (TextBlob-style averaging).
//!
//! Each adjective carries `[polarity, subjectivity]`. An intensifier directly
//! before a word multiplies both; a negator within three tokens multiplies the
//! polarity by -0.5. The output is the mean over matched words.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::{negated, words, ModelError, ModelOutput, SentimentModel};

static LEXICON: Lazy<HashMap<String, [f64; 2]>> = Lazy::new(|| {
    let raw = include_str!("../../lexicon/polarity.json");
    serde_json::from_str::<HashMap<String, [f64; 2]>>(raw).expect("valid polarity lexicon")
});

const NEGATION_SCALAR: f64 = -0.5;

#[derive(Debug, Clone, Default)]
pub struct PolarityModel;

impl PolarityModel {
    pub fn new() -> Self {
        Self
    }
}

impl SentimentModel for PolarityModel {
    fn name(&self) -> &str {
        "polarity"
    }

    fn analyze(&self, text: &str) -> Result<ModelOutput, ModelError> {
        let tokens = words(text);
        let mut pol_sum = 0.0f64;
        let mut subj_sum = 0.0f64;
        let mut n = 0usize;

        for i in 0..tokens.len() {
            let Some(&[p, s]) = LEXICON.get(&tokens[i].lower) else {
                continue;
            };
            let m = if i > 0 {
                intensity(&tokens[i - 1].lower)
            } else {
                1.0
            };
            let mut p = (p * m).clamp(-1.0, 1.0);
            let s = (s * m).clamp(0.0, 1.0);
            if negated(&tokens, i) {
                p *= NEGATION_SCALAR;
            }
            pol_sum += p;
            subj_sum += s;
            n += 1;
        }

        if n == 0 {
            return Ok(ModelOutput::neutral());
        }
        let polarity = pol_sum / n as f64;
        Ok(ModelOutput {
            polarity,
            subjectivity: subj_sum / n as f64,
            compound: polarity,
        }
        .clamped())
    }
}

fn intensity(tok: &str) -> f64 {
    match tok {
        "very" | "really" | "so" | "too" => 1.3,
        "extremely" | "incredibly" | "insanely" => 1.5,
        "slightly" | "somewhat" | "barely" | "kinda" => 0.5,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_over_matched_words() {
        // good [0.7,0.6], bad [-0.7,0.67]
        let out = PolarityModel::new().analyze("good news, bad timing").unwrap();
        assert!(out.polarity.abs() < 1e-12);
        assert!((out.subjectivity - 0.635).abs() < 1e-9);
        assert_eq!(out.compound, out.polarity);
    }

    #[test]
    fn negation_halves_and_flips() {
        let out = PolarityModel::new().analyze("not good").unwrap();
        assert!((out.polarity + 0.35).abs() < 1e-9);
    }

    #[test]
    fn intensifier_scales_and_clamps() {
        let out = PolarityModel::new().analyze("extremely excellent").unwrap();
        assert_eq!(out.polarity, 1.0);
        assert_eq!(out.subjectivity, 1.0);
    }

    #[test]
    fn no_matches_is_neutral() {
        let out = PolarityModel::new().analyze("shares traded sideways").unwrap();
        assert_eq!(out, ModelOutput::neutral());
    }
}
