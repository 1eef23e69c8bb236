//! Offline lexicon scorer.
//!
//! Deterministic stand-in for a pretrained classifier: counts weighted
//! financial polarity words (with simple negation) and turns the totals into a
//! probability triple with a softmax. Useful for dry runs and tests when no
//! model sidecar is available.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::{LabelOrder, SentimentScore, SentimentScorer};
use crate::Result;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]+(?:'[a-z]+)?").expect("static regex"));

/// Logit given to the neutral class; a text needs more than this much net
/// evidence before it leaves neutral.
const NEUTRAL_BIAS: f64 = 0.5;

const POSITIVE: &[(&str, f64)] = &[
    ("beat", 1.0),
    ("beats", 1.0),
    ("bullish", 1.2),
    ("gain", 0.8),
    ("gains", 0.8),
    ("growth", 0.8),
    ("jump", 1.0),
    ("jumps", 1.0),
    ("outperform", 1.0),
    ("profit", 0.8),
    ("rally", 1.0),
    ("rallies", 1.0),
    ("record", 0.8),
    ("rise", 0.8),
    ("rises", 0.8),
    ("soar", 1.2),
    ("soars", 1.2),
    ("strong", 0.8),
    ("surge", 1.2),
    ("surges", 1.2),
    ("upgrade", 1.0),
    ("upgraded", 1.0),
];

const NEGATIVE: &[(&str, f64)] = &[
    ("bearish", 1.2),
    ("crash", 1.4),
    ("cut", 0.8),
    ("cuts", 0.8),
    ("decline", 1.0),
    ("declines", 1.0),
    ("downgrade", 1.0),
    ("downgraded", 1.0),
    ("drop", 1.0),
    ("drops", 1.0),
    ("fall", 0.8),
    ("falls", 0.8),
    ("lawsuit", 1.0),
    ("loss", 1.0),
    ("losses", 1.0),
    ("miss", 1.0),
    ("misses", 1.0),
    ("plunge", 1.4),
    ("plunges", 1.4),
    ("probe", 0.8),
    ("recall", 0.8),
    ("slump", 1.2),
    ("weak", 0.8),
];

const NEGATIONS: &[&str] = &["not", "no", "never", "without", "fails", "failed"];

/// Word-count scorer with canonical label order.
pub struct LexiconScorer {
    weights: HashMap<&'static str, f64>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconScorer {
    pub fn new() -> Self {
        let weights = POSITIVE
            .iter()
            .map(|(w, s)| (*w, *s))
            .chain(NEGATIVE.iter().map(|(w, s)| (*w, -*s)))
            .collect();
        Self { weights }
    }

    /// Net signed evidence split into (negative, positive) mass
    fn evidence(&self, text: &str) -> (f64, f64) {
        let lower = text.to_lowercase();
        let mut neg = 0.0;
        let mut pos = 0.0;
        let mut negate = false;
        for word in WORD_RE.find_iter(&lower).map(|m| m.as_str()) {
            if NEGATIONS.contains(&word) {
                negate = true;
                continue;
            }
            if let Some(w) = self.weights.get(word) {
                let w = if negate { -w } else { *w };
                if w > 0.0 {
                    pos += w;
                } else {
                    neg -= w;
                }
                negate = false;
            }
        }
        (neg, pos)
    }

    pub fn score_text(&self, text: &str) -> Result<SentimentScore> {
        let (neg, pos) = self.evidence(text);
        let logits = [neg, NEUTRAL_BIAS, pos];
        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        SentimentScore::from_probs(
            &LabelOrder::default(),
            [exps[0] / total, exps[1] / total, exps[2] / total],
        )
    }
}

#[async_trait]
impl SentimentScorer for LexiconScorer {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn label_order(&self) -> LabelOrder {
        LabelOrder::default()
    }

    async fn score_batch(&self, texts: &[String]) -> Result<Vec<SentimentScore>> {
        texts.iter().map(|t| self.score_text(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::Polarity;

    #[test]
    fn polar_headlines() {
        let s = LexiconScorer::new();
        assert_eq!(s.score_text("Apple shares surge after earnings beat").unwrap().label, Polarity::Positive);
        assert_eq!(s.score_text("Tesla stock plunges on recall probe").unwrap().label, Polarity::Negative);
        assert_eq!(s.score_text("Microsoft to hold annual meeting").unwrap().label, Polarity::Neutral);
    }

    #[test]
    fn negation_flips_next_hit() {
        let s = LexiconScorer::new();
        assert_eq!(s.score_text("Results not strong").unwrap().label, Polarity::Negative);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let s = LexiconScorer::new();
        let score = s.score_text("Stock rallies to record as profit jumps").unwrap();
        let sum = score.prob_negative + score.prob_neutral + score.prob_positive;
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(score.prob_positive > score.prob_neutral);
    }
}
