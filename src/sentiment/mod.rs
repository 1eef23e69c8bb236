//! Sentiment scoring contract and scorers.
//!
//! A scorer turns headline text into a probability triple over
//! {negative, neutral, positive} plus the argmax label. Scorers are explicit,
//! caller-owned handles; each one declares the class ordering its raw output
//! uses through a validated [`LabelOrder`].

mod batch;
pub mod lexicon;
#[cfg(feature = "sidecar")]
pub mod sidecar;

pub use batch::score_texts;
pub use lexicon::LexiconScorer;
#[cfg(feature = "sidecar")]
pub use sidecar::SidecarScorer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Tolerance on `sum(probs) == 1`
const PROB_SUM_TOLERANCE: f64 = 1e-3;

/// Discrete headline class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Negative,
    Neutral,
    Positive,
}

impl Polarity {
    pub const ALL: [Polarity; 3] = [Polarity::Negative, Polarity::Neutral, Polarity::Positive];

    /// -1 / 0 / +1
    pub fn value(self) -> i64 {
        match self {
            | Polarity::Negative => -1,
            | Polarity::Neutral => 0,
            | Polarity::Positive => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            | Polarity::Negative => "negative",
            | Polarity::Neutral => "neutral",
            | Polarity::Positive => "positive",
        }
    }

    /// Case-insensitive parse applying `policy` to labels outside the fixed set.
    pub fn parse_with_policy(raw: &str, policy: UnknownLabelPolicy) -> Result<Self> {
        match raw.parse::<Polarity>() {
            | Ok(p) => Ok(p),
            | Err(e) => match policy {
                | UnknownLabelPolicy::Reject => Err(e),
                | UnknownLabelPolicy::Neutral => Ok(Polarity::Neutral),
            },
        }
    }
}

impl FromStr for Polarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            | "negative" => Ok(Polarity::Negative),
            | "neutral" => Ok(Polarity::Neutral),
            | "positive" => Ok(Polarity::Positive),
            | _ => Err(Error::InvalidLabel(s.to_string())),
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with an externally supplied label outside {negative, neutral, positive}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownLabelPolicy {
    /// Fail the load with [`Error::InvalidLabel`]
    #[default]
    Reject,
    /// Count as polarity 0, excluded from pos/neg counts
    Neutral,
}

/// Class-index ordering of a scorer's raw probability vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelOrder([Polarity; 3]);

impl Default for LabelOrder {
    fn default() -> Self {
        Self(Polarity::ALL)
    }
}

impl LabelOrder {
    /// Accepts only permutations of the three polarities.
    pub fn new(order: [Polarity; 3]) -> Result<Self> {
        let mut sorted = order;
        sorted.sort();
        if sorted != Polarity::ALL {
            return Err(Error::ScorerError(format!(
                "label order must be a permutation of negative/neutral/positive, got {:?}",
                order
            )));
        }
        Ok(Self(order))
    }

    /// Parse a declared label list such as a model's `id2label` table.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        if labels.len() != 3 {
            return Err(Error::ScorerError(format!(
                "expected 3 declared labels, got {}",
                labels.len()
            )));
        }
        let mut order = Polarity::ALL;
        for (slot, raw) in order.iter_mut().zip(labels) {
            *slot = raw.as_ref().parse()?;
        }
        Self::new(order)
    }

    pub fn polarity_at(&self, idx: usize) -> Option<Polarity> {
        self.0.get(idx).copied()
    }

    pub fn as_array(&self) -> [Polarity; 3] {
        self.0
    }
}

/// Probability triple and argmax label for one text
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub prob_negative: f64,
    pub prob_neutral: f64,
    pub prob_positive: f64,
    pub label: Polarity,
}

impl SentimentScore {
    /// Build from a raw probability vector laid out in `order`; the label is
    /// the argmax, first index winning ties.
    pub fn from_probs(order: &LabelOrder, raw: [f64; 3]) -> Result<Self> {
        validate_probs(&raw)?;
        let mut best = 0;
        for i in 1..3 {
            if raw[i] > raw[best] {
                best = i;
            }
        }
        let mut score = Self {
            prob_negative: 0.0,
            prob_neutral: 0.0,
            prob_positive: 0.0,
            label: order.0[best],
        };
        for (p, polarity) in raw.iter().zip(order.0) {
            match polarity {
                | Polarity::Negative => score.prob_negative = *p,
                | Polarity::Neutral => score.prob_neutral = *p,
                | Polarity::Positive => score.prob_positive = *p,
            }
        }
        Ok(score)
    }

    /// Build from canonical probabilities and a label that must agree with them.
    pub fn with_label(neg: f64, neu: f64, pos: f64, label: Polarity) -> Result<Self> {
        let score = Self::from_probs(&LabelOrder::default(), [neg, neu, pos])?;
        if score.label != label && score.prob(label) < score.prob(score.label) {
            return Err(Error::DataError(format!(
                "label {} disagrees with probabilities ({:.4}, {:.4}, {:.4})",
                label, neg, neu, pos
            )));
        }
        Ok(Self { label, ..score })
    }

    /// Keeps an externally supplied label without the argmax check; used only
    /// for labels admitted by [`UnknownLabelPolicy::Neutral`].
    pub(crate) fn from_parts_unchecked(neg: f64, neu: f64, pos: f64, label: Polarity) -> Self {
        Self { prob_negative: neg, prob_neutral: neu, prob_positive: pos, label }
    }

    pub fn prob(&self, polarity: Polarity) -> f64 {
        match polarity {
            | Polarity::Negative => self.prob_negative,
            | Polarity::Neutral => self.prob_neutral,
            | Polarity::Positive => self.prob_positive,
        }
    }

    pub fn polarity(&self) -> i64 {
        self.label.value()
    }
}

fn validate_probs(raw: &[f64; 3]) -> Result<()> {
    if raw.iter().any(|p| !p.is_finite() || *p < 0.0 || *p > 1.0) {
        return Err(Error::DataError(format!("probabilities out of [0,1]: {:?}", raw)));
    }
    let sum: f64 = raw.iter().sum();
    if (sum - 1.0).abs() > PROB_SUM_TOLERANCE {
        return Err(Error::DataError(format!("probabilities sum to {:.6}, expected 1", sum)));
    }
    Ok(())
}

/// Black-box text classifier.
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Declared class ordering of the backend's raw output
    fn label_order(&self) -> LabelOrder;

    /// Score one batch; the result must be in input order and of equal length.
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<SentimentScore>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_is_case_insensitive_and_strict() {
        assert_eq!("Positive".parse::<Polarity>().unwrap(), Polarity::Positive);
        assert_eq!(" NEGATIVE ".parse::<Polarity>().unwrap(), Polarity::Negative);
        assert_matches!("bullish".parse::<Polarity>(), Err(Error::InvalidLabel(_)));
        assert_eq!(
            Polarity::parse_with_policy("bullish", UnknownLabelPolicy::Neutral).unwrap(),
            Polarity::Neutral
        );
    }

    #[test]
    fn label_order_must_be_permutation() {
        assert!(LabelOrder::new([Polarity::Positive, Polarity::Negative, Polarity::Neutral]).is_ok());
        assert!(LabelOrder::new([Polarity::Positive, Polarity::Positive, Polarity::Neutral]).is_err());
        assert!(LabelOrder::from_labels(&["neutral", "positive"]).is_err());
        assert_matches!(
            LabelOrder::from_labels(&["neutral", "positive", "LABEL_2"]),
            Err(Error::InvalidLabel(_))
        );
    }

    #[test]
    fn from_probs_respects_declared_order() {
        // finbert-tone style ordering: neutral, positive, negative
        let order = LabelOrder::from_labels(&["Neutral", "Positive", "Negative"]).unwrap();
        let score = SentimentScore::from_probs(&order, [0.1, 0.2, 0.7]).unwrap();
        assert_eq!(score.label, Polarity::Negative);
        assert_eq!(score.prob_negative, 0.7);
        assert_eq!(score.prob_neutral, 0.1);
        assert_eq!(score.prob_positive, 0.2);
    }

    #[test]
    fn ties_go_to_first_index() {
        let score = SentimentScore::from_probs(&LabelOrder::default(), [0.4, 0.4, 0.2]).unwrap();
        assert_eq!(score.label, Polarity::Negative);
    }

    #[test]
    fn with_label_rejects_disagreement() {
        assert!(SentimentScore::with_label(0.1, 0.2, 0.7, Polarity::Positive).is_ok());
        assert_matches!(
            SentimentScore::with_label(0.1, 0.2, 0.7, Polarity::Negative),
            Err(Error::DataError(_))
        );
    }

    #[test]
    fn rejects_invalid_probabilities() {
        let order = LabelOrder::default();
        assert!(SentimentScore::from_probs(&order, [0.5, 0.5, 0.5]).is_err());
        assert!(SentimentScore::from_probs(&order, [f64::NAN, 0.5, 0.5]).is_err());
        assert!(SentimentScore::from_probs(&order, [-0.1, 0.6, 0.5]).is_err());
    }
}
