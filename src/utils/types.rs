//! Common row types flowing through the pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::sentiment::{Polarity, SentimentScore};

/// A single news headline as produced by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineRecord {
    pub timestamp: DateTime<Utc>,
    pub ticker: String,
    pub title: String,
    pub source: Option<String>,
    pub url: Option<String>,
}

impl HeadlineRecord {
    pub fn new(timestamp: DateTime<Utc>, ticker: &str, title: &str) -> Self {
        Self {
            timestamp,
            ticker: ticker.trim().to_uppercase(),
            title: title.trim().to_string(),
            source: None,
            url: None,
        }
    }
}

/// Headline plus the scorer's probability triple and label
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHeadline {
    pub headline: HeadlineRecord,
    pub score: SentimentScore,
}

impl ScoredHeadline {
    pub fn label(&self) -> Polarity {
        self.score.label
    }
}

/// Scored headline pinned to the session in which it is first actionable
#[derive(Debug, Clone, PartialEq)]
pub struct TradingDateAssignment {
    pub scored: ScoredHeadline,
    pub trade_date: NaiveDate,
}

/// One aggregated row per trading date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFeatureRow {
    pub trade_date: NaiveDate,
    pub n_headlines: usize,
    pub net_sent: i64,
    pub pos_cnt: usize,
    pub neg_cnt: usize,
    #[serde(default)]
    pub mean_prob_pos: Option<f64>,
    #[serde(default)]
    pub mean_prob_neg: Option<f64>,
    #[serde(default)]
    pub mean_prob_neu: Option<f64>,
}

impl DailyFeatureRow {
    /// `mean_prob_pos - mean_prob_neg` when both means are known
    pub fn sentiment_gap(&self) -> Option<f64> {
        match (self.mean_prob_pos, self.mean_prob_neg) {
            | (Some(pos), Some(neg)) if pos.is_finite() && neg.is_finite() => Some(pos - neg),
            | _ => None,
        }
    }
}

/// Daily OHLC bar for one trading session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    /// NaN when the source had no close for the session
    pub close: f64,
    pub adj_close: f64,
    pub volume: Option<f64>,
}

/// Daily features joined with the forward session return
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedFeatureRow {
    pub features: DailyFeatureRow,
    pub close: f64,
    pub next_close: f64,
    pub next_day_return: f64,
    pub pred_up: i8,
    pub actual_up: i8,
}
