//! Signal evaluation against daily prices.
//!
//! Daily sentiment rows are joined to the close of their trading date and the
//! close of the next session present in the price series. The joined rows feed
//! [`SignalMetrics`].

use chrono::{Duration, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::SignalMetrics;
use crate::utils::types::{DailyFeatureRow, JoinedFeatureRow, PriceBar};

pub mod providers;
pub mod remote_provider;

pub use providers::{write_prices_csv, CsvPriceProvider, PriceProvider};
pub use remote_provider::RemotePriceProvider;

/// Which close the evaluator reads from each bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseColumn {
    Close,
    #[default]
    AdjClose,
}

impl CloseColumn {
    pub fn from_preference(prefer_adj_close: bool) -> Self {
        if prefer_adj_close {
            CloseColumn::AdjClose
        } else {
            CloseColumn::Close
        }
    }

    pub fn read(self, bar: &PriceBar) -> f64 {
        match self {
            | CloseColumn::Close => bar.close,
            | CloseColumn::AdjClose => bar.adj_close,
        }
    }
}

/// Joined table plus the metrics computed over it
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub joined: Vec<JoinedFeatureRow>,
    pub metrics: SignalMetrics,
}

/// `(date, close)` pairs in the column the evaluator reads
pub fn closes_for_evaluation(bars: &[PriceBar], prefer_adj_close: bool) -> Vec<(NaiveDate, f64)> {
    let column = CloseColumn::from_preference(prefer_adj_close);
    bars.iter().map(|b| (b.date, column.read(b))).collect()
}

/// Date range to request prices for: feature dates widened by `padding_days`
/// on both sides. `None` when there are no features.
pub fn price_window(features: &[DailyFeatureRow], padding_days: i64) -> Option<(NaiveDate, NaiveDate)> {
    let first = features.iter().map(|f| f.trade_date).min()?;
    let last = features.iter().map(|f| f.trade_date).max()?;
    let pad = Duration::days(padding_days.max(0));
    Some((first - pad, last + pad))
}

/// Close per price date. Every date stays in the index; a date whose rows
/// carry no finite, positive close maps to `None`. Among duplicates the last
/// usable close wins.
fn close_index<I>(closes: I) -> BTreeMap<NaiveDate, Option<f64>>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut index: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
    for (date, close) in closes {
        let slot = index.entry(date).or_insert(None);
        if close.is_finite() && close > 0.0 {
            *slot = Some(close);
        }
    }
    let missing = index.values().filter(|c| c.is_none()).count();
    if missing > 0 {
        debug!("{} price dates have no usable close", missing);
    }
    index
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Join features to the close of their date and the close of the next date
/// present in `bars`, then compute the metrics. Never fails: no overlap gives
/// an empty join with every metric unavailable.
pub fn evaluate(features: &[DailyFeatureRow], bars: &[PriceBar], column: CloseColumn) -> Evaluation {
    evaluate_closes(features, bars.iter().map(|b| (b.date, column.read(b))))
}

/// [`evaluate`] over already projected `(date, close)` pairs
pub fn evaluate_closes<I>(features: &[DailyFeatureRow], closes: I) -> Evaluation
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let index = close_index(closes);
    let dates: Vec<NaiveDate> = index.keys().copied().collect();

    let mut ordered: Vec<&DailyFeatureRow> = features.iter().collect();
    ordered.sort_by_key(|f| f.trade_date);

    let mut joined = Vec::new();
    for row in ordered {
        let Ok(pos) = dates.binary_search(&row.trade_date) else {
            continue;
        };
        let Some(next_date) = dates.get(pos + 1) else {
            continue;
        };
        // a gap in either close leaves no one-session return for this row
        let (Some(close), Some(next_close)) = (index[&row.trade_date], index[next_date]) else {
            continue;
        };
        let next_day_return = next_close / close - 1.0;
        joined.push(JoinedFeatureRow {
            features: row.clone(),
            close,
            next_close,
            next_day_return,
            pred_up: sign(row.net_sent as f64),
            actual_up: sign(next_day_return),
        });
    }
    debug!("Joined {} of {} feature rows to next-session returns", joined.len(), features.len());

    let metrics = SignalMetrics::compute(&joined);
    Evaluation { joined, metrics }
}
