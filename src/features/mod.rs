//! Daily sentiment feature aggregation.

pub mod store;

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::calendar::ExchangeSession;
use crate::sentiment::Polarity;
use crate::utils::types::{DailyFeatureRow, ScoredHeadline, TradingDateAssignment};

#[derive(Default)]
struct DayAccumulator {
    n: usize,
    net: i64,
    pos: usize,
    neg: usize,
    prob_pos: Vec<f64>,
    prob_neg: Vec<f64>,
    prob_neu: Vec<f64>,
}

impl DayAccumulator {
    fn push(&mut self, row: &TradingDateAssignment) {
        let score = &row.scored.score;
        self.n += 1;
        self.net += score.polarity();
        match score.label {
            | Polarity::Positive => self.pos += 1,
            | Polarity::Negative => self.neg += 1,
            | Polarity::Neutral => {}
        }
        self.prob_pos.push(score.prob_positive);
        self.prob_neg.push(score.prob_negative);
        self.prob_neu.push(score.prob_neutral);
    }

    fn finish(mut self, trade_date: NaiveDate) -> DailyFeatureRow {
        DailyFeatureRow {
            trade_date,
            n_headlines: self.n,
            net_sent: self.net,
            pos_cnt: self.pos,
            neg_cnt: self.neg,
            mean_prob_pos: sorted_mean(&mut self.prob_pos),
            mean_prob_neg: sorted_mean(&mut self.prob_neg),
            mean_prob_neu: sorted_mean(&mut self.prob_neu),
        }
    }
}

/// Mean summed in ascending order so the result does not depend on the order
/// rows arrived in.
fn sorted_mean(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// One row per distinct trade date, ascending.
pub fn aggregate(rows: &[TradingDateAssignment]) -> Vec<DailyFeatureRow> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
    for row in rows {
        days.entry(row.trade_date).or_default().push(row);
    }
    days.into_iter().map(|(date, acc)| acc.finish(date)).collect()
}

/// Pin each scored headline to its trading date.
///
/// Returns the assignments (input order) and the number of rows whose date
/// could not be resolved.
pub fn assign_trading_dates(
    scored: Vec<ScoredHeadline>,
    session: &ExchangeSession,
    lag_minutes: i64,
) -> (Vec<TradingDateAssignment>, usize) {
    let mut dropped = 0;
    let mut out = Vec::with_capacity(scored.len());
    for s in scored {
        match session.trading_date(s.headline.timestamp, lag_minutes) {
            | Some(trade_date) => out.push(TradingDateAssignment { scored: s, trade_date }),
            | None => dropped += 1,
        }
    }
    (out, dropped)
}
