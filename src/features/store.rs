//! CSV persistence for scored headlines, daily features and joined tables.

use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::calendar::parse_timestamp;
use crate::sentiment::{Polarity, SentimentScore, UnknownLabelPolicy};
use crate::utils::ensure_parent;
use crate::utils::types::{
    DailyFeatureRow, HeadlineRecord, JoinedFeatureRow, ScoredHeadline, TradingDateAssignment,
};
use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct ScoredCsvRow<'a> {
    time: String,
    source: Option<&'a str>,
    ticker: &'a str,
    title: &'a str,
    url: Option<&'a str>,
    prob_negative: f64,
    prob_neutral: f64,
    prob_positive: f64,
    label: Polarity,
    sentiment_num: i64,
    trade_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct ScoredCsvIn {
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    prob_negative: f64,
    prob_neutral: f64,
    prob_positive: f64,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Serialize)]
struct JoinedCsvRow {
    trade_date: NaiveDate,
    n_headlines: usize,
    net_sent: i64,
    pos_cnt: usize,
    neg_cnt: usize,
    mean_prob_pos: Option<f64>,
    mean_prob_neg: Option<f64>,
    mean_prob_neu: Option<f64>,
    close: f64,
    next_close: f64,
    next_day_return: f64,
    pred_up: i8,
    actual_up: i8,
}

impl From<&JoinedFeatureRow> for JoinedCsvRow {
    fn from(j: &JoinedFeatureRow) -> Self {
        let f = &j.features;
        Self {
            trade_date: f.trade_date,
            n_headlines: f.n_headlines,
            net_sent: f.net_sent,
            pos_cnt: f.pos_cnt,
            neg_cnt: f.neg_cnt,
            mean_prob_pos: f.mean_prob_pos,
            mean_prob_neg: f.mean_prob_neg,
            mean_prob_neu: f.mean_prob_neu,
            close: j.close,
            next_close: j.next_close,
            next_day_return: j.next_day_return,
            pred_up: j.pred_up,
            actual_up: j.actual_up,
        }
    }
}

/// Daily feature row as found on disk. Tables written by pandas carry
/// `net_sent` as a float (`2.0`), so the integer columns are read as floats
/// and checked.
#[derive(Debug, Deserialize)]
struct FeatureCsvIn {
    trade_date: NaiveDate,
    n_headlines: f64,
    net_sent: f64,
    pos_cnt: f64,
    neg_cnt: f64,
    #[serde(default)]
    mean_prob_pos: Option<f64>,
    #[serde(default)]
    mean_prob_neg: Option<f64>,
    #[serde(default)]
    mean_prob_neu: Option<f64>,
}

fn integral(value: f64, column: &str, date: NaiveDate) -> Result<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        Ok(value as i64)
    } else {
        Err(Error::DataError(format!("{column} on {date} is not a whole number: {value}")))
    }
}

fn count(value: f64, column: &str, date: NaiveDate) -> Result<usize> {
    usize::try_from(integral(value, column, date)?)
        .map_err(|_| Error::DataError(format!("{column} on {date} is negative: {value}")))
}

impl TryFrom<FeatureCsvIn> for DailyFeatureRow {
    type Error = Error;

    fn try_from(row: FeatureCsvIn) -> Result<Self> {
        let date = row.trade_date;
        Ok(DailyFeatureRow {
            trade_date: date,
            n_headlines: count(row.n_headlines, "n_headlines", date)?,
            net_sent: integral(row.net_sent, "net_sent", date)?,
            pos_cnt: count(row.pos_cnt, "pos_cnt", date)?,
            neg_cnt: count(row.neg_cnt, "neg_cnt", date)?,
            mean_prob_pos: row.mean_prob_pos,
            mean_prob_neg: row.mean_prob_neg,
            mean_prob_neu: row.mean_prob_neu,
        })
    }
}

/// Scored headlines read back from disk
#[derive(Debug, Default)]
pub struct ScoredLoad {
    pub rows: Vec<ScoredHeadline>,
    pub dropped_unparseable: usize,
    pub unknown_labels: usize,
}

pub fn write_scored<P: AsRef<Path>>(path: P, rows: &[TradingDateAssignment]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        let h = &row.scored.headline;
        let s = &row.scored.score;
        wtr.serialize(ScoredCsvRow {
            time: h.timestamp.to_rfc3339(),
            source: h.source.as_deref(),
            ticker: &h.ticker,
            title: &h.title,
            url: h.url.as_deref(),
            prob_negative: s.prob_negative,
            prob_neutral: s.prob_neutral,
            prob_positive: s.prob_positive,
            label: s.label,
            sentiment_num: s.polarity(),
            trade_date: row.trade_date,
        })?;
    }
    wtr.flush()?;
    info!("Saved {} scored headlines to {}", rows.len(), path.display());
    Ok(())
}

/// Load previously scored headlines. Labels are checked against `policy`;
/// known labels must also agree with their probabilities.
pub fn read_scored<P: AsRef<Path>>(path: P, policy: UnknownLabelPolicy) -> Result<ScoredLoad> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new().has_headers(true).flexible(true).from_path(path)?;
    let mut load = ScoredLoad::default();
    for rec in rdr.deserialize::<ScoredCsvIn>() {
        let row = rec?;
        let Some(ts) = row.time.as_deref().and_then(parse_timestamp) else {
            load.dropped_unparseable += 1;
            continue;
        };
        let title = row.title.as_deref().unwrap_or_default();
        if title.trim().is_empty() {
            load.dropped_unparseable += 1;
            continue;
        }
        let raw_label = row.label.unwrap_or_default();
        let score = match raw_label.parse::<Polarity>() {
            | Ok(label) => SentimentScore::with_label(
                row.prob_negative,
                row.prob_neutral,
                row.prob_positive,
                label,
            )?,
            | Err(e) => match policy {
                | UnknownLabelPolicy::Reject => return Err(e),
                | UnknownLabelPolicy::Neutral => {
                    load.unknown_labels += 1;
                    SentimentScore::from_parts_unchecked(
                        row.prob_negative,
                        row.prob_neutral,
                        row.prob_positive,
                        Polarity::Neutral,
                    )
                }
            },
        };
        let mut headline = HeadlineRecord::new(ts, row.ticker.as_deref().unwrap_or_default(), title);
        headline.source = row.source;
        headline.url = row.url;
        load.rows.push(ScoredHeadline { headline, score });
    }
    if load.unknown_labels > 0 {
        warn!(
            "{} rows in {} carried labels outside negative/neutral/positive; counted as neutral",
            load.unknown_labels,
            path.display()
        );
    }
    Ok(load)
}

pub fn write_features<P: AsRef<Path>>(path: P, rows: &[DailyFeatureRow]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    info!("Saved {} daily feature rows to {}", rows.len(), path.display());
    Ok(())
}

/// Read a daily feature table; rows come back sorted by trade date.
pub fn read_features<P: AsRef<Path>>(path: P) -> Result<Vec<DailyFeatureRow>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| Error::DataError(format!("features CSV {} read error: {e}", path.display())))?;
    let mut rows = Vec::new();
    for rec in rdr.deserialize::<FeatureCsvIn>() {
        rows.push(DailyFeatureRow::try_from(rec?)?);
    }
    rows.sort_by_key(|r| r.trade_date);
    Ok(rows)
}

pub fn write_joined<P: AsRef<Path>>(path: P, rows: &[JoinedFeatureRow]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        wtr.serialize(JoinedCsvRow::from(row))?;
    }
    wtr.flush()?;
    info!("Saved {} joined rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn feature_row(day: u32, net: i64) -> DailyFeatureRow {
        DailyFeatureRow {
            trade_date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            n_headlines: 2,
            net_sent: net,
            pos_cnt: 1,
            neg_cnt: 0,
            mean_prob_pos: Some(0.6),
            mean_prob_neg: Some(0.1),
            mean_prob_neu: Some(0.3),
        }
    }

    #[test]
    fn features_table_has_expected_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("features_daily_AAPL.csv");
        write_features(&path, &[feature_row(4, 1), feature_row(3, -1)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "trade_date,n_headlines,net_sent,pos_cnt,neg_cnt,mean_prob_pos,mean_prob_neg,mean_prob_neu\n"
        ));
        let back = read_features(&path).unwrap();
        assert_eq!(back[0].trade_date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert_eq!(back[1].net_sent, 1);
    }

    #[test]
    fn features_without_probability_columns_load_as_none() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "trade_date,n_headlines,net_sent,pos_cnt,neg_cnt").unwrap();
        writeln!(tmp, "2024-06-03,3,1,2,1").unwrap();
        let rows = read_features(tmp.path()).unwrap();
        assert_eq!(rows[0].mean_prob_pos, None);
        assert_eq!(rows[0].sentiment_gap(), None);
    }

    #[test]
    fn float_net_sent_from_pandas_is_accepted() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "trade_date,n_headlines,net_sent,pos_cnt,neg_cnt,mean_prob_pos,mean_prob_neg,mean_prob_neu").unwrap();
        writeln!(tmp, "2024-06-03,5,2.0,3,1,0.5,0.2,0.3").unwrap();
        writeln!(tmp, "2024-06-04,2,-1.0,0,1,0.1,0.6,0.3").unwrap();
        let rows = read_features(tmp.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].net_sent, 2);
        assert_eq!(rows[0].n_headlines, 5);
        assert_eq!(rows[1].net_sent, -1);
    }

    #[test]
    fn fractional_net_sent_is_a_data_error() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "trade_date,n_headlines,net_sent,pos_cnt,neg_cnt").unwrap();
        writeln!(tmp, "2024-06-03,5,2.5,3,1").unwrap();
        assert_matches!(read_features(tmp.path()), Err(Error::DataError(m)) if m.contains("net_sent"));
    }

    const SCORED: &str = "time,ticker,title,prob_negative,prob_neutral,prob_positive,label\n\
        2024-06-03T08:00:00Z,AAPL,Apple up,0.1,0.2,0.7,Positive\n\
        2024-06-03T09:00:00Z,AAPL,Apple odd,0.2,0.6,0.2,mixed\n";

    #[test]
    fn unknown_labels_rejected_by_default() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{}", SCORED).unwrap();
        assert_matches!(
            read_scored(tmp.path(), UnknownLabelPolicy::Reject),
            Err(Error::InvalidLabel(l)) if l == "mixed"
        );
    }

    #[test]
    fn unknown_labels_counted_as_neutral_when_allowed() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{}", SCORED).unwrap();
        let load = read_scored(tmp.path(), UnknownLabelPolicy::Neutral).unwrap();
        assert_eq!(load.rows.len(), 2);
        assert_eq!(load.unknown_labels, 1);
        assert_eq!(load.rows[0].label(), Polarity::Positive);
        assert_eq!(load.rows[1].score.polarity(), 0);
    }

    #[test]
    fn label_disagreeing_with_probabilities_is_rejected() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "time,ticker,title,prob_negative,prob_neutral,prob_positive,label").unwrap();
        writeln!(tmp, "2024-06-03T08:00:00Z,AAPL,Apple,0.1,0.2,0.7,negative").unwrap();
        assert_matches!(read_scored(tmp.path(), UnknownLabelPolicy::Neutral), Err(Error::DataError(_)));
    }
}
