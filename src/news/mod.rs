//! Headline ingestion: CSV loading and cleaning.

use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use log::{debug, info};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::calendar::parse_timestamp;
use crate::utils::latest_with_prefix;
use crate::utils::types::HeadlineRecord;
use crate::{Error, Result};

/// Raw CSV row: `time,source,ticker,title,url`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeadlineCsvRow {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Cleaned headlines plus the bookkeeping of what was dropped
#[derive(Debug, Clone, Default)]
pub struct HeadlineBatch {
    pub headlines: Vec<HeadlineRecord>,
    pub read: usize,
    pub dropped_unparseable: usize,
    pub dropped_empty_title: usize,
    pub dropped_duplicates: usize,
}

/// Read and clean a headline CSV.
pub fn load_headlines<P: AsRef<Path>>(path: P) -> Result<HeadlineBatch> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::DataError(format!("headline CSV {} read error: {e}", path.display())))?;
    let mut rows = Vec::new();
    for rec in rdr.deserialize::<HeadlineCsvRow>() {
        rows.push(rec?);
    }
    let batch = clean_headlines(rows);
    info!(
        "Loaded {} headlines from {} ({} read, {} bad time, {} empty title, {} duplicates)",
        batch.headlines.len(),
        path.display(),
        batch.read,
        batch.dropped_unparseable,
        batch.dropped_empty_title,
        batch.dropped_duplicates
    );
    Ok(batch)
}

/// Drop rows without a usable time or title, normalise tickers, sort by time
/// and remove duplicates on (ticker, title, UTC date) keeping the earliest.
pub fn clean_headlines<I>(rows: I) -> HeadlineBatch
where
    I: IntoIterator<Item = HeadlineCsvRow>,
{
    let mut batch = HeadlineBatch::default();
    let mut kept = Vec::new();
    for row in rows {
        batch.read += 1;
        let Some(timestamp) = row.time.as_deref().and_then(parse_timestamp) else {
            batch.dropped_unparseable += 1;
            continue;
        };
        let title = row.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            batch.dropped_empty_title += 1;
            continue;
        }
        let mut record = HeadlineRecord::new(timestamp, row.ticker.as_deref().unwrap_or_default(), title);
        record.source = row.source.filter(|s| !s.trim().is_empty());
        record.url = row.url.filter(|s| !s.trim().is_empty());
        kept.push(record);
    }

    kept.sort_by_key(|h| h.timestamp);
    let mut seen = HashSet::new();
    for h in kept {
        let key = (h.ticker.clone(), h.title.clone(), h.timestamp.date_naive());
        if seen.insert(key) {
            batch.headlines.push(h);
        } else {
            batch.dropped_duplicates += 1;
        }
    }
    if batch.dropped_unparseable > 0 {
        debug!("dropped {} headlines with unparseable timestamps", batch.dropped_unparseable);
    }
    batch
}

/// Most frequent ticker; ties go to the alphabetically first.
pub fn dominant_ticker(headlines: &[HeadlineRecord]) -> Result<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for h in headlines.iter().filter(|h| !h.ticker.is_empty()) {
        *counts.entry(h.ticker.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(t, _)| t.to_string())
        .ok_or_else(|| Error::MissingInput("no tickers in the headline set".into()))
}

pub fn filter_ticker(headlines: Vec<HeadlineRecord>, ticker: &str) -> Vec<HeadlineRecord> {
    let ticker = ticker.trim().to_uppercase();
    headlines.into_iter().filter(|h| h.ticker == ticker).collect()
}

/// Keep headlines with `start <= timestamp < end`.
pub fn filter_window(
    headlines: Vec<HeadlineRecord>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<HeadlineRecord> {
    headlines
        .into_iter()
        .filter(|h| h.timestamp >= start && h.timestamp < end)
        .collect()
}

/// Headline file to use when none is named: the newest
/// `headlines_clean_*.csv` in `intermediate_dir`, else the newest
/// `rss_headlines_*.csv` in `raw_dir`, else `raw_dir/sample_headlines.csv`.
pub fn latest_headlines_file(raw_dir: &Path, intermediate_dir: &Path) -> Result<PathBuf> {
    if let Some(path) = latest_with_prefix(intermediate_dir, "headlines_clean_")? {
        return Ok(path);
    }
    if let Some(path) = latest_with_prefix(raw_dir, "rss_headlines_")? {
        return Ok(path);
    }
    let sample = raw_dir.join("sample_headlines.csv");
    if sample.is_file() {
        return Ok(sample);
    }
    Err(Error::MissingInput(format!(
        "no headlines file found in {} or {}",
        intermediate_dir.display(),
        raw_dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn row(time: &str, ticker: &str, title: &str) -> HeadlineCsvRow {
        HeadlineCsvRow {
            time: Some(time.into()),
            ticker: Some(ticker.into()),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    #[test]
    fn cleaning_drops_and_dedupes() {
        let batch = clean_headlines(vec![
            row("2024-06-03T15:00:00Z", "aapl", "Apple beats"),
            row("garbage", "AAPL", "Bad time"),
            row("2024-06-03T09:00:00Z", "AAPL ", "Apple beats"),
            row("2024-06-03T10:00:00Z", "AAPL", "   "),
            row("2024-06-04T09:00:00Z", "AAPL", "Apple beats"),
        ]);
        assert_eq!(batch.read, 5);
        assert_eq!(batch.dropped_unparseable, 1);
        assert_eq!(batch.dropped_empty_title, 1);
        assert_eq!(batch.dropped_duplicates, 1);
        assert_eq!(batch.headlines.len(), 2);
        // earliest copy of the duplicate survives, output is time-sorted
        assert_eq!(batch.headlines[0].timestamp.to_rfc3339(), "2024-06-03T09:00:00+00:00");
        assert_eq!(batch.headlines[0].ticker, "AAPL");
    }

    #[test]
    fn dominant_ticker_breaks_ties_alphabetically() {
        let batch = clean_headlines(vec![
            row("2024-06-03T15:00:00Z", "MSFT", "a"),
            row("2024-06-03T15:00:00Z", "AAPL", "b"),
            row("2024-06-03T16:00:00Z", "TSLA", "c"),
            row("2024-06-03T17:00:00Z", "TSLA", "d"),
            row("2024-06-03T18:00:00Z", "AAPL", "e"),
        ]);
        assert_eq!(dominant_ticker(&batch.headlines).unwrap(), "AAPL");
        assert!(matches!(dominant_ticker(&[]), Err(Error::MissingInput(_))));
    }

    #[test]
    fn loads_csv_without_optional_columns() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "time,ticker,title").unwrap();
        writeln!(tmp, "2024-06-03T08:00:00Z,AAPL,Apple surges").unwrap();
        writeln!(tmp, ",AAPL,No time").unwrap();
        let batch = load_headlines(tmp.path()).unwrap();
        assert_eq!(batch.headlines.len(), 1);
        assert_eq!(batch.dropped_unparseable, 1);
        assert_eq!(batch.headlines[0].source, None);
    }

    #[test]
    fn window_is_half_open() {
        let batch = clean_headlines(vec![
            row("2024-06-01T00:00:00Z", "AAPL", "a"),
            row("2024-06-02T00:00:00Z", "AAPL", "b"),
        ]);
        let start = parse_timestamp("2024-06-01").unwrap();
        let end = parse_timestamp("2024-06-02").unwrap();
        let kept = filter_window(batch.headlines, start, end);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "a");
    }

    #[test]
    fn headline_file_lookup_order() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw");
        let inter = dir.path().join("intermediate");
        std::fs::create_dir_all(&raw).unwrap();
        std::fs::create_dir_all(&inter).unwrap();
        assert!(matches!(latest_headlines_file(&raw, &inter), Err(Error::MissingInput(_))));

        std::fs::write(raw.join("sample_headlines.csv"), "time,ticker,title\n").unwrap();
        assert!(latest_headlines_file(&raw, &inter).unwrap().ends_with("sample_headlines.csv"));

        std::fs::write(raw.join("rss_headlines_20240601.csv"), "").unwrap();
        std::fs::write(raw.join("rss_headlines_20240603.csv"), "").unwrap();
        assert!(latest_headlines_file(&raw, &inter).unwrap().ends_with("rss_headlines_20240603.csv"));

        std::fs::write(inter.join("headlines_clean_20240602.csv"), "").unwrap();
        assert!(latest_headlines_file(&raw, &inter).unwrap().ends_with("headlines_clean_20240602.csv"));
    }
}
