use async_trait::async_trait;
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::calendar::parse_timestamp;
use crate::utils::ensure_parent;
use crate::utils::types::PriceBar;
use crate::{Error, Result};

/// Source of daily bars for a ticker over `[start, end)`
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>>;
}

/// CSV row accepting either a `date` or a `datetime` column
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "datetime", alias = "Date", alias = "Datetime")]
    date: String,
    #[serde(default, alias = "Open")]
    open: Option<f64>,
    #[serde(default, alias = "High")]
    high: Option<f64>,
    #[serde(default, alias = "Low")]
    low: Option<f64>,
    #[serde(default, alias = "Close")]
    close: Option<f64>,
    #[serde(default, alias = "Adj Close", alias = "adjclose")]
    adj_close: Option<f64>,
    #[serde(default, alias = "Volume")]
    volume: Option<f64>,
}

/// Session date of a price row. Date-time values keep their local calendar
/// date rather than being shifted to UTC.
fn parse_bar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(date) = raw.get(..10).and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()) {
        return Some(date);
    }
    parse_timestamp(raw).map(|ts| ts.date_naive())
}

/// Reads daily bars from a CSV file; `adj_close` falls back to `close`
#[derive(Debug, Clone)]
pub struct CsvPriceProvider {
    path: PathBuf,
}

impl CsvPriceProvider {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every dated bar in the file, sorted by date. An empty close reads as
    /// NaN so the session stays in the series.
    pub fn load(&self) -> Result<Vec<PriceBar>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| Error::DataError(format!("price CSV {} read error: {e}", self.path.display())))?;
        let mut out = Vec::new();
        let mut skipped = 0usize;
        for rec in rdr.deserialize::<CsvRow>() {
            let row = rec.map_err(|e| Error::DataError(format!("price CSV parse error: {e}")))?;
            let Some(date) = parse_bar_date(&row.date) else {
                skipped += 1;
                continue;
            };
            let close = row.close.unwrap_or(f64::NAN);
            out.push(PriceBar {
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close,
                adj_close: row.adj_close.unwrap_or(close),
                volume: row.volume,
            });
        }
        if skipped > 0 {
            debug!("Skipped {} price rows without a date in {}", skipped, self.path.display());
        }
        // stable, so duplicates keep file order
        out.sort_by_key(|b| b.date);
        Ok(out)
    }
}

#[async_trait]
impl PriceProvider for CsvPriceProvider {
    async fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>> {
        let bars: Vec<PriceBar> = self
            .load()?
            .into_iter()
            .filter(|b| b.date >= start && b.date < end)
            .collect();
        if bars.is_empty() {
            return Err(Error::MissingInput(format!(
                "no price data for {} between {} and {} in {}",
                ticker,
                start,
                end,
                self.path.display()
            )));
        }
        info!("Loaded {} daily bars for {} from {}", bars.len(), ticker, self.path.display());
        Ok(bars)
    }
}

/// Write bars with columns `date,open,high,low,close,adj_close,volume`
pub fn write_prices_csv<P: AsRef<Path>>(path: P, bars: &[PriceBar]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;
    for bar in bars {
        wtr.serialize(bar)?;
    }
    wtr.flush()?;
    Ok(())
}
