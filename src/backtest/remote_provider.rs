use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use log::{info, warn};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::providers::{write_prices_csv, CsvPriceProvider, PriceProvider};
use crate::utils::types::PriceBar;
use crate::{Error, Result};

pub const DEFAULT_CHART_ENDPOINT: &str = "https://query1.finance.yahoo.com";

/// Daily bars from a Yahoo-style `/v8/finance/chart/<ticker>` endpoint,
/// optionally cached as CSV.
#[derive(Clone)]
pub struct RemotePriceProvider {
    client: reqwest::Client,
    endpoint: String,
    cache_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(rename = "exchangeTimezoneName", default)]
    exchange_timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    #[serde(default)]
    adjclose: Vec<AdjCloseBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

/// Bars from one chart result, dated in the exchange's local calendar.
/// Points without a close are skipped.
fn bars_from_chart(result: &ChartResult) -> Vec<PriceBar> {
    let tz: Tz = result
        .meta
        .exchange_timezone
        .as_deref()
        .and_then(|name| name.parse().ok())
        .unwrap_or(chrono_tz::America::New_York);
    let empty = QuoteBlock::default();
    let quote = result.indicators.quote.first().unwrap_or(&empty);
    let adj = result.indicators.adjclose.first().map(|a| a.adjclose.as_slice()).unwrap_or(&[]);

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let Some(instant) = Utc.timestamp_opt(ts, 0).single() else {
            continue;
        };
        let Some(close) = at(&quote.close, i) else {
            continue;
        };
        bars.push(PriceBar {
            date: instant.with_timezone(&tz).date_naive(),
            open: at(&quote.open, i),
            high: at(&quote.high, i),
            low: at(&quote.low, i),
            close,
            adj_close: at(adj, i).unwrap_or(close),
            volume: at(&quote.volume, i),
        });
    }
    bars.sort_by_key(|b| b.date);
    bars
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp()).unwrap_or_default()
}

impl RemotePriceProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("finsent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, endpoint: endpoint.trim_end_matches('/').to_string(), cache_dir: None })
    }

    /// Cache fetched series as `<TICKER>_1d_<start>_to_<end>.csv` under `dir`
    pub fn with_cache_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    fn cache_path(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}_1d_{}_to_{}.csv", ticker.to_uppercase(), start, end)))
    }

    async fn download(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>> {
        let url = format!("{}/v8/finance/chart/{}", self.endpoint, ticker);
        let period1 = unix_midnight(start).to_string();
        let period2 = unix_midnight(end).to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", "1d"),
                ("events", "history"),
                ("includeAdjustedClose", "true"),
            ])
            .send()
            .await?
            .error_for_status()?;
        let payload: ChartResponse = resp.json().await?;
        if let Some(err) = payload.chart.error {
            return Err(Error::DataError(format!("chart API error {}: {}", err.code, err.description)));
        }
        let bars = payload
            .chart
            .result
            .unwrap_or_default()
            .first()
            .map(bars_from_chart)
            .unwrap_or_default();
        // period2 is exclusive
        Ok(bars.into_iter().filter(|b| b.date >= start && b.date < end).collect())
    }
}

#[async_trait]
impl PriceProvider for RemotePriceProvider {
    async fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>> {
        let cache = self.cache_path(ticker, start, end);
        if let Some(path) = cache.as_ref().filter(|p| p.exists()) {
            info!("Using cached prices {}", path.display());
            return CsvPriceProvider::new(path).fetch(ticker, start, end).await;
        }

        let bars = self.download(ticker, start, end).await?;
        if bars.is_empty() {
            return Err(Error::MissingInput(format!(
                "no price data found for {} between {} and {}",
                ticker, start, end
            )));
        }
        info!("Downloaded {} daily bars for {}", bars.len(), ticker);

        if let Some(path) = cache {
            if let Err(e) = write_prices_csv(&path, &bars) {
                warn!("Could not cache prices to {}: {}", path.display(), e);
            }
        }
        Ok(bars)
    }
}
