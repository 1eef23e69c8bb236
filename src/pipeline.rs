//! End-to-end runs: score → resolve → aggregate → evaluate.

use chrono::Duration;
use log::{info, warn};

use crate::backtest::{
    closes_for_evaluation, evaluate_closes, price_window, CsvPriceProvider, Evaluation, PriceProvider,
    RemotePriceProvider,
};
use crate::calendar::{ExchangeSession, DEFAULT_LAG_MINUTES};
use crate::config::{Config, PriceSource, ScorerBackend};
use crate::features::{aggregate, assign_trading_dates};
use crate::sentiment::{score_texts, LexiconScorer, SentimentScorer};
use crate::utils::types::{DailyFeatureRow, HeadlineRecord, PriceBar, ScoredHeadline, TradingDateAssignment};
use crate::{Error, Result};

/// Knobs for [`build_features`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureOptions {
    pub lag_minutes: i64,
    pub batch_size: usize,
    pub concurrency: usize,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        Self { lag_minutes: DEFAULT_LAG_MINUTES, batch_size: 16, concurrency: 4 }
    }
}

impl FeatureOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            lag_minutes: cfg.exchange.lag_minutes,
            batch_size: cfg.scorer.batch_size,
            concurrency: cfg.scorer.concurrency,
        }
    }
}

/// Output of a feature build
#[derive(Debug, Clone, Default)]
pub struct FeatureRun {
    pub assignments: Vec<TradingDateAssignment>,
    pub features: Vec<DailyFeatureRow>,
    /// Headlines that received a trading date
    pub retained: usize,
    /// Headlines dropped because their time could not be resolved
    pub dropped_unparseable: usize,
}

/// Score headlines, pin them to trading dates and aggregate per day.
pub async fn build_features<S>(
    headlines: Vec<HeadlineRecord>,
    scorer: &S,
    session: &ExchangeSession,
    opts: &FeatureOptions,
) -> Result<FeatureRun>
where
    S: SentimentScorer + ?Sized,
{
    if headlines.is_empty() {
        return Err(Error::MissingInput("no headlines to score".into()));
    }
    let texts: Vec<String> = headlines.iter().map(|h| h.title.clone()).collect();
    let scores = score_texts(scorer, &texts, opts.batch_size, opts.concurrency).await?;
    info!("Scored {} headlines with {}", scores.len(), scorer.name());

    let scored = headlines
        .into_iter()
        .zip(scores)
        .map(|(headline, score)| ScoredHeadline { headline, score })
        .collect();
    assign_and_aggregate(scored, session, opts.lag_minutes)
}

/// Resolve and aggregate headlines that already carry scores.
pub fn assign_and_aggregate(
    scored: Vec<ScoredHeadline>,
    session: &ExchangeSession,
    lag_minutes: i64,
) -> Result<FeatureRun> {
    let (assignments, dropped_unparseable) = assign_trading_dates(scored, session, lag_minutes);
    if dropped_unparseable > 0 {
        warn!("{} headlines had no resolvable trading date", dropped_unparseable);
    }
    if assignments.is_empty() {
        return Err(Error::MissingInput("no headlines left after trading-date resolution".into()));
    }
    let features = aggregate(&assignments);
    info!(
        "Aggregated {} headlines into {} trading days (lag {} min, {} dropped)",
        assignments.len(),
        features.len(),
        lag_minutes,
        dropped_unparseable
    );
    Ok(FeatureRun { retained: assignments.len(), assignments, features, dropped_unparseable })
}

/// Join features to prices and compute the signal metrics.
pub fn evaluate_run(features: &[DailyFeatureRow], bars: &[PriceBar], prefer_adj_close: bool) -> Evaluation {
    let eval = evaluate_closes(features, closes_for_evaluation(bars, prefer_adj_close));
    if eval.joined.is_empty() {
        warn!(
            "None of the {} feature days overlap {} price bars with a following session",
            features.len(),
            bars.len()
        );
    }
    eval
}

/// Fetch the bars covering `features` plus `padding_days` on each side.
pub async fn fetch_prices_for(
    provider: &dyn PriceProvider,
    ticker: &str,
    features: &[DailyFeatureRow],
    padding_days: i64,
) -> Result<Vec<PriceBar>> {
    let (start, last) = price_window(features, padding_days)
        .ok_or_else(|| Error::MissingInput("no feature rows to fetch prices for".into()))?;
    // providers treat `end` as exclusive
    provider.fetch(ticker, start, last + Duration::days(1)).await
}

/// Scorer selected by `[scorer]`. The caller owns the handle.
pub async fn scorer_from_config(cfg: &Config) -> Result<Box<dyn SentimentScorer>> {
    match cfg.scorer.backend {
        | ScorerBackend::Lexicon => Ok(Box::new(LexiconScorer::new())),
        #[cfg(feature = "sidecar")]
        | ScorerBackend::Sidecar => {
            let scorer = crate::sentiment::SidecarScorer::connect(
                cfg.scorer.endpoint.clone(),
                cfg.scorer.timeout(),
                cfg.scorer.max_retries,
            )
            .await?;
            Ok(Box::new(scorer))
        }
        #[cfg(not(feature = "sidecar"))]
        | ScorerBackend::Sidecar => Err(Error::ConfigError(
            "sidecar backend requested but finsent was built without the `sidecar` feature".into(),
        )),
    }
}

/// Price provider selected by `[prices]`; `csv_override` wins over `prices.csv_path`.
pub fn price_provider_from_config(
    cfg: &Config,
    csv_override: Option<&std::path::Path>,
) -> Result<Box<dyn PriceProvider>> {
    if let Some(path) = csv_override {
        return Ok(Box::new(CsvPriceProvider::new(path)));
    }
    match cfg.prices.source {
        | PriceSource::Csv => {
            let path = cfg.prices.csv_path.as_deref().ok_or_else(|| {
                Error::ConfigError("prices.csv_path must be set for the csv price source".into())
            })?;
            Ok(Box::new(CsvPriceProvider::new(path)))
        }
        | PriceSource::Remote => {
            let mut provider = RemotePriceProvider::new(&cfg.prices.endpoint, cfg.scorer.timeout())?;
            if cfg.prices.cache {
                provider = provider.with_cache_dir(cfg.data.intermediate_path());
            }
            Ok(Box::new(provider))
        }
    }
}
