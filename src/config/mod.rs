//! Configuration for the sentiment pipeline

mod template;

use crate::calendar::{ExchangeSession, DEFAULT_LAG_MINUTES};
use crate::sentiment::UnknownLabelPolicy;
use crate::utils::error::{Error, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use template::generate_commented_config_template;

/// File name looked up by [`Config::load`]
pub const CONFIG_FILE_NAME: &str = "finsent.toml";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Exchange session used for trading-date resolution
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Sentiment backend
    #[serde(default)]
    pub scorer: ScorerConfig,

    /// Handling of externally supplied labels
    #[serde(default)]
    pub labels: LabelsConfig,

    /// Price series source
    #[serde(default)]
    pub prices: PricesConfig,

    /// Data directories
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// IANA timezone name of the exchange
    pub timezone: String,
    /// Regular session open, `HH:MM` local time
    pub open: String,
    /// Regular session close, `HH:MM` local time
    pub close: String,
    /// Minutes between publication and tradability
    pub lag_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerBackend {
    #[default]
    Lexicon,
    Sidecar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub backend: ScorerBackend,
    /// Base URL of the model sidecar
    pub endpoint: String,
    /// Texts per request
    pub batch_size: usize,
    /// Batches in flight at once
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub unknown_policy: UnknownLabelPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    #[default]
    Csv,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricesConfig {
    pub source: PriceSource,
    /// Daily bars file when `source = "csv"`
    pub csv_path: Option<String>,
    /// Chart API base URL when `source = "remote"`
    pub endpoint: String,
    /// Days added on each side of the feature date range
    pub padding_days: i64,
    /// Evaluate on adjusted closes when available
    pub prefer_adj_close: bool,
    /// Cache downloaded series in the intermediate directory
    pub cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub raw_dir: String,
    pub intermediate_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            scorer: ScorerConfig::default(),
            labels: LabelsConfig::default(),
            prices: PricesConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            open: "09:30".to_string(),
            close: "16:00".to_string(),
            lag_minutes: DEFAULT_LAG_MINUTES,
        }
    }
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            backend: ScorerBackend::Lexicon,
            endpoint: "http://127.0.0.1:8000".to_string(),
            batch_size: 16,
            concurrency: 4,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            source: PriceSource::Csv,
            csv_path: None,
            endpoint: crate::backtest::remote_provider::DEFAULT_CHART_ENDPOINT.to_string(),
            padding_days: 5,
            prefer_adj_close: true,
            cache: true,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { raw_dir: "data/raw".to_string(), intermediate_dir: "data/intermediate".to_string() }
    }
}

impl ScorerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DataConfig {
    pub fn raw_path(&self) -> PathBuf {
        PathBuf::from(&self.raw_dir)
    }

    pub fn intermediate_path(&self) -> PathBuf {
        PathBuf::from(&self.intermediate_dir)
    }
}

fn parse_hhmm(field: &str, raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .map_err(|e| Error::ConfigError(format!("exchange.{} {:?} is not HH:MM: {}", field, raw, e)))
}

impl Config {
    /// Serialize default config to TOML string
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default())
            .map_err(|e| Error::ConfigError(format!("Failed to serialize default config: {}", e)))
    }

    /// Load configuration from a specific file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {:?}: {}", path.as_ref(), e))
        })?;
        let mut cfg: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;
        cfg.merge_env()?;
        Ok(cfg)
    }

    /// Save the configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create directory {:?}: {}", parent, e))
            })?;
        }
        std::fs::write(path, content).map_err(|e| {
            Error::ConfigError(format!("Failed to write config file {:?}: {}", path, e))
        })?;
        Ok(())
    }

    /// Validate the configuration for required fields and reasonable values
    pub fn validate(&self) -> Result<()> {
        self.session()?;
        if self.scorer.batch_size == 0 {
            return Err(Error::ConfigError("scorer.batch_size must be > 0".to_string()));
        }
        if self.scorer.concurrency == 0 {
            return Err(Error::ConfigError("scorer.concurrency must be > 0".to_string()));
        }
        if self.scorer.timeout_secs == 0 {
            return Err(Error::ConfigError("scorer.timeout_secs must be > 0".to_string()));
        }
        if self.scorer.backend == ScorerBackend::Sidecar && self.scorer.endpoint.trim().is_empty() {
            return Err(Error::ConfigError("scorer.endpoint must be set for the sidecar backend".to_string()));
        }
        if self.prices.padding_days < 0 {
            return Err(Error::ConfigError("prices.padding_days cannot be negative".to_string()));
        }
        if self.prices.source == PriceSource::Remote && self.prices.endpoint.trim().is_empty() {
            return Err(Error::ConfigError("prices.endpoint must be set for the remote source".to_string()));
        }
        Ok(())
    }

    /// Exchange session described by the `[exchange]` section
    pub fn session(&self) -> Result<ExchangeSession> {
        let tz: Tz = self.exchange.timezone.parse().map_err(|e| {
            Error::ConfigError(format!("exchange.timezone {:?}: {}", self.exchange.timezone, e))
        })?;
        let open = parse_hhmm("open", &self.exchange.open)?;
        let close = parse_hhmm("close", &self.exchange.close)?;
        ExchangeSession::new(tz, open, close)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        let local = Path::new(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::from_file(local);
        }

        if let Some(mut path) = dirs::config_dir() {
            path.push("finsent");
            path.push(CONFIG_FILE_NAME);
            if path.exists() {
                return Self::from_file(path);
            }
        }

        let mut config = Self::default();
        config.merge_env()?;
        Ok(config)
    }

    /// Merge environment variables into the configuration
    pub fn merge_env(&mut self) -> Result<()> {
        if let Ok(url) = env::var("FINSENT_SIDECAR_URL") {
            self.scorer.endpoint = url;
        }

        if let Ok(dir) = env::var("FINSENT_DATA_DIR") {
            let base = PathBuf::from(dir);
            self.data.raw_dir = base.join("raw").to_string_lossy().into_owned();
            self.data.intermediate_dir = base.join("intermediate").to_string_lossy().into_owned();
        }

        if let Ok(lag) = env::var("FINSENT_LAG_MINUTES") {
            self.exchange.lag_minutes = lag.trim().parse().map_err(|e| {
                Error::ConfigError(format!("FINSENT_LAG_MINUTES {:?} is not an integer: {}", lag, e))
            })?;
        }

        Ok(())
    }
}
