//! Error handling for the sentiment pipeline.

use thiserror::Error;

/// Main error type for the sentiment pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Data-related errors (e.g. malformed price or feature tables)
    #[error("Data error: {0}")]
    DataError(String),

    /// No upstream data available for this run (empty headline set, empty price range)
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// A sentiment label outside {negative, neutral, positive}
    #[error("Invalid sentiment label: {0:?}")]
    InvalidLabel(String),

    /// Sentiment backend errors (transport or contract violations)
    #[error("Scorer error: {0}")]
    ScorerError(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV read/write errors
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    /// Request errors
    #[error("Request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// Date/time parsing errors
    #[error("Time parse error: {0}")]
    TimeParseError(#[from] chrono::ParseError),

    /// Invalid argument errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

/// Result type for the sentiment pipeline
pub type Result<T> = std::result::Result<T, Error>;

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Other(err)
    }
}

// Allow automatic conversion from anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
