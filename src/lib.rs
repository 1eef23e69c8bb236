//! # finsent
//! News-sentiment research pipeline.
//!
//! Headlines are scored by a [`sentiment::SentimentScorer`], pinned to the
//! trading session in which they first become actionable
//! ([`calendar::ExchangeSession::trading_date`]), aggregated into daily
//! features ([`features::aggregate`]) and evaluated against next-session
//! returns ([`backtest::evaluate`]).

pub use crate::utils::error::{Error, Result};

pub mod analysis;
pub mod backtest;
pub mod calendar;
pub mod config;
pub mod features;
pub mod news;
pub mod pipeline;
pub mod sentiment;
pub mod utils;
