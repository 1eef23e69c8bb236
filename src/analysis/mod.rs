//! Statistics for evaluating the sentiment signal

pub mod signal_metrics;

pub use signal_metrics::{directional_accuracy, pearson, SignalMetrics};
