use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;

use crate::utils::types::JoinedFeatureRow;

/// Summary metrics of the sentiment signal against next-session returns.
///
/// Statistics that are undefined for the given rows (too few points, zero
/// variance, no directional days) are `None` and render as `n/a`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMetrics {
    /// Joined rows with a next-session return
    pub rows: usize,
    /// Rows with a non-zero predicted direction
    pub directional_days: usize,
    pub directional_accuracy: Option<f64>,
    pub corr_net_sent: Option<f64>,
    pub corr_sent_gap: Option<f64>,
}

impl SignalMetrics {
    pub fn compute(rows: &[JoinedFeatureRow]) -> Self {
        let (directional_accuracy, directional_days) =
            directional_accuracy(rows.iter().map(|r| (r.pred_up, r.actual_up)));

        let net: Vec<f64> = rows.iter().map(|r| r.features.net_sent as f64).collect();
        let ret: Vec<f64> = rows.iter().map(|r| r.next_day_return).collect();
        let corr_net_sent = pearson(&net, &ret);

        let (gap, gap_ret): (Vec<f64>, Vec<f64>) = rows
            .iter()
            .filter_map(|r| r.features.sentiment_gap().map(|g| (g, r.next_day_return)))
            .unzip();
        let corr_sent_gap = pearson(&gap, &gap_ret);

        Self {
            rows: rows.len(),
            directional_days,
            directional_accuracy,
            corr_net_sent,
            corr_sent_gap,
        }
    }

    pub fn print(&self) {
        println!("{}", self);
    }
}

impl fmt::Display for SignalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Quick metrics ---")?;
        writeln!(f, "Rows (with next-day return): {}", self.rows)?;
        writeln!(f, "Correlation(net_sent, next_day_return): {}", fmt_opt(self.corr_net_sent, 4))?;
        writeln!(f, "Correlation(sent_gap, next_day_return): {}", fmt_opt(self.corr_sent_gap, 4))?;
        match self.directional_accuracy {
            | Some(acc) => write!(
                f,
                "Directional accuracy (non-neutral days only): {:.3} on {} days",
                acc, self.directional_days
            ),
            | None => write!(f, "Directional accuracy: n/a (no non-neutral net_sent days)"),
        }
    }
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        | Some(x) => format!("{:.*}", decimals, x),
        | None => "n/a".to_string(),
    }
}

/// Pearson correlation; `None` for fewer than two points, mismatched
/// lengths, non-finite input or zero variance on either side.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return None;
    }
    let sd_x = xs.iter().std_dev();
    let sd_y = ys.iter().std_dev();
    if sd_x == 0.0 || sd_y == 0.0 || !sd_x.is_finite() || !sd_y.is_finite() {
        return None;
    }
    let r = xs.iter().covariance(ys.iter()) / (sd_x * sd_y);
    // guard against rounding just outside [-1, 1]
    Some(r.clamp(-1.0, 1.0))
}

/// Fraction of days with `pred != 0` whose sign matches the realised sign,
/// together with the number of such days.
pub fn directional_accuracy<I>(pairs: I) -> (Option<f64>, usize)
where
    I: IntoIterator<Item = (i8, i8)>,
{
    let mut n = 0usize;
    let mut hits = 0usize;
    for (pred, actual) in pairs {
        if pred == 0 {
            continue;
        }
        n += 1;
        if pred == actual {
            hits += 1;
        }
    }
    if n == 0 {
        (None, 0)
    } else {
        (Some(hits as f64 / n as f64), n)
    }
}
