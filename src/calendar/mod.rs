//! Trading-date resolution.
//!
//! Maps an arbitrary event instant onto the calendar date of the exchange
//! session in which the event's information is first actionable. The mapping
//! is a pure function of the instant, the lag and the session definition:
//!
//! * local time (after lag) before the open: same business day
//! * during the session or at/after the close: next business day
//! * weekends roll forward to Monday; exchange holidays are not modelled

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default delay between publication and tradability
pub const DEFAULT_LAG_MINUTES: i64 = 30;

/// Where a local wall-clock time falls relative to the regular session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionBucket {
    PreOpen,
    Regular,
    AfterClose,
}

/// A single daily session `[open, close)` in a fixed exchange timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeSession {
    pub timezone: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for ExchangeSession {
    fn default() -> Self {
        Self::us_equities()
    }
}

impl ExchangeSession {
    /// Build a session; `open` must be strictly before `close`.
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime) -> Result<Self> {
        if open >= close {
            return Err(Error::ConfigError(format!(
                "exchange open {} must be before close {}",
                open, close
            )));
        }
        Ok(Self { timezone, open, close })
    }

    /// 09:30-16:00 America/New_York
    pub fn us_equities() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    pub fn bucket(&self, local: NaiveTime) -> SessionBucket {
        if local < self.open {
            SessionBucket::PreOpen
        } else if local >= self.close {
            SessionBucket::AfterClose
        } else {
            SessionBucket::Regular
        }
    }

    /// Trading date for an event published at `ts`.
    ///
    /// Returns `None` only when the lagged instant falls outside the
    /// representable calendar.
    pub fn trading_date(&self, ts: DateTime<Utc>, lag_minutes: i64) -> Option<NaiveDate> {
        let lagged = ts.checked_add_signed(Duration::minutes(lag_minutes))?;
        let local = lagged.with_timezone(&self.timezone);
        let day = local.date_naive();

        let candidate = match self.bucket(local.time()) {
            | SessionBucket::PreOpen => day,
            // intraday and after-close arrivals both miss the current session
            | SessionBucket::Regular | SessionBucket::AfterClose => day.succ_opt()?,
        };
        next_business_day(candidate)
    }

    /// Resolve a raw timestamp string; unparseable input yields `None`.
    pub fn trading_date_str(&self, raw: &str, lag_minutes: i64) -> Option<NaiveDate> {
        parse_timestamp(raw).and_then(|ts| self.trading_date(ts, lag_minutes))
    }

    /// Resolve a column of optional instants, preserving positions.
    pub fn trading_dates<I>(&self, timestamps: I, lag_minutes: i64) -> Vec<Option<NaiveDate>>
    where
        I: IntoIterator<Item = Option<DateTime<Utc>>>,
    {
        timestamps
            .into_iter()
            .map(|ts| ts.and_then(|t| self.trading_date(t, lag_minutes)))
            .collect()
    }
}

pub fn is_weekend(d: NaiveDate) -> bool {
    matches!(d.weekday(), Weekday::Sat | Weekday::Sun)
}

/// `d` itself when it is a weekday, otherwise the following Monday.
pub fn next_business_day(mut d: NaiveDate) -> Option<NaiveDate> {
    while is_weekend(d) {
        d = d.succ_opt()?;
    }
    Some(d)
}

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Normalise a timestamp string to an absolute UTC instant.
///
/// Accepts RFC 3339, RFC 2822 (RSS `pubDate`), space-separated timestamps with
/// an offset, and naive timestamps or bare dates which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
