//! Trading-date resolution across session boundaries, weekends and DST.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use finsent::calendar::{is_weekend, ExchangeSession, SessionBucket, DEFAULT_LAG_MINUTES};
use rstest::rstest;

fn utc(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

#[rstest]
// 04:00 ET + 30 min, before the open
#[case("2024-06-03T08:00:00Z", 30, "2024-06-03")]
// Friday 17:00 ET, after the close
#[case("2024-06-07T21:00:00Z", 30, "2024-06-10")]
// 09:00 ET + 30 lands exactly on the open
#[case("2024-06-03T13:00:00Z", 30, "2024-06-04")]
// 08:59 ET + 30 is 09:29, still pre-open
#[case("2024-06-03T12:59:00Z", 30, "2024-06-03")]
// 15:30 ET + 30 lands exactly on the close
#[case("2024-06-03T19:30:00Z", 30, "2024-06-04")]
// intraday with no lag
#[case("2024-06-03T15:00:00Z", 0, "2024-06-04")]
// Friday 09:15 ET plus lag falls inside the session
#[case("2024-06-07T13:15:00Z", 30, "2024-06-10")]
// Saturday morning pre-open rolls to Monday
#[case("2024-06-08T12:00:00Z", 0, "2024-06-10")]
// Sunday evening rolls to Monday
#[case("2024-06-09T23:00:00Z", 30, "2024-06-10")]
// lag crosses midnight into Tuesday pre-open
#[case("2024-06-04T03:50:00Z", 30, "2024-06-04")]
// winter: 09:00 EST is 14:00 UTC
#[case("2024-01-08T14:00:00Z", 0, "2024-01-08")]
#[case("2024-01-08T14:30:00Z", 0, "2024-01-09")]
fn resolves_trading_date(#[case] ts: &str, #[case] lag: i64, #[case] expected: &str) {
    let session = ExchangeSession::default();
    assert_eq!(session.trading_date(utc(ts), lag), Some(date(expected)));
}

#[rstest]
#[case("09:29:59", SessionBucket::PreOpen)]
#[case("09:30:00", SessionBucket::Regular)]
#[case("15:59:59", SessionBucket::Regular)]
#[case("16:00:00", SessionBucket::AfterClose)]
fn bucket_boundaries(#[case] local: &str, #[case] expected: SessionBucket) {
    let t = chrono::NaiveTime::parse_from_str(local, "%H:%M:%S").unwrap();
    assert_eq!(ExchangeSession::default().bucket(t), expected);
}

#[test]
fn never_resolves_to_a_weekend() {
    let session = ExchangeSession::default();
    let start = utc("2024-03-01T00:00:00Z");
    // every 17 minutes for ten weeks, spanning the March DST switch
    let mut ts = start;
    while ts < start + Duration::weeks(10) {
        for lag in [0, DEFAULT_LAG_MINUTES, 240] {
            let d = session.trading_date(ts, lag).unwrap();
            assert!(!is_weekend(d), "{} lag {} -> {}", ts, lag, d);
            assert!(d >= ts.date_naive() - Duration::days(1));
        }
        ts += Duration::minutes(17);
    }
}

#[test]
fn pre_open_weekdays_stay_on_the_same_day() {
    let session = ExchangeSession::default();
    let ny = chrono_tz::America::New_York;
    for day in 3..=7 {
        for hour in 0..9 {
            let local = ny.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap();
            let resolved = session.trading_date(local.with_timezone(&Utc), 0).unwrap();
            assert_eq!(resolved, local.date_naive());
        }
    }
}

#[test]
fn friday_afternoon_resolves_to_monday() {
    let session = ExchangeSession::default();
    let ny = chrono_tz::America::New_York;
    for hour in 10..24 {
        let local = ny.with_ymd_and_hms(2024, 6, 7, hour, 0, 0).unwrap();
        let resolved = session.trading_date(local.with_timezone(&Utc), 0).unwrap();
        assert_eq!(resolved.weekday(), Weekday::Mon);
        assert_eq!(resolved, date("2024-06-10"));
    }
}

#[test]
fn unparseable_rows_keep_their_position() {
    let session = ExchangeSession::default();
    let raw = ["2024-06-03T08:00:00Z", "yesterday", "", "2024-06-07 21:00:00+00:00"];
    let resolved: Vec<_> = raw.iter().map(|r| session.trading_date_str(r, 30)).collect();
    assert_eq!(resolved, vec![Some(date("2024-06-03")), None, None, Some(date("2024-06-10"))]);
}
