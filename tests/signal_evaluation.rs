//! Aggregation and evaluation from scored headlines to signal metrics.

use chrono::{DateTime, NaiveDate, Utc};
use finsent::backtest::{evaluate, CloseColumn, CsvPriceProvider};
use finsent::calendar::ExchangeSession;
use finsent::features::aggregate;
use finsent::pipeline::{assign_and_aggregate, evaluate_run};
use finsent::sentiment::{Polarity, SentimentScore};
use finsent::utils::types::{DailyFeatureRow, HeadlineRecord, PriceBar, ScoredHeadline, TradingDateAssignment};

fn d(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn scored(ts: &str, label: Polarity) -> ScoredHeadline {
    let probs = match label {
        | Polarity::Negative => (0.7, 0.2, 0.1),
        | Polarity::Neutral => (0.2, 0.6, 0.2),
        | Polarity::Positive => (0.1, 0.3, 0.6),
    };
    let ts = DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc);
    ScoredHeadline {
        headline: HeadlineRecord::new(ts, "AAPL", &format!("{} at {}", label, ts)),
        score: SentimentScore::with_label(probs.0, probs.1, probs.2, label).unwrap(),
    }
}

fn bar(date: &str, close: f64) -> PriceBar {
    PriceBar { date: d(date), open: None, high: None, low: None, close, adj_close: close, volume: None }
}

fn feature(date: &str, net: i64) -> DailyFeatureRow {
    DailyFeatureRow {
        trade_date: d(date),
        n_headlines: 5,
        net_sent: net,
        pos_cnt: 5,
        neg_cnt: 0,
        mean_prob_pos: Some(0.6),
        mean_prob_neg: Some(0.1),
        mean_prob_neu: Some(0.3),
    }
}

#[test]
fn documented_join_example() {
    let eval = evaluate(
        &[feature("2024-06-03", 5)],
        &[bar("2024-06-03", 100.0), bar("2024-06-04", 102.0)],
        CloseColumn::Close,
    );
    assert_eq!(eval.joined.len(), 1);
    let row = &eval.joined[0];
    assert!((row.next_day_return - 0.02).abs() < 1e-12);
    assert_eq!(row.pred_up, 1);
    assert_eq!(row.actual_up, 1);
    assert_eq!(eval.metrics.directional_days, 1);
    // one point: correlation undefined
    assert_eq!(eval.metrics.corr_net_sent, None);
}

#[test]
fn empty_prices_report_everything_unavailable() {
    let eval = evaluate(&[feature("2024-06-03", 5), feature("2024-06-04", -2)], &[], CloseColumn::AdjClose);
    assert!(eval.joined.is_empty());
    assert_eq!(eval.metrics.directional_accuracy, None);
    assert_eq!(eval.metrics.corr_net_sent, None);
    assert_eq!(eval.metrics.corr_sent_gap, None);
    let text = eval.metrics.to_string();
    assert!(text.contains("n/a"));
    assert!(!text.contains("NaN"));
}

#[test]
fn aggregation_ignores_input_order() {
    let session = ExchangeSession::default();
    let rows = vec![
        scored("2024-06-03T08:00:00Z", Polarity::Positive),
        scored("2024-06-03T09:00:00Z", Polarity::Negative),
        scored("2024-06-03T10:00:00Z", Polarity::Neutral),
        scored("2024-06-03T18:00:00Z", Polarity::Positive),
        scored("2024-06-07T21:00:00Z", Polarity::Negative),
        scored("2024-06-08T14:00:00Z", Polarity::Positive),
    ];
    let forward = assign_and_aggregate(rows.clone(), &session, 30).unwrap();
    let mut reversed_rows = rows;
    reversed_rows.reverse();
    let reversed = assign_and_aggregate(reversed_rows, &session, 30).unwrap();
    assert_eq!(forward.features, reversed.features);

    let dates: Vec<_> = forward.features.iter().map(|f| f.trade_date).collect();
    assert_eq!(dates, vec![d("2024-06-03"), d("2024-06-04"), d("2024-06-10")]);
    for f in &forward.features {
        assert!(f.n_headlines >= 1);
        assert!(f.pos_cnt + f.neg_cnt <= f.n_headlines);
    }
    let first = &forward.features[0];
    assert_eq!((first.n_headlines, first.net_sent, first.pos_cnt, first.neg_cnt), (3, 0, 1, 1));
    assert!((first.mean_prob_pos.unwrap() - (0.6 + 0.1 + 0.2) / 3.0).abs() < 1e-12);
}

#[test]
fn pos_and_neg_counts_cover_the_day_only_without_neutrals() {
    let session = ExchangeSession::default();
    let assignments: Vec<TradingDateAssignment> = [
        ("2024-06-03T08:00:00Z", Polarity::Positive),
        ("2024-06-03T08:10:00Z", Polarity::Negative),
        ("2024-06-04T08:00:00Z", Polarity::Neutral),
        ("2024-06-04T08:10:00Z", Polarity::Positive),
    ]
    .iter()
    .map(|(ts, l)| {
        let s = scored(ts, *l);
        let trade_date = session.trading_date(s.headline.timestamp, 30).unwrap();
        TradingDateAssignment { scored: s, trade_date }
    })
    .collect();
    let features = aggregate(&assignments);
    assert_eq!(features[0].pos_cnt + features[0].neg_cnt, features[0].n_headlines);
    assert!(features[1].pos_cnt + features[1].neg_cnt < features[1].n_headlines);
}

#[test]
fn metrics_over_a_week() {
    let features = vec![
        feature("2024-06-03", 3),
        feature("2024-06-04", -2),
        feature("2024-06-05", 0),
        feature("2024-06-06", 1),
        feature("2024-06-07", -1),
    ];
    let bars = vec![
        bar("2024-06-03", 100.0),
        bar("2024-06-04", 103.0),
        bar("2024-06-05", 101.0),
        bar("2024-06-06", 101.5),
        bar("2024-06-07", 100.0),
        bar("2024-06-10", 99.0),
    ];
    let eval = evaluate_run(&features, &bars, true);
    assert_eq!(eval.joined.len(), 5);
    let last = eval.joined.last().unwrap();
    assert_eq!(last.next_close, 99.0);

    // Mon up, Tue down, Wed neutral, Thu down vs +1, Fri down
    assert_eq!(eval.metrics.directional_days, 4);
    assert!((eval.metrics.directional_accuracy.unwrap() - 0.75).abs() < 1e-12);
    let corr = eval.metrics.corr_net_sent.unwrap();
    assert!(corr > 0.0 && corr <= 1.0);
    // identical probability means every day: zero variance
    assert_eq!(eval.metrics.corr_sent_gap, None);
}

#[test]
fn session_with_empty_close_breaks_the_join() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prices.csv");
    std::fs::write(&path, "date,close\n2024-06-03,100\n2024-06-04,\n2024-06-05,90\n2024-06-06,99\n").unwrap();
    let bars = CsvPriceProvider::new(&path).load().unwrap();
    assert_eq!(bars.len(), 4);

    let eval = evaluate_run(&[feature("2024-06-03", 1), feature("2024-06-05", 1)], &bars, true);
    let dates: Vec<_> = eval.joined.iter().map(|j| j.features.trade_date).collect();
    assert_eq!(dates, vec![d("2024-06-05")]);
    assert!((eval.joined[0].next_day_return - 0.1).abs() < 1e-12);
}
