use chrono::{Duration, TimeZone, Utc};
use intraday_core::{TheoreticalWeight, TickerRef};
use intraday_netting::{net_weights, FxPairCanonicalizer, WeightNetter};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn book() -> Vec<TickerRef> {
    vec![
        TickerRef::new(1, "AUDUSD Curncy"),
        TickerRef::new(2, "USDAUD Curncy"),
        TickerRef::new(3, "EURUSD Curncy"),
        TickerRef::new(4, "USDJPY Curncy"),
        TickerRef::new(5, "EURJPY Curncy"),
    ]
}

#[test]
fn test_direction_invariance_across_inverse_books() {
    // Same economic exposure booked both ways nets to the same number.
    let ts = Utc.with_ymd_and_hms(2024, 2, 1, 15, 0, 0).unwrap();
    let via_audusd = net_weights(
        &[TheoreticalWeight::new(1, ts, dec!(0.25), "AUDUSD Curncy")],
        &book(),
    );
    let via_usdaud = net_weights(
        &[TheoreticalWeight::new(2, ts, dec!(-0.25), "USDAUD Curncy")],
        &book(),
    );
    assert_eq!(via_audusd.weights, via_usdaud.weights);
    assert_eq!(via_audusd.weight(1, ts), Some(dec!(0.25)));
}

#[test]
fn test_many_rows_net_like_sequential_sum() {
    let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let mut rows = Vec::new();
    for i in 0..500i64 {
        let ts = start + Duration::hours(i % 24);
        let w = Decimal::new(i % 7 - 3, 2);
        rows.push(TheoreticalWeight::new(5, ts, w, "EURJPY Curncy"));
        rows.push(TheoreticalWeight::new(3, ts, -w, "EURUSD Curncy"));
    }
    let (map, stats) = FxPairCanonicalizer::new("USD").build(&book());
    assert_eq!(stats.non_pivot, 1);
    let out = WeightNetter::new(map).net(&rows);

    assert_eq!(out.stats.rows, 1000);
    assert_eq!(out.stats.cross_rows, 500);
    // EUR legs cancel exactly; the USD/JPY leg carries the cross weight.
    for w in out.weights.iter().filter(|w| w.instrument_id == 3) {
        assert_eq!(w.weight, Decimal::ZERO);
    }
    let jpy_total: Decimal = out
        .weights
        .iter()
        .filter(|w| w.instrument_id == 4)
        .map(|w| w.weight)
        .sum();
    let expected: Decimal = (0..500i64).map(|i| Decimal::new(i % 7 - 3, 2)).sum();
    assert_eq!(jpy_total, expected);
}
