//! Calendar rollups of per-bar PnL.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate};
use intraday_core::InstrumentId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pnl::BarPnl;

/// Display names for instruments, e.g. 17 -> "EURUSD".
pub type PairLabels = HashMap<InstrumentId, String>;

/// Label for an instrument, falling back to its numeric id.
pub fn pair_label(labels: &PairLabels, instrument_id: InstrumentId) -> String {
    labels
        .get(&instrument_id)
        .cloned()
        .unwrap_or_else(|| instrument_id.to_string())
}

/// Rollup period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    /// Weeks start on Monday.
    Week,
    Month,
}

impl Period {
    /// First day of the period containing `date`.
    pub fn start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Day => date,
            Period::Week => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
            Period::Month => date.with_day(1).unwrap_or(date),
        }
    }
}

/// Aggregated performance of one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfRow {
    pub period_start: NaiveDate,
    pub gross: Decimal,
    pub cost: Decimal,
    pub net: Decimal,
    /// Bars contributing to the row.
    pub bars: usize,
    /// Share of bars with positive net PnL.
    pub hit_ratio: f64,
    /// Sum of absolute weight changes.
    pub turnover: Decimal,
}

/// Aggregated performance of one pair in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairPerfRow {
    pub pair: String,
    #[serde(flatten)]
    pub row: PerfRow,
}

#[derive(Default)]
struct Totals {
    gross: Decimal,
    cost: Decimal,
    net: Decimal,
    bars: usize,
    winning: usize,
    turnover: Decimal,
}

impl Totals {
    fn add(&mut self, bar: &BarPnl) {
        self.gross += bar.gross;
        self.cost += bar.cost;
        self.net += bar.net;
        self.turnover += bar.turnover;
        self.bars += 1;
        if bar.net > Decimal::ZERO {
            self.winning += 1;
        }
    }

    fn into_row(self, period_start: NaiveDate) -> PerfRow {
        let hit_ratio = if self.bars > 0 {
            self.winning as f64 / self.bars as f64
        } else {
            0.0
        };
        PerfRow {
            period_start,
            gross: self.gross,
            cost: self.cost,
            net: self.net,
            bars: self.bars,
            hit_ratio,
            turnover: self.turnover,
        }
    }
}

/// Portfolio rollup, one row per period in date order.
pub fn aggregate(pnl: &[BarPnl], period: Period) -> Vec<PerfRow> {
    let mut buckets: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    for bar in pnl {
        buckets.entry(period.start(bar.day())).or_default().add(bar);
    }
    buckets
        .into_iter()
        .map(|(start, totals)| totals.into_row(start))
        .collect()
}

/// Per-pair rollup sorted by (period, pair).
pub fn aggregate_by_pair(pnl: &[BarPnl], period: Period, labels: &PairLabels) -> Vec<PairPerfRow> {
    let mut buckets: BTreeMap<(NaiveDate, String), Totals> = BTreeMap::new();
    for bar in pnl {
        let key = (period.start(bar.day()), pair_label(labels, bar.instrument_id));
        buckets.entry(key).or_default().add(bar);
    }
    buckets
        .into_iter()
        .map(|((start, pair), totals)| PairPerfRow {
            pair,
            row: totals.into_row(start),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(id: InstrumentId, month: u32, day: u32, net: Decimal) -> BarPnl {
        BarPnl {
            instrument_id: id,
            ts: Utc.with_ymd_and_hms(2024, month, day, 15, 0, 0).unwrap(),
            weight: dec!(1),
            turnover: dec!(0.5),
            gross: net + dec!(0.01),
            cost: dec!(0.01),
            net,
        }
    }

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    #[test]
    fn test_period_start() {
        // 2024-01-10 is a Wednesday.
        assert_eq!(Period::Day.start(date(1, 10)), date(1, 10));
        assert_eq!(Period::Week.start(date(1, 10)), date(1, 8));
        assert_eq!(Period::Week.start(date(1, 8)), date(1, 8));
        assert_eq!(Period::Week.start(date(1, 7)), date(1, 1));
        assert_eq!(Period::Month.start(date(2, 29)), date(2, 1));
    }

    #[test]
    fn test_daily_rollup() {
        let pnl = vec![
            bar(1, 1, 8, dec!(0.02)),
            bar(2, 1, 8, dec!(-0.01)),
            bar(1, 1, 9, dec!(0.03)),
        ];
        let daily = aggregate(&pnl, Period::Day);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].period_start, date(1, 8));
        assert_eq!(daily[0].net, dec!(0.01));
        assert_eq!(daily[0].cost, dec!(0.02));
        assert_eq!(daily[0].gross, dec!(0.03));
        assert_eq!(daily[0].bars, 2);
        assert_eq!(daily[0].hit_ratio, 0.5);
        assert_eq!(daily[0].turnover, dec!(1.0));
    }

    #[test]
    fn test_weekly_and_monthly_rollup() {
        let pnl = vec![
            bar(1, 1, 29, dec!(1)),
            bar(1, 2, 2, dec!(2)),
            bar(1, 2, 5, dec!(4)),
        ];
        let weekly = aggregate(&pnl, Period::Week);
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].period_start, date(1, 29));
        assert_eq!(weekly[0].net, dec!(3));

        let monthly = aggregate(&pnl, Period::Month);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[1].period_start, date(2, 1));
        assert_eq!(monthly[1].net, dec!(6));
    }

    #[test]
    fn test_by_pair_uses_labels() {
        let labels: PairLabels = [(1, "EURUSD".to_string())].into_iter().collect();
        let pnl = vec![bar(1, 1, 8, dec!(1)), bar(2, 1, 8, dec!(2))];
        let rows = aggregate_by_pair(&pnl, Period::Day, &labels);
        let pairs: Vec<&str> = rows.iter().map(|r| r.pair.as_str()).collect();
        assert_eq!(pairs, vec!["2", "EURUSD"]);
        assert_eq!(rows[1].row.net, dec!(1));
    }
}
