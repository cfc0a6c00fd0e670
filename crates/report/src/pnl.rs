//! Per-bar PnL of netted weights on their price timelines.
//!
//! A weight set at price bar `t` earns the return from bar `t+lag-1` to bar
//! `t+lag`, and the result is stamped at bar `t+lag`. Cost is charged on the
//! turnover into bar `t` and stamped on the same bar as its PnL.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use intraday_core::config::ReportConfig;
use intraday_core::{Error, InstrumentId, NettedWeight, PricePoint, Result, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// PnL of one instrument on one price bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarPnl {
    pub instrument_id: InstrumentId,
    /// Price bar the PnL is realized on.
    pub ts: Timestamp,
    /// Weight that earned the return.
    pub weight: Decimal,
    /// |w_t - w_{t-1}|.
    pub turnover: Decimal,
    pub gross: Decimal,
    pub cost: Decimal,
    pub net: Decimal,
}

impl BarPnl {
    /// UTC calendar day of the PnL.
    pub fn day(&self) -> NaiveDate {
        self.ts.date_naive()
    }
}

/// Counters describing one PnL computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnlStats {
    /// Instruments with both weights and prices.
    pub instruments: usize,
    /// Bars produced after date filtering.
    pub bars: usize,
    /// Instruments with weights but no price series (skipped).
    pub unpriced_instruments: usize,
    /// Returns forced to zero by a zero prior price.
    pub zero_price_guards: usize,
    /// Bars dropped by the date filter.
    pub filtered_out: usize,
}

/// PnL calculator.
#[derive(Debug, Clone)]
pub struct PnlEngine {
    cost_bps: Decimal,
    lag: usize,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
}

impl PnlEngine {
    pub fn new(cost_bps: Decimal, lag: usize) -> Self {
        Self {
            cost_bps,
            lag,
            from_date: None,
            to_date: None,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.cost_bps, config.pnl_lag_bars).with_dates(config.from_date, config.to_date)
    }

    /// Keep only PnL stamped on days within `from..=to`.
    pub fn with_dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from_date = from;
        self.to_date = to;
        self
    }

    /// Compute per-bar PnL sorted by (instrument, timestamp).
    ///
    /// Weights are aligned on each instrument's price timeline as of the
    /// price bar: the latest weight at or before the bar applies, zero
    /// before the first one.
    pub fn compute(
        &self,
        weights: &[NettedWeight],
        prices: &[PricePoint],
    ) -> Result<(Vec<BarPnl>, PnlStats)> {
        if self.lag == 0 {
            return Err(Error::config("pnl lag must be at least one bar"));
        }
        if prices.is_empty() {
            return Err(Error::data("no prices to compute PnL on"));
        }

        let mut price_map: BTreeMap<InstrumentId, BTreeMap<Timestamp, Decimal>> = BTreeMap::new();
        for p in prices {
            price_map.entry(p.instrument_id).or_default().insert(p.ts, p.price);
        }
        let mut weight_map: BTreeMap<InstrumentId, BTreeMap<Timestamp, Decimal>> = BTreeMap::new();
        for w in weights {
            weight_map.entry(w.instrument_id).or_default().insert(w.ts, w.weight);
        }

        let mut stats = PnlStats::default();
        let mut out = Vec::new();
        for (instrument_id, series) in &weight_map {
            let Some(price_series) = price_map.get(instrument_id) else {
                stats.unpriced_instruments += 1;
                warn!(instrument = instrument_id, "weights without prices skipped");
                continue;
            };
            stats.instruments += 1;
            let before = out.len();
            self.instrument_pnl(*instrument_id, series, price_series, &mut stats, &mut out);
            debug!(instrument = instrument_id, bars = out.len() - before, "instrument pnl");
        }
        stats.bars = out.len();
        Ok((out, stats))
    }

    fn instrument_pnl(
        &self,
        instrument_id: InstrumentId,
        weights: &BTreeMap<Timestamp, Decimal>,
        prices: &BTreeMap<Timestamp, Decimal>,
        stats: &mut PnlStats,
        out: &mut Vec<BarPnl>,
    ) {
        let prices: Vec<(Timestamp, Decimal)> = prices.iter().map(|(ts, p)| (*ts, *p)).collect();
        let aligned = align_as_of(weights, &prices);
        let cost_rate = self.cost_bps / Decimal::from(10_000);

        for t in 0..prices.len() {
            let s = t + self.lag;
            if s >= prices.len() {
                break;
            }
            let (ts, price) = prices[s];
            let prev = prices[s - 1].1;
            let ret = match (price - prev).checked_div(prev) {
                Some(r) => r,
                None => {
                    stats.zero_price_guards += 1;
                    Decimal::ZERO
                }
            };

            let weight = aligned[t];
            let prior = if t > 0 { aligned[t - 1] } else { Decimal::ZERO };
            let turnover = (weight - prior).abs();
            let gross = weight * ret;
            let cost = cost_rate * turnover;

            if !self.in_range(ts.date_naive()) {
                stats.filtered_out += 1;
                continue;
            }
            out.push(BarPnl {
                instrument_id,
                ts,
                weight,
                turnover,
                gross,
                cost,
                net: gross - cost,
            });
        }
    }

    fn in_range(&self, day: NaiveDate) -> bool {
        self.from_date.map_or(true, |from| day >= from) && self.to_date.map_or(true, |to| day <= to)
    }
}

/// Weight in force at every price bar.
fn align_as_of(weights: &BTreeMap<Timestamp, Decimal>, prices: &[(Timestamp, Decimal)]) -> Vec<Decimal> {
    let mut aligned = Vec::with_capacity(prices.len());
    let mut current = Decimal::ZERO;
    let mut pending = weights.iter().peekable();
    for (ts, _) in prices {
        while let Some((wts, w)) = pending.peek() {
            if *wts > ts {
                break;
            }
            current = **w;
            pending.next();
        }
        aligned.push(current);
    }
    aligned
}
