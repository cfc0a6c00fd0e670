//! Reverse-chained flattening of bucketed bars.
//!
//! Every bar is re-expressed by walking the observed returns backwards from
//! the most recent close, so the whole history shares the level of the last
//! price. Returns never compound across a session-local date change.

use chrono::NaiveDate;
use intraday_core::{BucketedBar, Error, FlatBar, Result, SessionWindow};
use rust_decimal::Decimal;

/// Counters describing one flattening run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenStats {
    /// Bars flattened.
    pub bars: usize,
    /// Returns forced to zero by a local date change.
    pub day_resets: usize,
    /// Returns forced to zero by a zero price.
    pub zero_price_guards: usize,
}

impl FlattenStats {
    pub fn merge(&mut self, other: &FlattenStats) {
        self.bars += other.bars;
        self.day_resets += other.day_resets;
        self.zero_price_guards += other.zero_price_guards;
    }
}

/// Output of a flattening run.
#[derive(Debug, Clone, Default)]
pub struct FlatBars {
    pub bars: Vec<FlatBar>,
    pub stats: FlattenStats,
}

/// Flattener bound to one session (its zone defines calendar dates).
#[derive(Debug, Clone)]
pub struct BarFlattener<'a> {
    session: &'a SessionWindow,
}

impl<'a> BarFlattener<'a> {
    pub fn new(session: &'a SessionWindow) -> Self {
        Self { session }
    }

    /// Flatten one instrument's bars, which must be in chronological order.
    pub fn flatten(&self, bars: &[BucketedBar]) -> Result<FlatBars> {
        check_single_chronological(bars)?;

        let mut stats = FlattenStats {
            bars: bars.len(),
            ..FlattenStats::default()
        };
        let returns = self.returns(bars, &mut stats);

        let n = bars.len();
        let mut flat = vec![Decimal::ZERO; n];
        if let Some(last) = bars.last() {
            flat[n - 1] = last.close;
        }
        for i in (0..n.saturating_sub(1)).rev() {
            let growth = Decimal::ONE + returns[i + 1];
            flat[i] = match flat[i + 1].checked_div(growth) {
                Some(value) => value,
                None => {
                    // Next close was exactly zero: carry the level unchanged.
                    stats.zero_price_guards += 1;
                    flat[i + 1]
                }
            };
        }

        let session = &self.session.name;
        let bars = bars
            .iter()
            .zip(flat)
            .map(|(bar, close)| FlatBar {
                instrument_id: bar.instrument_id.clone(),
                ts: bar.ts,
                close,
                session: session.clone(),
            })
            .collect();

        Ok(FlatBars { bars, stats })
    }

    /// Flatten bars of any number of instruments; input must be sorted by
    /// (instrument, timestamp) as produced by the bucket builder.
    pub fn flatten_all(&self, bars: &[BucketedBar]) -> Result<FlatBars> {
        let mut out = FlatBars::default();
        let mut start = 0;
        for i in 1..=bars.len() {
            if i == bars.len() || bars[i].instrument_id != bars[start].instrument_id {
                if i > start {
                    let part = self.flatten(&bars[start..i])?;
                    out.stats.merge(&part.stats);
                    out.bars.extend(part.bars);
                }
                start = i;
            }
        }
        Ok(out)
    }

    /// Simple returns with day resets and zero-price guards; `r[0] = 0`.
    fn returns(&self, bars: &[BucketedBar], stats: &mut FlattenStats) -> Vec<Decimal> {
        let mut returns = vec![Decimal::ZERO; bars.len()];
        let mut prev_date: Option<NaiveDate> = None;

        for (i, bar) in bars.iter().enumerate() {
            let date = self.local_date(bar);
            if i > 0 {
                let prev = bars[i - 1].close;
                if prev_date != Some(date) {
                    stats.day_resets += 1;
                } else if prev.is_zero() {
                    stats.zero_price_guards += 1;
                } else {
                    returns[i] = match (bar.close - prev).checked_div(prev) {
                        Some(r) => r,
                        None => {
                            stats.zero_price_guards += 1;
                            Decimal::ZERO
                        }
                    };
                }
            }
            prev_date = Some(date);
        }
        returns
    }

    fn local_date(&self, bar: &BucketedBar) -> NaiveDate {
        bar.ts.with_timezone(&self.session.zone).date_naive()
    }
}

fn check_single_chronological(bars: &[BucketedBar]) -> Result<()> {
    for pair in bars.windows(2) {
        if pair[0].instrument_id != pair[1].instrument_id {
            return Err(Error::data(format!(
                "flatten expects one instrument, got {} and {}",
                pair[0].instrument_id, pair[1].instrument_id
            )));
        }
        if pair[1].ts < pair[0].ts {
            return Err(Error::data(format!(
                "bars for {} are not chronological at {}",
                pair[1].instrument_id, pair[1].ts
            )));
        }
    }
    Ok(())
}

/// Flatten one instrument's chronological bars for a session.
pub fn flatten(bars: &[BucketedBar], session: &SessionWindow) -> Result<FlatBars> {
    BarFlattener::new(session).flatten(bars)
}
