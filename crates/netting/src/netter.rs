//! Netting of theoretical weights into canonical currency exposures.
//!
//! Every weight row is translated into signed contributions on instruments
//! found in the pivot map, then contributions sharing an (instrument,
//! timestamp) key are summed. Rows are folded into per-shard accumulators on
//! the rayon pool and the shards are merged in one reduce step.

use std::collections::{BTreeMap, BTreeSet};

use intraday_core::config::NettingConfig;
use intraday_core::{InstrumentId, NettedWeight, TheoreticalWeight, TickerRef, Timestamp};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::canonical::{CanonicalizeStats, FxPairCanonicalizer, UsdMap};
use crate::ticker::CurrencyPair;

/// Cross-pair leg whose currency has no pivot pair in the map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UncoveredLeg {
    /// Instrument of the weight row the leg came from.
    pub instrument_id: InstrumentId,
    pub ts: Timestamp,
    /// Currency that could not be mapped.
    pub currency: String,
    pub pair: CurrencyPair,
}

/// Counters describing one netting run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NettingStats {
    /// Weight rows received.
    pub rows: usize,
    /// Rows skipped because the ticker is not a currency pair.
    pub malformed_tickers: usize,
    /// Rows with a pivot leg.
    pub usd_rows: usize,
    /// Rows split into two pivot legs.
    pub cross_rows: usize,
    /// Pivot rows moved onto another instrument.
    pub rekeyed: usize,
    /// Cross legs dropped for lack of a mapping.
    pub uncovered_legs: usize,
}

impl NettingStats {
    pub fn merge(&mut self, other: &NettingStats) {
        self.rows += other.rows;
        self.malformed_tickers += other.malformed_tickers;
        self.usd_rows += other.usd_rows;
        self.cross_rows += other.cross_rows;
        self.rekeyed += other.rekeyed;
        self.uncovered_legs += other.uncovered_legs;
    }
}

/// Result of a netting run.
#[derive(Debug, Clone, Default)]
pub struct NettingOutcome {
    /// Summed exposures sorted by (instrument, timestamp).
    pub weights: Vec<NettedWeight>,
    pub stats: NettingStats,
    /// Dropped cross legs sorted by (instrument, timestamp).
    pub uncovered: Vec<UncoveredLeg>,
    /// Counters of the ticker lookup the map was built from; left at zero
    /// when the netter was handed a ready map.
    pub lookup: CanonicalizeStats,
}

impl NettingOutcome {
    /// Netted weight for one key, if any contribution landed there.
    pub fn weight(&self, instrument_id: InstrumentId, ts: Timestamp) -> Option<Decimal> {
        self.weights
            .binary_search_by(|w| (w.instrument_id, w.ts).cmp(&(instrument_id, ts)))
            .ok()
            .map(|i| self.weights[i].weight)
    }
}

#[derive(Default)]
struct Accumulator {
    sums: BTreeMap<(InstrumentId, Timestamp), Decimal>,
    stats: NettingStats,
    uncovered: Vec<UncoveredLeg>,
}

impl Accumulator {
    fn add(&mut self, instrument_id: InstrumentId, ts: Timestamp, weight: Decimal) {
        *self.sums.entry((instrument_id, ts)).or_insert(Decimal::ZERO) += weight;
    }

    fn merge(mut self, other: Accumulator) -> Accumulator {
        // Fold the smaller map into the larger one.
        let (mut into, from) = if self.sums.len() >= other.sums.len() {
            (self.sums, other.sums)
        } else {
            (other.sums, self.sums)
        };
        for (key, weight) in from {
            *into.entry(key).or_insert(Decimal::ZERO) += weight;
        }
        self.sums = into;
        self.stats.merge(&other.stats);
        self.uncovered.extend(other.uncovered);
        self
    }
}

/// Nets theoretical weights against a pivot-currency map.
#[derive(Debug, Clone)]
pub struct WeightNetter {
    map: UsdMap,
}

impl WeightNetter {
    pub fn new(map: UsdMap) -> Self {
        Self { map }
    }

    pub fn map(&self) -> &UsdMap {
        &self.map
    }

    /// Net all rows into per-(instrument, timestamp) sums.
    pub fn net(&self, weights: &[TheoreticalWeight]) -> NettingOutcome {
        let acc = weights
            .par_iter()
            .fold(Accumulator::default, |mut acc, row| {
                self.apply(row, &mut acc);
                acc
            })
            .reduce(Accumulator::default, Accumulator::merge);

        let Accumulator {
            sums,
            stats,
            mut uncovered,
        } = acc;
        uncovered.sort();

        let weights: Vec<NettedWeight> = sums
            .into_iter()
            .map(|((instrument_id, ts), weight)| NettedWeight {
                instrument_id,
                ts,
                weight,
            })
            .collect();

        if !uncovered.is_empty() {
            let currencies: BTreeSet<&str> =
                uncovered.iter().map(|l| l.currency.as_str()).collect();
            warn!(
                legs = uncovered.len(),
                currencies = ?currencies,
                pivot = %self.map.pivot(),
                "cross legs without a pivot pair were dropped"
            );
        }
        info!(
            rows = stats.rows,
            netted = weights.len(),
            usd_rows = stats.usd_rows,
            cross_rows = stats.cross_rows,
            rekeyed = stats.rekeyed,
            malformed = stats.malformed_tickers,
            uncovered = stats.uncovered_legs,
            "weights netted"
        );

        NettingOutcome {
            weights,
            stats,
            uncovered,
            lookup: CanonicalizeStats::default(),
        }
    }

    /// Canonical instrument and signed weight for a row with a pivot leg.
    ///
    /// Pivot as base (USD/CHF) moves onto `(quote, pivot)` with the sign
    /// flipped; pivot as quote moves onto `(base, pivot)` unchanged. Without
    /// a matching entry the row keeps its own instrument and sign.
    pub fn normalize_usd_pair(
        &self,
        pair: &CurrencyPair,
        instrument_id: InstrumentId,
        weight: Decimal,
    ) -> (InstrumentId, Decimal) {
        let pivot = self.map.pivot();
        if pair.base == pivot {
            if let Some(id) = self.map.get(&pair.quote, pivot) {
                return (id, -weight);
            }
        } else if pair.quote == pivot {
            if let Some(id) = self.map.get(&pair.base, pivot) {
                return (id, weight);
            }
        }
        (instrument_id, weight)
    }

    /// Exposure of `weight` long `currency` against the pivot.
    fn pivot_leg(&self, currency: &str, weight: Decimal) -> Option<(InstrumentId, Decimal)> {
        let pivot = self.map.pivot();
        if let Some(id) = self.map.get(currency, pivot) {
            return Some((id, weight));
        }
        self.map.get(pivot, currency).map(|id| (id, -weight))
    }

    fn apply(&self, row: &TheoreticalWeight, acc: &mut Accumulator) {
        acc.stats.rows += 1;
        let Some(pair) = CurrencyPair::parse(&row.ticker) else {
            acc.stats.malformed_tickers += 1;
            debug!(instrument = row.instrument_id, ticker = %row.ticker, "malformed ticker on weight row");
            return;
        };

        if pair.involves(self.map.pivot()) {
            acc.stats.usd_rows += 1;
            let (id, weight) = self.normalize_usd_pair(&pair, row.instrument_id, row.weight);
            if id != row.instrument_id {
                acc.stats.rekeyed += 1;
            }
            acc.add(id, row.ts, weight);
            return;
        }

        acc.stats.cross_rows += 1;
        // Long base/quote is long base and short quote.
        let legs = [(&pair.base, row.weight), (&pair.quote, -row.weight)];
        for (currency, weight) in legs {
            match self.pivot_leg(currency, weight) {
                Some((id, w)) => acc.add(id, row.ts, w),
                None => {
                    acc.stats.uncovered_legs += 1;
                    acc.uncovered.push(UncoveredLeg {
                        instrument_id: row.instrument_id,
                        ts: row.ts,
                        currency: currency.clone(),
                        pair: pair.clone(),
                    });
                }
            }
        }
    }
}

/// Build the USD map from `ticker_lookup` and net `weights` against it.
pub fn net_weights(weights: &[TheoreticalWeight], ticker_lookup: &[TickerRef]) -> NettingOutcome {
    net_with_canonicalizer(weights, ticker_lookup, &FxPairCanonicalizer::default())
}

/// Same as [`net_weights`] with the pivot currency taken from `config`.
pub fn net_weights_with_config(
    weights: &[TheoreticalWeight],
    ticker_lookup: &[TickerRef],
    config: &NettingConfig,
) -> NettingOutcome {
    net_with_canonicalizer(weights, ticker_lookup, &FxPairCanonicalizer::from_config(config))
}

fn net_with_canonicalizer(
    weights: &[TheoreticalWeight],
    ticker_lookup: &[TickerRef],
    canonicalizer: &FxPairCanonicalizer,
) -> NettingOutcome {
    let (map, lookup) = canonicalizer.build(ticker_lookup);
    let mut outcome = WeightNetter::new(map).net(weights);
    outcome.lookup = lookup;
    outcome
}
