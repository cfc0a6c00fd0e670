//! Directional map from pivot-currency pairs to booked instruments.
//!
//! Both a pair and its inverse may be booked as separate instruments; the
//! map keeps both keys. Folding them into one exposure is the netter's job.

use std::collections::HashMap;

use intraday_core::config::NettingConfig;
use intraday_core::{InstrumentId, TickerRef};
use tracing::{debug, info};

use crate::ticker::CurrencyPair;

/// Pair -> instrument lookup for pairs with a pivot-currency leg.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsdMap {
    pivot: String,
    pairs: HashMap<CurrencyPair, InstrumentId>,
}

impl UsdMap {
    pub fn new(pivot: impl Into<String>) -> Self {
        Self {
            pivot: pivot.into(),
            pairs: HashMap::new(),
        }
    }

    /// Insert a directional pair; returns the id it replaced, if any.
    pub fn insert(&mut self, pair: CurrencyPair, instrument_id: InstrumentId) -> Option<InstrumentId> {
        self.pairs.insert(pair, instrument_id)
    }

    /// Instrument booked for `base/quote`, in that direction.
    pub fn get(&self, base: &str, quote: &str) -> Option<InstrumentId> {
        self.pairs.get(&CurrencyPair::new(base, quote)).copied()
    }

    /// Currency every pair in the map is quoted against.
    pub fn pivot(&self) -> &str {
        &self.pivot
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Counters describing one map build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalizeStats {
    /// Tickers received.
    pub tickers: usize,
    /// Tickers whose first token is shorter than six characters.
    pub malformed: usize,
    /// Well-formed pairs without a pivot leg (not mapped).
    pub non_pivot: usize,
    /// Directional keys seen more than once (last id kept).
    pub replaced: usize,
}

/// Builds the pivot-currency map from known tickers.
#[derive(Debug, Clone)]
pub struct FxPairCanonicalizer {
    pivot: String,
}

impl FxPairCanonicalizer {
    pub fn new(pivot: impl Into<String>) -> Self {
        Self {
            pivot: pivot.into().to_uppercase(),
        }
    }

    pub fn from_config(config: &NettingConfig) -> Self {
        Self::new(config.pivot_currency.clone())
    }

    /// Map every pivot-involved ticker to its instrument.
    pub fn build(&self, tickers: &[TickerRef]) -> (UsdMap, CanonicalizeStats) {
        let mut map = UsdMap::new(self.pivot.clone());
        let mut stats = CanonicalizeStats {
            tickers: tickers.len(),
            ..CanonicalizeStats::default()
        };

        for t in tickers {
            let Some(pair) = CurrencyPair::parse(&t.ticker) else {
                stats.malformed += 1;
                debug!(instrument = t.instrument_id, ticker = %t.ticker, "malformed ticker skipped");
                continue;
            };
            if !pair.involves(&self.pivot) {
                stats.non_pivot += 1;
                continue;
            }
            if let Some(previous) = map.insert(pair.clone(), t.instrument_id) {
                stats.replaced += 1;
                debug!(pair = %pair, previous, current = t.instrument_id, "pair booked twice, keeping last");
            }
        }

        info!(
            pivot = %self.pivot,
            pairs = map.len(),
            malformed = stats.malformed,
            non_pivot = stats.non_pivot,
            "currency map built"
        );
        (map, stats)
    }
}

impl Default for FxPairCanonicalizer {
    fn default() -> Self {
        Self::from_config(&NettingConfig::default())
    }
}

/// Build the USD map from known tickers.
pub fn build_usd_map(tickers: &[TickerRef]) -> (UsdMap, CanonicalizeStats) {
    FxPairCanonicalizer::default().build(tickers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_and_inverse_both_kept() {
        let (map, stats) = build_usd_map(&[
            TickerRef::new(1, "AUDUSD Curncy"),
            TickerRef::new(2, "USDAUD Curncy"),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(stats.replaced, 0);
        assert_eq!(map.get("AUD", "USD"), Some(1));
        assert_eq!(map.get("USD", "AUD"), Some(2));
    }

    #[test]
    fn test_skips_malformed_and_crosses() {
        let (map, stats) = FxPairCanonicalizer::new("usd").build(&[
            TickerRef::new(1, "EURUSD Curncy"),
            TickerRef::new(2, "EUR"),
            TickerRef::new(3, "EURGBP Curncy"),
        ]);
        assert_eq!(map.pivot(), "USD");
        assert_eq!(map.len(), 1);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.non_pivot, 1);
        assert_eq!(map.get("EUR", "GBP"), None);
    }

    #[test]
    fn test_repeated_key_keeps_last() {
        let (map, stats) = FxPairCanonicalizer::default().build(&[
            TickerRef::new(7, "GBPUSD Curncy"),
            TickerRef::new(9, "GBPUSD BGN Curncy"),
        ]);
        assert_eq!(map.get("GBP", "USD"), Some(9));
        assert_eq!(stats.replaced, 1);
    }
}
