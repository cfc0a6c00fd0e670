//! Currency pair parsing from instrument tickers.

use serde::{Deserialize, Serialize};

/// Directional currency pair, e.g. EUR/USD.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Parse the first whitespace-delimited token of a ticker.
    ///
    /// The token must hold at least six characters: three for the base and
    /// three for the quote currency ("EURGBP Curncy" -> EUR/GBP). Codes are
    /// upper-cased. Returns `None` for shorter tokens.
    pub fn parse(ticker: &str) -> Option<Self> {
        let token = ticker.split_whitespace().next()?;
        let mut chars = token.chars();
        let base: String = chars.by_ref().take(3).collect();
        let quote: String = chars.take(3).collect();
        if base.chars().count() < 3 || quote.chars().count() < 3 {
            return None;
        }
        Some(Self::new(base.to_uppercase(), quote.to_uppercase()))
    }

    /// The same pair quoted the other way round.
    pub fn inverse(&self) -> Self {
        Self::new(self.quote.clone(), self.base.clone())
    }

    /// Whether either leg is `currency`.
    pub fn involves(&self, currency: &str) -> bool {
        self.base == currency || self.quote == currency
    }
}

impl std::fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}
