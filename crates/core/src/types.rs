//! Core data types for the intraday pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Numeric identifier of a booked instrument (security id).
pub type InstrumentId = i64;

/// Instant in UTC.
pub type Timestamp = DateTime<Utc>;

/// A single raw price observation as read from files or the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBar {
    /// Instrument the observation belongs to.
    pub instrument_id: String,
    /// Observation time.
    pub ts: Timestamp,
    /// Close price.
    pub close: Decimal,
}

impl RawBar {
    pub fn new(instrument_id: impl Into<String>, ts: Timestamp, close: Decimal) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            ts,
            close,
        }
    }
}

/// One coarse bar per (instrument, bucket, session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketedBar {
    /// Instrument the bar belongs to.
    pub instrument_id: String,
    /// Bucket start, converted back to UTC.
    pub ts: Timestamp,
    /// Last admitted close inside the bucket.
    pub close: Decimal,
}

/// A bucketed bar re-expressed through the reverse return chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatBar {
    /// Instrument the bar belongs to.
    pub instrument_id: String,
    /// Bucket start (UTC), unchanged from the bucketed bar.
    pub ts: Timestamp,
    /// Flattened close.
    pub close: Decimal,
    /// Session the bar was built for.
    pub session: String,
}

/// Known ticker for an instrument, used to build the USD map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerRef {
    pub instrument_id: InstrumentId,
    pub ticker: String,
}

impl TickerRef {
    pub fn new(instrument_id: InstrumentId, ticker: impl Into<String>) -> Self {
        Self {
            instrument_id,
            ticker: ticker.into(),
        }
    }
}

/// Model output weight for one instrument at one timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheoreticalWeight {
    pub instrument_id: InstrumentId,
    pub ts: Timestamp,
    pub weight: Decimal,
    /// Ticker of the instrument, e.g. "EURGBP Curncy".
    pub ticker: String,
}

impl TheoreticalWeight {
    pub fn new(
        instrument_id: InstrumentId,
        ts: Timestamp,
        weight: Decimal,
        ticker: impl Into<String>,
    ) -> Self {
        Self {
            instrument_id,
            ts,
            weight,
            ticker: ticker.into(),
        }
    }
}

/// Exposure on a canonical currency instrument after netting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NettedWeight {
    /// Canonical instrument the exposure was folded into.
    pub instrument_id: InstrumentId,
    pub ts: Timestamp,
    /// Sum of all signed contributions for the key.
    pub weight: Decimal,
}

/// Price observation keyed by numeric instrument id, used for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub instrument_id: InstrumentId,
    pub ts: Timestamp,
    pub price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_raw_bar_json_keeps_decimal_exact() {
        let bar = RawBar::new(
            "100001",
            Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap(),
            dec!(1.08765),
        );
        let json = serde_json::to_string(&bar).unwrap();
        assert!(json.contains("\"1.08765\""));
        let back: RawBar = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bar);
    }
}
