//! FX weight netting for the intraday pipeline.
//!
//! This crate handles:
//! - Ticker parsing into currency pairs
//! - The directional pivot-currency map (pair -> booked instrument)
//! - Netting theoretical weights into canonical currency exposures

pub mod canonical;
pub mod netter;
pub mod ticker;

pub use canonical::{build_usd_map, CanonicalizeStats, FxPairCanonicalizer, UsdMap};
pub use netter::{net_weights, net_weights_with_config, NettingOutcome, NettingStats, UncoveredLeg, WeightNetter};
pub use ticker::CurrencyPair;
