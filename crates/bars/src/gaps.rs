//! Coverage gap detection on raw history.
//!
//! A long hole in an instrument's daily coverage usually means a feed or
//! export problem upstream. Gaps are reported, never fatal.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use intraday_core::config::BarConfig;
use intraday_core::RawBar;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Consecutive covered days further apart than the configured limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub instrument_id: String,
    /// Last covered day before the gap.
    pub from: NaiveDate,
    /// First covered day after the gap.
    pub to: NaiveDate,
    /// Calendar days between `from` and `to`.
    pub days: i64,
}

/// Find gaps longer than `limit_days` between covered UTC days.
pub fn find_coverage_gaps(bars: &[RawBar], limit_days: i64) -> Vec<CoverageGap> {
    let mut days: BTreeMap<&str, BTreeSet<NaiveDate>> = BTreeMap::new();
    for bar in bars {
        days.entry(bar.instrument_id.as_str())
            .or_default()
            .insert(bar.ts.date_naive());
    }

    let mut gaps = Vec::new();
    for (instrument_id, covered) in days {
        let covered: Vec<NaiveDate> = covered.into_iter().collect();
        for pair in covered.windows(2) {
            let days = (pair[1] - pair[0]).num_days();
            if days > limit_days {
                warn!(
                    instrument = instrument_id,
                    from = %pair[0],
                    to = %pair[1],
                    days,
                    "coverage gap"
                );
                gaps.push(CoverageGap {
                    instrument_id: instrument_id.to_string(),
                    from: pair[0],
                    to: pair[1],
                    days,
                });
            }
        }
    }
    gaps
}

/// Find gaps longer than the configured `gap_limit_days`.
pub fn find_coverage_gaps_with_config(bars: &[RawBar], config: &BarConfig) -> Vec<CoverageGap> {
    find_coverage_gaps(bars, config.gap_limit_days)
}
