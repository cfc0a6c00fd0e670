//! Merging of raw bar sources.
//!
//! Raw history usually comes from more than one place (flat files plus the
//! database). Rows are merged in priority order and the last value wins for
//! every (instrument, timestamp).

use intraday_core::RawBar;

/// Raw bars sorted by (instrument, timestamp) with duplicates removed.
#[derive(Debug, Clone, Default)]
pub struct Deduped {
    pub bars: Vec<RawBar>,
    /// Rows replaced by a later row with the same key.
    pub duplicates_dropped: usize,
}

/// Sort by (instrument, timestamp) and keep the last row of every key.
///
/// The sort is stable, so "last" means last in input order.
pub fn dedup_last_wins(mut bars: Vec<RawBar>) -> Deduped {
    bars.sort_by(|a, b| {
        a.instrument_id
            .cmp(&b.instrument_id)
            .then_with(|| a.ts.cmp(&b.ts))
    });

    let mut out: Vec<RawBar> = Vec::with_capacity(bars.len());
    let mut duplicates_dropped = 0;
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.instrument_id == bar.instrument_id && last.ts == bar.ts => {
                *last = bar;
                duplicates_dropped += 1;
            }
            _ => out.push(bar),
        }
    }

    Deduped {
        bars: out,
        duplicates_dropped,
    }
}

/// Concatenate sources in priority order (later sources win) and dedupe.
pub fn merge_sources<I>(sources: I) -> Deduped
where
    I: IntoIterator<Item = Vec<RawBar>>,
{
    let merged: Vec<RawBar> = sources.into_iter().flatten().collect();
    dedup_last_wins(merged)
}

/// Split a sorted series into per-instrument runs.
pub(crate) fn instrument_runs(bars: &[RawBar]) -> Vec<&[RawBar]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=bars.len() {
        if i == bars.len() || bars[i].instrument_id != bars[start].instrument_id {
            if i > start {
                runs.push(&bars[start..i]);
            }
            start = i;
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(id: &str, minute: u32, close: rust_decimal::Decimal) -> RawBar {
        RawBar::new(
            id,
            Utc.with_ymd_and_hms(2024, 1, 2, 14, minute, 0).unwrap(),
            close,
        )
    }

    #[test]
    fn test_last_value_wins() {
        let deduped = dedup_last_wins(vec![
            bar("A", 5, dec!(1.0)),
            bar("A", 1, dec!(0.5)),
            bar("A", 5, dec!(2.0)),
        ]);
        assert_eq!(deduped.duplicates_dropped, 1);
        assert_eq!(deduped.bars.len(), 2);
        assert_eq!(deduped.bars[0].close, dec!(0.5));
        assert_eq!(deduped.bars[1].close, dec!(2.0));
    }

    #[test]
    fn test_later_source_wins() {
        let file = vec![bar("A", 0, dec!(10)), bar("B", 0, dec!(20))];
        let db = vec![bar("A", 0, dec!(11))];
        let merged = merge_sources(vec![file, db]);
        assert_eq!(merged.bars.len(), 2);
        assert_eq!(merged.bars[0].instrument_id, "A");
        assert_eq!(merged.bars[0].close, dec!(11));
        assert_eq!(merged.bars[1].close, dec!(20));
    }

    #[test]
    fn test_instrument_runs() {
        let deduped = dedup_last_wins(vec![
            bar("B", 0, dec!(1)),
            bar("A", 0, dec!(1)),
            bar("A", 1, dec!(1)),
        ]);
        let runs = instrument_runs(&deduped.bars);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 2);
        assert_eq!(runs[1][0].instrument_id, "B");
        assert!(instrument_runs(&[]).is_empty());
    }
}
