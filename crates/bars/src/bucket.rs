//! Session bar building from raw bars.
//!
//! Raw observations are moved into the session's zone, tested against the
//! session window and truncated onto a fixed-width bucket grid. The last
//! admitted observation of every bucket becomes the bucket's close.

use chrono::offset::LocalResult;
use chrono::{Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use intraday_core::config::{validate_bucket_minutes, AdmissionRule};
use intraday_core::session::{minute_of_day, MINUTES_PER_DAY};
use intraday_core::{BucketedBar, RawBar, Result, SessionWindow, Timestamp};
use rust_decimal::Decimal;

use crate::merge::{dedup_last_wins, instrument_runs};

/// Counters describing one bucketing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketStats {
    /// Raw rows received.
    pub input: usize,
    /// Rows replaced by a later duplicate (instrument, timestamp).
    pub duplicates_dropped: usize,
    /// Rows that passed the session admission rule.
    pub admitted: usize,
    /// Rows outside the session.
    pub rejected_outside_session: usize,
    /// Buckets emitted.
    pub buckets: usize,
}

impl BucketStats {
    pub fn merge(&mut self, other: &BucketStats) {
        self.input += other.input;
        self.duplicates_dropped += other.duplicates_dropped;
        self.admitted += other.admitted;
        self.rejected_outside_session += other.rejected_outside_session;
        self.buckets += other.buckets;
    }
}

/// Output of a bucketing run.
#[derive(Debug, Clone, Default)]
pub struct BucketedBars {
    /// Bars sorted by (instrument, bucket start).
    pub bars: Vec<BucketedBar>,
    pub stats: BucketStats,
}

/// Builder for fixed-width session bars.
#[derive(Debug, Clone)]
pub struct SessionBarBuilder {
    session: SessionWindow,
    bucket_minutes: u32,
    offset_minutes: i32,
    admission: AdmissionRule,
}

/// Bucket currently collecting observations.
#[derive(Debug, Clone)]
struct OpenBucket {
    /// Bucket start on the shifted local clock.
    start: NaiveDateTime,
    close: Decimal,
    first_utc: Timestamp,
    last_utc: Timestamp,
    last_local: NaiveDateTime,
}

impl SessionBarBuilder {
    /// Create a builder for one session; fails on an unusable bucket width
    /// or session window.
    pub fn new(session: SessionWindow, bucket_minutes: u32) -> Result<Self> {
        validate_bucket_minutes(bucket_minutes)?;
        session.validate()?;
        Ok(Self {
            session,
            bucket_minutes,
            offset_minutes: 0,
            admission: AdmissionRule::default(),
        })
    }

    /// Shift the bucket grid by `offset_minutes`.
    pub fn with_offset(mut self, offset_minutes: i32) -> Self {
        self.offset_minutes = offset_minutes;
        self
    }

    /// Select the session admission rule.
    pub fn with_admission(mut self, admission: AdmissionRule) -> Self {
        self.admission = admission;
        self
    }

    pub fn session(&self) -> &SessionWindow {
        &self.session
    }

    /// Bucket an arbitrary raw series (any order, any number of instruments).
    pub fn build(&self, series: &[RawBar]) -> BucketedBars {
        let deduped = dedup_last_wins(series.to_vec());
        let mut stats = BucketStats {
            input: series.len(),
            duplicates_dropped: deduped.duplicates_dropped,
            ..BucketStats::default()
        };

        let mut bars = Vec::new();
        for run in instrument_runs(&deduped.bars) {
            bars.extend(self.build_sorted(run, &mut stats));
        }
        BucketedBars { bars, stats }
    }

    /// Bucket one instrument's series, already sorted and deduplicated.
    pub(crate) fn build_sorted(&self, run: &[RawBar], stats: &mut BucketStats) -> Vec<BucketedBar> {
        let Some(first) = run.first() else {
            return Vec::new();
        };
        let instrument_id = &first.instrument_id;

        let mut out = Vec::new();
        let mut open: Option<OpenBucket> = None;

        for bar in run {
            let local = self.shifted_local(bar.ts);
            let minute = minute_of_day(local.time());
            let bucket_minute = minute / self.bucket_minutes * self.bucket_minutes;

            if !self.admits(minute, bucket_minute) {
                stats.rejected_outside_session += 1;
                continue;
            }
            stats.admitted += 1;

            let start = local.date().and_time(time_of_minute(bucket_minute));
            match open.as_mut() {
                Some(bucket) if bucket.start == start => {
                    bucket.close = bar.close;
                    bucket.last_utc = bar.ts;
                    bucket.last_local = local;
                }
                _ => {
                    if let Some(done) = open.take() {
                        out.push(self.emit(instrument_id, done));
                    }
                    open = Some(OpenBucket {
                        start,
                        close: bar.close,
                        first_utc: bar.ts,
                        last_utc: bar.ts,
                        last_local: local,
                    });
                }
            }
        }

        if let Some(done) = open.take() {
            out.push(self.emit(instrument_id, done));
        }

        stats.buckets += out.len();
        out
    }

    /// Local wall-clock time in the session zone, minus the grid offset.
    fn shifted_local(&self, ts: Timestamp) -> NaiveDateTime {
        ts.with_timezone(&self.session.zone).naive_local()
            - Duration::minutes(i64::from(self.offset_minutes))
    }

    fn admits(&self, minute: u32, bucket_minute: u32) -> bool {
        match self.admission {
            AdmissionRule::PointInWindow => self.session.contains_minute(minute),
            AdmissionRule::IntervalOverlap => {
                let bucket_end = (bucket_minute + self.bucket_minutes - 1).min(MINUTES_PER_DAY - 1);
                self.session.overlaps_minutes(bucket_minute, bucket_end)
            }
        }
    }

    /// Convert a closed bucket back to UTC, re-applying the offset.
    fn emit(&self, instrument_id: &str, bucket: OpenBucket) -> BucketedBar {
        let local_start = bucket.start + Duration::minutes(i64::from(self.offset_minutes));
        let ts = match self.session.zone.from_local_datetime(&local_start) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            // Repeated fall-back hour: take the reading that does not come
            // after the bucket's first observation.
            LocalResult::Ambiguous(earliest, latest) => {
                let latest = latest.with_timezone(&Utc);
                if latest <= bucket.first_utc {
                    latest
                } else {
                    earliest.with_timezone(&Utc)
                }
            }
            // Bucket start sits in a DST gap: step back from the last observation.
            LocalResult::None => bucket.last_utc - (bucket.last_local - bucket.start),
        };
        BucketedBar {
            instrument_id: instrument_id.to_string(),
            ts,
            close: bucket.close,
        }
    }
}

fn time_of_minute(minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).unwrap_or(NaiveTime::MIN)
}

/// Bucket a raw series into one session with the default admission rule.
pub fn build_buckets(
    series: &[RawBar],
    bucket_minutes: u32,
    session: &SessionWindow,
    offset_minutes: i32,
) -> Result<BucketedBars> {
    let builder = SessionBarBuilder::new(session.clone(), bucket_minutes)?.with_offset(offset_minutes);
    Ok(builder.build(series))
}
