//! Raw bars to flat bars for a set of sessions.
//!
//! Inputs are merged once, then every (session, instrument) pair is bucketed
//! and flattened independently on the rayon pool.

use intraday_core::config::{validate_bucket_minutes, AdmissionRule, BarConfig};
use intraday_core::{Config, Error, FlatBar, RawBar, Result, SessionCalendar, SessionWindow};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::bucket::{BucketStats, SessionBarBuilder};
use crate::flatten::{BarFlattener, FlatBars, FlattenStats};
use crate::merge::{dedup_last_wins, instrument_runs};

/// Aggregated counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub instruments: usize,
    pub sessions: usize,
    pub bucket: BucketStats,
    pub flatten: FlattenStats,
}

/// Flat bars sorted by (session order, instrument, timestamp).
#[derive(Debug, Clone, Default)]
pub struct FlatBarRun {
    pub bars: Vec<FlatBar>,
    pub stats: PipelineStats,
}

impl FlatBarRun {
    /// Bars of one session.
    pub fn session_bars<'a>(&'a self, session: &'a str) -> impl Iterator<Item = &'a FlatBar> + 'a {
        self.bars.iter().filter(move |b| b.session == session)
    }
}

/// Configured raw-to-flat pipeline.
#[derive(Debug, Clone)]
pub struct FlatBarPipeline {
    bucket_minutes: u32,
    offset_minutes: i32,
    admission: AdmissionRule,
    workers: usize,
}

struct Task<'a> {
    builder: &'a SessionBarBuilder,
    run: &'a [RawBar],
}

impl FlatBarPipeline {
    pub fn new(bucket_minutes: u32) -> Self {
        Self {
            bucket_minutes,
            offset_minutes: 0,
            admission: AdmissionRule::default(),
            workers: 0,
        }
    }

    /// Build from the `bars` config section and the worker count.
    pub fn from_config(config: &BarConfig, workers: usize) -> Self {
        Self {
            bucket_minutes: config.bucket_minutes,
            offset_minutes: config.offset_minutes,
            admission: config.admission,
            workers,
        }
    }

    pub fn with_offset(mut self, offset_minutes: i32) -> Self {
        self.offset_minutes = offset_minutes;
        self
    }

    pub fn with_admission(mut self, admission: AdmissionRule) -> Self {
        self.admission = admission;
        self
    }

    /// Use a dedicated pool of `workers` threads (0 = global rayon pool).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Run for sessions looked up by name; unknown names abort the run.
    pub fn run_named<S: AsRef<str>>(
        &self,
        raw_bars: Vec<RawBar>,
        calendar: &SessionCalendar,
        names: &[S],
    ) -> Result<FlatBarRun> {
        let sessions = calendar.resolve(names)?;
        self.run(raw_bars, &sessions)
    }

    /// Bucket and flatten every instrument for every session.
    pub fn run(&self, raw_bars: Vec<RawBar>, sessions: &[SessionWindow]) -> Result<FlatBarRun> {
        validate_bucket_minutes(self.bucket_minutes)?;
        let builders = sessions
            .iter()
            .map(|s| {
                SessionBarBuilder::new(s.clone(), self.bucket_minutes).map(|b| {
                    b.with_offset(self.offset_minutes)
                        .with_admission(self.admission)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let input = raw_bars.len();
        let deduped = dedup_last_wins(raw_bars);
        let runs = instrument_runs(&deduped.bars);

        let tasks: Vec<Task<'_>> = builders
            .iter()
            .flat_map(|builder| runs.iter().map(move |run| Task { builder, run: *run }))
            .collect();

        let results = self.install(|| {
            tasks
                .par_iter()
                .map(process)
                .collect::<Result<Vec<_>>>()
        })??;

        let mut stats = PipelineStats {
            instruments: runs.len(),
            sessions: sessions.len(),
            ..PipelineStats::default()
        };
        // Merged once for all sessions.
        stats.bucket.input = input;
        stats.bucket.duplicates_dropped = deduped.duplicates_dropped;

        let mut bars = Vec::new();
        for (bucket, flat) in results {
            stats.bucket.admitted += bucket.admitted;
            stats.bucket.rejected_outside_session += bucket.rejected_outside_session;
            stats.bucket.buckets += bucket.buckets;
            stats.flatten.merge(&flat.stats);
            bars.extend(flat.bars);
        }

        info!(
            raw = input,
            duplicates = deduped.duplicates_dropped,
            instruments = stats.instruments,
            sessions = stats.sessions,
            flat_bars = bars.len(),
            rejected = stats.bucket.rejected_outside_session,
            zero_price_guards = stats.flatten.zero_price_guards,
            "flat bars built"
        );

        Ok(FlatBarRun { bars, stats })
    }

    fn install<T, F>(&self, f: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        if self.workers == 0 {
            return Ok(f());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| Error::config(format!("failed to build worker pool: {e}")))?;
        Ok(pool.install(f))
    }
}

fn process(task: &Task<'_>) -> Result<(BucketStats, FlatBars)> {
    let mut bucket_stats = BucketStats::default();
    let bucketed = task.builder.build_sorted(task.run, &mut bucket_stats);
    let session = task.builder.session();
    let flat = BarFlattener::new(session).flatten(&bucketed)?;
    debug!(
        session = %session.name,
        instrument = task.run.first().map(|b| b.instrument_id.as_str()).unwrap_or_default(),
        buckets = bucketed.len(),
        "instrument flattened"
    );
    Ok((bucket_stats, flat))
}

/// Build flat bars for every session with default offset and admission.
pub fn build_flat_bars(
    raw_bars: Vec<RawBar>,
    bucket_minutes: u32,
    sessions: &[SessionWindow],
) -> Result<FlatBarRun> {
    FlatBarPipeline::new(bucket_minutes).run(raw_bars, sessions)
}

/// Build flat bars for the named sessions with every setting taken from
/// `config`: the session table, the `bars` section and the worker count.
pub fn build_flat_bars_with_config<S: AsRef<str>>(
    raw_bars: Vec<RawBar>,
    config: &Config,
    sessions: &[S],
) -> Result<FlatBarRun> {
    config.bars.validate()?;
    let calendar = config.calendar()?;
    FlatBarPipeline::from_config(&config.bars, config.workers).run_named(raw_bars, &calendar, sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_unknown_session_aborts() {
        let calendar = SessionCalendar::default();
        let err = FlatBarPipeline::new(60)
            .run_named(Vec::new(), &calendar, &["US", "APAC"])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSession(ref s) if s == "APAC"));
    }

    #[test]
    fn test_zero_bucket_width_aborts() {
        assert!(matches!(
            build_flat_bars(Vec::new(), 0, &[SessionWindow::us()]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_sessions_and_instruments_ordered() {
        // 14:15 UTC on 2024-01-08 is 09:15 New York: in the US 09:00 bucket
        // (overlap rule) and outside EU.
        // 08:15 UTC is 03:15 New York: EU only.
        let us = Utc.with_ymd_and_hms(2024, 1, 8, 14, 15, 0).unwrap();
        let eu = Utc.with_ymd_and_hms(2024, 1, 8, 8, 15, 0).unwrap();
        let raw = vec![
            RawBar::new("B", us, dec!(2)),
            RawBar::new("A", us, dec!(1)),
            RawBar::new("A", eu, dec!(3)),
        ];
        let run = FlatBarPipeline::new(60)
            .with_workers(2)
            .run(raw, &[SessionWindow::us(), SessionWindow::eu()])
            .unwrap();

        let keys: Vec<(&str, &str)> = run
            .bars
            .iter()
            .map(|b| (b.session.as_str(), b.instrument_id.as_str()))
            .collect();
        assert_eq!(keys, vec![("US", "A"), ("US", "B"), ("EU", "A")]);
        assert_eq!(run.session_bars("EU").count(), 1);
        assert_eq!(run.stats.instruments, 2);
        assert_eq!(run.stats.bucket.buckets, 3);
        assert_eq!(run.stats.bucket.rejected_outside_session, 3);
    }

    #[test]
    fn test_duplicates_counted_once_across_sessions() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 8, 14, 15, 0).unwrap();
        let raw = vec![
            RawBar::new("A", ts, dec!(1)),
            RawBar::new("A", ts, dec!(2)),
        ];
        let run = build_flat_bars(raw, 60, &[SessionWindow::us(), SessionWindow::eu()]).unwrap();
        assert_eq!(run.stats.bucket.input, 2);
        assert_eq!(run.stats.bucket.duplicates_dropped, 1);
        assert_eq!(run.bars.len(), 1);
        assert_eq!(run.bars[0].close, dec!(2));
    }

    #[test]
    fn test_fall_back_hour_flattens_in_order() {
        let night = SessionWindow::new(
            "NIGHT",
            chrono_tz::America::New_York,
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(5, 59, 0).unwrap(),
        );
        let at = |h, m| Utc.with_ymd_and_hms(2024, 11, 3, h, m, 0).unwrap();
        let raw = vec![
            RawBar::new("X", at(5, 10), dec!(1)),
            RawBar::new("X", at(5, 40), dec!(2)),
            RawBar::new("X", at(6, 10), dec!(3)),
        ];
        let run = build_flat_bars(raw, 30, &[night]).unwrap();
        let stamps: Vec<_> = run.bars.iter().map(|b| b.ts).collect();
        assert_eq!(stamps, vec![at(5, 0), at(5, 30), at(6, 0)]);
    }

    #[test]
    fn test_config_bars_section_drives_run() {
        // 14:15 and 14:45 UTC are 09:15 and 09:45 New York.
        let raw = vec![
            RawBar::new("A", Utc.with_ymd_and_hms(2024, 1, 8, 14, 15, 0).unwrap(), dec!(1)),
            RawBar::new("A", Utc.with_ymd_and_hms(2024, 1, 8, 14, 45, 0).unwrap(), dec!(2)),
        ];
        let hourly = build_flat_bars_with_config(raw.clone(), &Config::default(), &["US"]).unwrap();
        assert_eq!(hourly.bars.len(), 1);

        let config = Config::from_json_str(
            r#"{ "bars": { "bucket_minutes": 30, "admission": "point_in_window" }, "workers": 2 }"#,
        )
        .unwrap();
        let half_hourly = build_flat_bars_with_config(raw, &config, &["US"]).unwrap();
        // 09:15 is before the open under the point rule.
        assert_eq!(half_hourly.bars.len(), 1);
        assert_eq!(
            half_hourly.bars[0].ts,
            Utc.with_ymd_and_hms(2024, 1, 8, 14, 30, 0).unwrap()
        );
        assert_eq!(half_hourly.stats.bucket.rejected_outside_session, 1);
    }
}
