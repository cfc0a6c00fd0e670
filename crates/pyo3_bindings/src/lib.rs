//! PyO3 bindings for the intraday pipeline.
//!
//! Exposes the pure Rust transforms to the Python jobs that own file and
//! database I/O:
//! - Session bar building and flattening
//! - FX weight netting
//! - Coverage gap detection
//! - Logging setup

use chrono::{DateTime, NaiveDate, Utc};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use rust_decimal::Decimal;

use intraday_bars::CoverageGap as RustCoverageGap;
use intraday_core::config::AdmissionRule;
use intraday_core::{
    Config, Error, FlatBar as RustFlatBar, NettedWeight as RustNettedWeight, RawBar as RustRawBar,
    TheoreticalWeight as RustTheoreticalWeight, TickerRef,
};

fn to_py_err(err: Error) -> PyErr {
    match err {
        Error::Io(e) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// Raw close observation.
#[pyclass]
#[derive(Clone)]
pub struct RawBar {
    #[pyo3(get, set)]
    pub instrument_id: String,
    #[pyo3(get, set)]
    pub ts: DateTime<Utc>,
    #[pyo3(get, set)]
    pub close: Decimal,
}

#[pymethods]
impl RawBar {
    #[new]
    fn new(instrument_id: String, ts: DateTime<Utc>, close: Decimal) -> Self {
        RawBar {
            instrument_id,
            ts,
            close,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "RawBar(instrument_id={}, ts={}, close={})",
            self.instrument_id, self.ts, self.close
        )
    }
}

impl From<RawBar> for RustRawBar {
    fn from(b: RawBar) -> Self {
        RustRawBar::new(b.instrument_id, b.ts, b.close)
    }
}

/// Flattened session bar.
#[pyclass]
#[derive(Clone)]
pub struct FlatBar {
    #[pyo3(get)]
    pub instrument_id: String,
    #[pyo3(get)]
    pub ts: DateTime<Utc>,
    #[pyo3(get)]
    pub close: Decimal,
    #[pyo3(get)]
    pub session: String,
}

#[pymethods]
impl FlatBar {
    fn __repr__(&self) -> String {
        format!(
            "FlatBar(instrument_id={}, ts={}, close={}, session={})",
            self.instrument_id, self.ts, self.close, self.session
        )
    }
}

impl From<RustFlatBar> for FlatBar {
    fn from(b: RustFlatBar) -> Self {
        FlatBar {
            instrument_id: b.instrument_id,
            ts: b.ts,
            close: b.close,
            session: b.session,
        }
    }
}

/// Model weight before netting.
#[pyclass]
#[derive(Clone)]
pub struct TheoreticalWeight {
    #[pyo3(get, set)]
    pub instrument_id: i64,
    #[pyo3(get, set)]
    pub ts: DateTime<Utc>,
    #[pyo3(get, set)]
    pub weight: Decimal,
    #[pyo3(get, set)]
    pub ticker: String,
}

#[pymethods]
impl TheoreticalWeight {
    #[new]
    fn new(instrument_id: i64, ts: DateTime<Utc>, weight: Decimal, ticker: String) -> Self {
        TheoreticalWeight {
            instrument_id,
            ts,
            weight,
            ticker,
        }
    }
}

impl From<TheoreticalWeight> for RustTheoreticalWeight {
    fn from(w: TheoreticalWeight) -> Self {
        RustTheoreticalWeight::new(w.instrument_id, w.ts, w.weight, w.ticker)
    }
}

/// Netted exposure on a canonical instrument.
#[pyclass]
#[derive(Clone)]
pub struct NettedWeight {
    #[pyo3(get)]
    pub instrument_id: i64,
    #[pyo3(get)]
    pub ts: DateTime<Utc>,
    #[pyo3(get)]
    pub weight: Decimal,
}

#[pymethods]
impl NettedWeight {
    fn __repr__(&self) -> String {
        format!(
            "NettedWeight(instrument_id={}, ts={}, weight={})",
            self.instrument_id, self.ts, self.weight
        )
    }
}

impl From<RustNettedWeight> for NettedWeight {
    fn from(w: RustNettedWeight) -> Self {
        NettedWeight {
            instrument_id: w.instrument_id,
            ts: w.ts,
            weight: w.weight,
        }
    }
}

/// Netted weights plus run counters.
#[pyclass]
pub struct NettingResult {
    #[pyo3(get)]
    pub weights: Vec<NettedWeight>,
    #[pyo3(get)]
    pub rows: usize,
    #[pyo3(get)]
    pub malformed_tickers: usize,
    #[pyo3(get)]
    pub uncovered_legs: usize,
    /// Currencies of the dropped legs, one entry per leg.
    #[pyo3(get)]
    pub uncovered_currencies: Vec<String>,
    /// Lookup tickers that are not currency pairs.
    #[pyo3(get)]
    pub lookup_malformed: usize,
    /// Lookup pairs booked on more than one instrument (last one kept).
    #[pyo3(get)]
    pub lookup_replaced: usize,
}

/// Hole in an instrument's daily coverage.
#[pyclass]
#[derive(Clone)]
pub struct CoverageGap {
    #[pyo3(get)]
    pub instrument_id: String,
    #[pyo3(get)]
    pub from_date: NaiveDate,
    #[pyo3(get)]
    pub to_date: NaiveDate,
    #[pyo3(get)]
    pub days: i64,
}

impl From<RustCoverageGap> for CoverageGap {
    fn from(g: RustCoverageGap) -> Self {
        CoverageGap {
            instrument_id: g.instrument_id,
            from_date: g.from,
            to_date: g.to,
            days: g.days,
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

fn parse_admission(admission: &str) -> PyResult<AdmissionRule> {
    match admission {
        "interval_overlap" => Ok(AdmissionRule::IntervalOverlap),
        "point_in_window" => Ok(AdmissionRule::PointInWindow),
        other => Err(PyValueError::new_err(format!(
            "unknown admission rule '{other}', expected 'interval_overlap' or 'point_in_window'"
        ))),
    }
}

fn load_config(config_json: Option<&str>) -> PyResult<Config> {
    match config_json {
        Some(json) => Config::from_json_str(json).map_err(to_py_err),
        None => Ok(Config::default()),
    }
}

/// Bucket and flatten raw bars for the named sessions.
///
/// Settings come from `config_json` when given (built-in defaults
/// otherwise); keyword arguments that are not None override them.
#[pyfunction]
#[allow(clippy::too_many_arguments)]
#[pyo3(signature = (raw_bars, bucket_minutes, sessions, offset_minutes=None, admission=None, workers=None, config_json=None))]
fn build_flat_bars(
    py: Python<'_>,
    raw_bars: Vec<RawBar>,
    bucket_minutes: Option<u32>,
    sessions: Vec<String>,
    offset_minutes: Option<i32>,
    admission: Option<&str>,
    workers: Option<usize>,
    config_json: Option<&str>,
) -> PyResult<Vec<FlatBar>> {
    let mut config = load_config(config_json)?;
    if let Some(bucket_minutes) = bucket_minutes {
        config.bars.bucket_minutes = bucket_minutes;
    }
    if let Some(offset_minutes) = offset_minutes {
        config.bars.offset_minutes = offset_minutes;
    }
    if let Some(admission) = admission {
        config.bars.admission = parse_admission(admission)?;
    }
    if let Some(workers) = workers {
        config.workers = workers;
    }
    let raw: Vec<RustRawBar> = raw_bars.into_iter().map(Into::into).collect();

    let run = py
        .allow_threads(|| intraday_bars::build_flat_bars_with_config(raw, &config, &sessions))
        .map_err(to_py_err)?;
    Ok(run.bars.into_iter().map(Into::into).collect())
}

/// Net theoretical weights; `tickers` is a list of (instrument_id, ticker).
///
/// The pivot currency comes from the `netting` section of `config_json`.
#[pyfunction]
#[pyo3(signature = (weights, tickers, config_json=None))]
fn net_weights(
    py: Python<'_>,
    weights: Vec<TheoreticalWeight>,
    tickers: Vec<(i64, String)>,
    config_json: Option<&str>,
) -> PyResult<NettingResult> {
    let config = load_config(config_json)?;
    let weights: Vec<RustTheoreticalWeight> = weights.into_iter().map(Into::into).collect();
    let lookup: Vec<TickerRef> = tickers
        .into_iter()
        .map(|(id, ticker)| TickerRef::new(id, ticker))
        .collect();

    let outcome = py.allow_threads(|| {
        intraday_netting::net_weights_with_config(&weights, &lookup, &config.netting)
    });
    Ok(NettingResult {
        weights: outcome.weights.into_iter().map(Into::into).collect(),
        rows: outcome.stats.rows,
        malformed_tickers: outcome.stats.malformed_tickers,
        uncovered_legs: outcome.stats.uncovered_legs,
        uncovered_currencies: outcome.uncovered.into_iter().map(|l| l.currency).collect(),
        lookup_malformed: outcome.lookup.malformed,
        lookup_replaced: outcome.lookup.replaced,
    })
}

/// Report day gaps longer than `limit_days` per instrument.
///
/// Without `limit_days` the `bars.gap_limit_days` of `config_json` (5 by
/// default) applies.
#[pyfunction]
#[pyo3(signature = (raw_bars, limit_days=None, config_json=None))]
fn find_coverage_gaps(
    raw_bars: Vec<RawBar>,
    limit_days: Option<i64>,
    config_json: Option<&str>,
) -> PyResult<Vec<CoverageGap>> {
    let mut config = load_config(config_json)?;
    if let Some(limit_days) = limit_days {
        config.bars.gap_limit_days = limit_days;
    }
    let raw: Vec<RustRawBar> = raw_bars.into_iter().map(Into::into).collect();
    Ok(intraday_bars::find_coverage_gaps_with_config(&raw, &config.bars)
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Install the tracing subscriber; returns False if one was already set.
///
/// `level` and `json` override the `logging` section of `config_json`.
#[pyfunction]
#[pyo3(signature = (level=None, json=None, config_json=None))]
fn init_logging(level: Option<String>, json: Option<bool>, config_json: Option<&str>) -> PyResult<bool> {
    let mut config = load_config(config_json)?;
    if let Some(level) = level {
        config.logging.level = level;
    }
    if let Some(json) = json {
        config.logging.json = json;
    }
    Ok(intraday_core::logging::init_logging(&config.logging))
}

// ============================================================================
// Module Definition
// ============================================================================

/// Intraday pipeline - session bars and FX netting in Rust.
#[pymodule]
fn intraday_pipeline(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<RawBar>()?;
    m.add_class::<FlatBar>()?;
    m.add_class::<TheoreticalWeight>()?;
    m.add_class::<NettedWeight>()?;
    m.add_class::<NettingResult>()?;
    m.add_class::<CoverageGap>()?;

    // Functions
    m.add_function(wrap_pyfunction!(build_flat_bars, m)?)?;
    m.add_function(wrap_pyfunction!(net_weights, m)?)?;
    m.add_function(wrap_pyfunction!(find_coverage_gaps, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    Ok(())
}
