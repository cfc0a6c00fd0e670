//! Configuration structures for the intraday pipeline.

use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::{SessionCalendar, SessionWindow, MINUTES_PER_DAY};

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session table.
    pub sessions: Vec<SessionWindow>,
    /// Bucketing configuration.
    pub bars: BarConfig,
    /// FX netting configuration.
    pub netting: NettingConfig,
    /// Performance report configuration.
    pub report: ReportConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Number of worker threads (0 = auto).
    pub workers: usize,
}

impl Config {
    /// Parse a configuration from JSON; missing sections take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Check every section for values the engines cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.bars.validate()?;
        self.report.validate()?;
        self.calendar().map(|_| ())
    }

    /// Build the session calendar from the configured table.
    pub fn calendar(&self) -> Result<SessionCalendar> {
        if self.sessions.is_empty() {
            return Ok(SessionCalendar::default());
        }
        SessionCalendar::new(self.sessions.clone())
    }
}

/// Rule deciding whether an observation belongs to a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionRule {
    /// Admit when the observation's local minute lies inside the window.
    PointInWindow,
    /// Admit when the observation's bucket overlaps the window.
    #[default]
    IntervalOverlap,
}

/// Session bar building configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarConfig {
    /// Bucket width in minutes.
    pub bucket_minutes: u32,
    /// Shift of the bucket grid in minutes (window tests use shifted time).
    pub offset_minutes: i32,
    /// Session admission rule.
    pub admission: AdmissionRule,
    /// Calendar-day distance above which a coverage gap is reported.
    pub gap_limit_days: i64,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: 60,
            offset_minutes: 0,
            admission: AdmissionRule::IntervalOverlap,
            gap_limit_days: 5,
        }
    }
}

impl BarConfig {
    pub fn validate(&self) -> Result<()> {
        validate_bucket_minutes(self.bucket_minutes)?;
        if self.offset_minutes.unsigned_abs() >= MINUTES_PER_DAY {
            return Err(Error::config(format!(
                "offset_minutes must be within one day, got {}",
                self.offset_minutes
            )));
        }
        if self.gap_limit_days < 1 {
            return Err(Error::config("gap_limit_days must be at least 1"));
        }
        Ok(())
    }
}

/// Reject bucket widths the builder cannot represent.
pub fn validate_bucket_minutes(bucket_minutes: u32) -> Result<()> {
    if bucket_minutes == 0 || bucket_minutes > MINUTES_PER_DAY {
        return Err(Error::config(format!(
            "bucket_minutes must be in 1..={}, got {}",
            MINUTES_PER_DAY, bucket_minutes
        )));
    }
    Ok(())
}

/// FX netting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NettingConfig {
    /// Currency every exposure is expressed against.
    pub pivot_currency: String,
}

impl Default for NettingConfig {
    fn default() -> Self {
        Self {
            pivot_currency: "USD".to_string(),
        }
    }
}

/// Model performance report configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Transaction cost per unit of turnover, in basis points.
    pub cost_bps: Decimal,
    /// Trading days per year used to annualize daily figures.
    pub annualize_days: u32,
    /// Number of best and worst pairs listed.
    pub top_n_pairs: usize,
    /// Bars between a weight and the price bar its PnL is stamped on.
    pub pnl_lag_bars: usize,
    /// First PnL day included (inclusive).
    pub from_date: Option<NaiveDate>,
    /// Last PnL day included (inclusive).
    pub to_date: Option<NaiveDate>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            cost_bps: Decimal::ONE,
            annualize_days: 252,
            top_n_pairs: 10,
            pnl_lag_bars: 2,
            from_date: None,
            to_date: None,
        }
    }
}

impl ReportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.annualize_days == 0 {
            return Err(Error::config("annualize_days must be positive"));
        }
        if self.pnl_lag_bars == 0 {
            return Err(Error::config("pnl_lag_bars must be at least 1"));
        }
        if self.cost_bps.is_sign_negative() {
            return Err(Error::config("cost_bps must not be negative"));
        }
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if from > to {
                return Err(Error::config(format!(
                    "from_date {} is after to_date {}",
                    from, to
                )));
            }
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset.
    pub level: String,
    /// Emit JSON lines instead of human readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bars.bucket_minutes, 60);
        assert_eq!(config.bars.admission, AdmissionRule::IntervalOverlap);
        assert_eq!(config.netting.pivot_currency, "USD");
        assert_eq!(config.report.pnl_lag_bars, 2);
        assert!(config.validate().is_ok());
        assert_eq!(config.calendar().unwrap().windows().len(), 2);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = Config::from_json_str(
            r#"{
                "bars": { "bucket_minutes": 30, "admission": "point_in_window" },
                "report": { "cost_bps": "2.5" },
                "workers": 4
            }"#,
        )
        .unwrap();
        assert_eq!(config.bars.bucket_minutes, 30);
        assert_eq!(config.bars.admission, AdmissionRule::PointInWindow);
        assert_eq!(config.bars.gap_limit_days, 5);
        assert_eq!(config.report.cost_bps, dec!(2.5));
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn test_custom_sessions_from_json() {
        let config = Config::from_json_str(
            r#"{ "sessions": [
                { "name": "EU", "zone": "Europe/London", "start": "07:00:00", "end": "13:59:00" }
            ] }"#,
        )
        .unwrap();
        let calendar = config.calendar().unwrap();
        assert_eq!(calendar.window_for("EU").unwrap().zone, chrono_tz::Europe::London);
        assert!(calendar.window_for("US").is_err());
    }

    #[test]
    fn test_invalid_bucket_width() {
        assert!(matches!(
            Config::from_json_str(r#"{ "bars": { "bucket_minutes": 0 } }"#),
            Err(Error::Config(_))
        ));
        assert!(validate_bucket_minutes(1441).is_err());
        assert!(validate_bucket_minutes(1440).is_ok());
    }

    #[test]
    fn test_invalid_report_dates() {
        let report = ReportConfig {
            from_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            to_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..ReportConfig::default()
        };
        assert!(report.validate().is_err());
    }

    #[test]
    fn test_unknown_zone_is_json_error() {
        let err = Config::from_json_str(
            r#"{ "sessions": [ { "name": "X", "zone": "Mars/Olympus", "start": "01:00:00", "end": "02:00:00" } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
