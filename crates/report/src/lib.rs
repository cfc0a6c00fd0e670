//! Model performance reporting for the intraday pipeline.
//!
//! This crate provides:
//! - Per-bar PnL of netted weights with lagged realization and turnover cost
//! - Daily, weekly and monthly rollups, portfolio-wide and per pair
//! - Risk snapshot over daily net PnL
//! - Best and worst pair attribution

pub mod aggregate;
pub mod pnl;
pub mod report;
pub mod risk;

pub use aggregate::{aggregate, aggregate_by_pair, pair_label, PairLabels, PairPerfRow, PerfRow, Period};
pub use pnl::{BarPnl, PnlEngine, PnlStats};
pub use report::{build_report, ModelReport, PairContribution, ReportBuilder};
pub use risk::RiskSnapshot;
