//! Core types and configuration for the intraday pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Price and weight records (raw, bucketed and flat bars, FX weights)
//! - Trading session windows and the session calendar
//! - Configuration structures and logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use session::{SessionCalendar, SessionWindow};
pub use types::*;
