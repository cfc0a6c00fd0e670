//! Error types for the intraday pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the intraday pipeline.
///
/// Only conditions that abort a run live here. Row-level gaps (malformed
/// tickers, zero prices, uncovered FX legs) are counted in the stats
/// structs of the crate that hits them.
#[derive(Error, Debug)]
pub enum Error {
    /// Session name not present in the session calendar.
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an unknown session error.
    pub fn unknown_session(name: impl Into<String>) -> Self {
        Error::UnknownSession(name.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }
}
