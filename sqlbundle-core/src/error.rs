//! Error taxonomy shared by every stage of an ingestion run.
//!
//! Every variant is fatal to the run: ingestion is all-or-nothing, so callers
//! propagate with `?` and never retry.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, transforming, caching or writing bundle data.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("data source unavailable: {} does not exist", path.display())]
    SourceUnavailable { path: PathBuf },

    #[error("no price data for symbol '{symbol}'")]
    NoData { symbol: String },

    #[error("data integrity violation for '{symbol}': {reason}")]
    DataIntegrity { symbol: String, reason: String },

    #[error("symbol '{symbol}' has no assigned sid")]
    Mapping { symbol: String },

    #[error("source query failed: {0}")]
    Query(String),

    #[error("unknown trading calendar '{0}'")]
    UnknownCalendar(String),

    #[error("calendar error: {0}")]
    Calendar(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("write error: {0}")]
    Write(String),
}

impl BundleError {
    pub fn integrity(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// The symbol this error is attributed to, when there is one.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::NoData { symbol }
            | Self::DataIntegrity { symbol, .. }
            | Self::Mapping { symbol } => Some(symbol),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for BundleError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Query(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BundleError>;
