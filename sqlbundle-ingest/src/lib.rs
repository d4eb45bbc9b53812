//! sqlbundle ingest: turns a source database into a committed bundle directory.
//!
//! - TOML configuration ([`config`])
//! - Writer traits and the Parquet/CSV writers ([`writer`])
//! - Staging directory, commit and manifest ([`bundle`])
//! - The run itself, sequential or parallel ([`pipeline`])

pub mod bundle;
pub mod config;
pub mod pipeline;
pub mod progress;
pub mod writer;

pub use bundle::{BundleDir, BundleManifest};
pub use config::{ConfigError, IngestConfig};
pub use pipeline::{
    ingest, resolve_symbols, run_ingest, run_ingest_with, IngestContext, IngestError,
    IngestOptions, IngestReport, IngestSummary, Writers,
};
pub use progress::{IngestProgress, LogProgress, NoProgress};
