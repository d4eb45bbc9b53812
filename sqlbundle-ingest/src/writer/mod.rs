//! Sinks for the three bundle tables.
//!
//! The pipeline only talks to the traits; `ParquetBarWriter` and the CSV
//! table writers are the on-disk implementations used by `run_ingest`.

mod parquet;
mod tables;

pub use parquet::{read_bar_file, ParquetBarWriter, BARS_DIR};
pub use tables::{CsvAdjustmentWriter, CsvAssetWriter, DIVIDENDS_FILE, EQUITIES_FILE, SPLITS_FILE};

use sqlbundle_core::domain::{AdjustmentTables, NormalizedSeries, Sid, SymbolMetadata};
use sqlbundle_core::Result;

pub trait AssetWriter {
    /// Persist the asset registry, one row per sid in sid order.
    fn write_equities(&mut self, rows: &[SymbolMetadata]) -> Result<()>;
}

pub trait BarWriter {
    /// Drain `bars`, persisting each series under its sid.
    ///
    /// Stops at the first `Err` and returns it. On success returns the number
    /// of series written.
    fn write_bars(
        &mut self,
        bars: &mut dyn Iterator<Item = Result<(Sid, NormalizedSeries)>>,
    ) -> Result<usize>;
}

pub trait AdjustmentWriter {
    /// Persist both tables. Empty tables are still written.
    fn write_adjustments(&mut self, tables: &AdjustmentTables) -> Result<()>;
}
