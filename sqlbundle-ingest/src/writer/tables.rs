use super::{AdjustmentWriter, AssetWriter};
use chrono::NaiveDate;
use sqlbundle_core::domain::{AdjustmentTables, SymbolMetadata};
use sqlbundle_core::{BundleError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const EQUITIES_FILE: &str = "equities.csv";
pub const SPLITS_FILE: &str = "splits.csv";
pub const DIVIDENDS_FILE: &str = "dividends.csv";

fn write_err(path: &Path) -> impl Fn(csv::Error) -> BundleError + '_ {
    move |e| BundleError::Write(format!("{}: {e}", path.display()))
}

fn open(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::Writer::from_path(path).map_err(write_err(path))
}

fn finish(mut wtr: csv::Writer<std::fs::File>, path: &Path) -> Result<()> {
    wtr.flush()
        .map_err(|e| BundleError::Write(format!("{}: {e}", path.display())))
}

/// Unknown dates are written as empty cells.
fn date_cell(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}

/// Asset registry as `equities.csv`.
pub struct CsvAssetWriter {
    path: PathBuf,
}

impl CsvAssetWriter {
    pub fn new(bundle_dir: impl AsRef<Path>) -> Self {
        Self {
            path: bundle_dir.as_ref().join(EQUITIES_FILE),
        }
    }
}

impl AssetWriter for CsvAssetWriter {
    fn write_equities(&mut self, rows: &[SymbolMetadata]) -> Result<()> {
        let path = self.path.as_path();
        let mut wtr = open(path)?;
        wtr.write_record([
            "sid",
            "symbol",
            "start_date",
            "end_date",
            "auto_close_date",
            "exchange",
        ])
        .map_err(write_err(path))?;
        for row in rows {
            wtr.write_record([
                &row.sid.to_string(),
                &row.symbol,
                &row.start_date.to_string(),
                &row.end_date.to_string(),
                &row.auto_close_date.to_string(),
                &row.exchange,
            ])
            .map_err(write_err(path))?;
        }
        finish(wtr, path)?;
        debug!(rows = rows.len(), "wrote asset table");
        Ok(())
    }
}

/// Splits and dividends as `splits.csv` and `dividends.csv`.
pub struct CsvAdjustmentWriter {
    splits_path: PathBuf,
    dividends_path: PathBuf,
}

impl CsvAdjustmentWriter {
    pub fn new(bundle_dir: impl AsRef<Path>) -> Self {
        let dir = bundle_dir.as_ref();
        Self {
            splits_path: dir.join(SPLITS_FILE),
            dividends_path: dir.join(DIVIDENDS_FILE),
        }
    }
}

impl AdjustmentWriter for CsvAdjustmentWriter {
    fn write_adjustments(&mut self, tables: &AdjustmentTables) -> Result<()> {
        let path = self.splits_path.as_path();
        let mut wtr = open(path)?;
        wtr.write_record(["sid", "effective_date", "ratio"])
            .map_err(write_err(path))?;
        for split in &tables.splits {
            wtr.write_record([
                split.sid.to_string(),
                split.effective_date.to_string(),
                split.ratio.to_string(),
            ])
            .map_err(write_err(path))?;
        }
        finish(wtr, path)?;

        let path = self.dividends_path.as_path();
        let mut wtr = open(path)?;
        wtr.write_record([
            "sid",
            "ex_date",
            "record_date",
            "declared_date",
            "pay_date",
            "amount",
        ])
        .map_err(write_err(path))?;
        for div in &tables.dividends {
            wtr.write_record([
                div.sid.to_string(),
                div.ex_date.to_string(),
                date_cell(div.record_date),
                date_cell(div.declared_date),
                date_cell(div.pay_date),
                div.amount.to_string(),
            ])
            .map_err(write_err(path))?;
        }
        finish(wtr, path)?;

        debug!(
            splits = tables.splits.len(),
            dividends = tables.dividends.len(),
            "wrote adjustment tables"
        );
        Ok(())
    }
}
