use super::BarWriter;
use chrono::NaiveDate;
use polars::prelude::*;
use sqlbundle_core::domain::{NormalizedBar, NormalizedSeries, Sid};
use sqlbundle_core::{BundleError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Subdirectory of the bundle holding one file per sid.
pub const BARS_DIR: &str = "daily_equities";

/// Writes `daily_equities/{sid}.parquet` under a bundle directory.
pub struct ParquetBarWriter {
    dir: PathBuf,
}

impl ParquetBarWriter {
    pub fn new(bundle_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: bundle_dir.as_ref().join(BARS_DIR),
        }
    }

    pub fn path_for(&self, sid: Sid) -> PathBuf {
        self.dir.join(format!("{sid}.parquet"))
    }

    fn write_one(&self, sid: Sid, series: &NormalizedSeries) -> Result<()> {
        let mut df = series_to_dataframe(series)?;
        let path = self.path_for(sid);
        let file = fs::File::create(&path)
            .map_err(|e| BundleError::Write(format!("create {}: {e}", path.display())))?;
        ParquetWriter::new(file)
            .finish(&mut df)
            .map_err(|e| BundleError::Write(format!("write {}: {e}", path.display())))?;
        debug!(sid = sid.0, symbol = %series.symbol, rows = series.len(), "wrote bar file");
        Ok(())
    }
}

impl BarWriter for ParquetBarWriter {
    fn write_bars(
        &mut self,
        bars: &mut dyn Iterator<Item = Result<(Sid, NormalizedSeries)>>,
    ) -> Result<usize> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| BundleError::Write(format!("create {}: {e}", self.dir.display())))?;
        let mut written = 0;
        for item in bars {
            let (sid, series) = item?;
            self.write_one(sid, &series)?;
            written += 1;
        }
        Ok(written)
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn series_to_dataframe(series: &NormalizedSeries) -> Result<DataFrame> {
    let epoch = epoch();
    let bars = &series.bars;
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch).num_days() as i32)
        .collect();
    let [open, high, low, close, volume] = NormalizedSeries::COLUMNS;
    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| BundleError::Write(format!("date cast: {e}")))?,
        f64_column(open, bars, |b| b.open),
        f64_column(high, bars, |b| b.high),
        f64_column(low, bars, |b| b.low),
        f64_column(close, bars, |b| b.close),
        f64_column(volume, bars, |b| b.volume),
    ])
    .map_err(|e| BundleError::Write(format!("dataframe creation: {e}")))
}

fn f64_column(name: &str, bars: &[NormalizedBar], f: impl Fn(&NormalizedBar) -> f64) -> Column {
    Column::new(name.into(), bars.iter().map(f).collect::<Vec<f64>>())
}

/// Load a bar file written by [`ParquetBarWriter`].
pub fn read_bar_file(path: &Path) -> Result<Vec<NormalizedBar>> {
    let read_err = |e: PolarsError| BundleError::Write(format!("read {}: {e}", path.display()));
    let file = fs::File::open(path)
        .map_err(|e| BundleError::Write(format!("open {}: {e}", path.display())))?;
    let df = ParquetReader::new(file).finish().map_err(read_err)?;

    let dates = df.column("date").map_err(read_err)?.date().map_err(read_err)?;
    let f64_col = |name: &str| -> Result<Vec<f64>> {
        let ca = df.column(name).map_err(read_err)?.f64().map_err(read_err)?;
        Ok(ca.into_iter().map(|v| v.unwrap_or(0.0)).collect())
    };
    let (open, high, low) = (f64_col("open")?, f64_col("high")?, f64_col("low")?);
    let (close, volume) = (f64_col("close")?, f64_col("volume")?);

    let epoch = epoch();
    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = dates
            .get(i)
            .ok_or_else(|| BundleError::Write(format!("null date at row {i}")))?;
        bars.push(NormalizedBar {
            date: epoch + chrono::Duration::days(days as i64),
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume[i],
        });
    }
    Ok(bars)
}
