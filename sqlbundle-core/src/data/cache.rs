//! Read-through cache for raw bars, keyed by symbol and data kind.
//!
//! Two backends:
//! - [`MemoryCache`] lives for one process.
//! - [`ParquetCache`] persists one `{key}.parquet` file per entry under a
//!   directory. Writes are atomic (write to .tmp, rename into place); files
//!   that fail to load are quarantined (`{key}.parquet.quarantined`) and
//!   treated as a miss.
//!
//! Nothing is ever evicted or invalidated here.

use crate::domain::RawBar;
use crate::error::{BundleError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Ohlcv,
}

impl DataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::Ohlcv => "ohlcv",
        }
    }
}

/// `{symbol}-{kind}`, with path separators in the symbol replaced by `_`.
pub fn cache_key(symbol: &str, kind: DataKind) -> String {
    let safe: String = symbol
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{safe}-{}", kind.as_str())
}

pub trait BarCache {
    fn get(&mut self, key: &str) -> Result<Option<Vec<RawBar>>>;

    fn put(&mut self, key: &str, bars: &[RawBar]) -> Result<()>;
}

/// Return the cached entry for `key`, or run `fetch`, store its result and
/// return it. Populating the cache is the only side effect of a read.
///
/// An empty fetch is returned but never stored, so a symbol that later gains
/// rows is read from the source again.
pub fn read_through<C, F>(cache: &mut C, key: &str, fetch: F) -> Result<Vec<RawBar>>
where
    C: BarCache + ?Sized,
    F: FnOnce() -> Result<Vec<RawBar>>,
{
    if let Some(bars) = cache.get(key)? {
        debug!(key, rows = bars.len(), "cache hit");
        return Ok(bars);
    }
    let bars = fetch()?;
    if bars.is_empty() {
        debug!(key, "empty fetch, not cached");
        return Ok(bars);
    }
    cache.put(key, &bars)?;
    debug!(key, rows = bars.len(), "cache populated");
    Ok(bars)
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, Vec<RawBar>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BarCache for MemoryCache {
    fn get(&mut self, key: &str) -> Result<Option<Vec<RawBar>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, bars: &[RawBar]) -> Result<()> {
        self.entries.insert(key.to_string(), bars.to_vec());
        Ok(())
    }
}

/// Directory of Parquet files, one per cache key.
pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.parquet"))
    }
}

impl BarCache for ParquetCache {
    fn get(&mut self, key: &str) -> Result<Option<Vec<RawBar>>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        match read_bars_parquet(&path) {
            Ok(bars) => Ok(Some(bars)),
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                let _ = fs::rename(&path, &quarantine);
                Ok(None)
            }
        }
    }

    fn put(&mut self, key: &str, bars: &[RawBar]) -> Result<()> {
        if bars.is_empty() {
            return Err(BundleError::Cache(format!("no bars to cache for {key}")));
        }
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| BundleError::Cache(format!("failed to create dir: {e}")))?;

        let path = self.entry_path(key);
        let tmp_path = path.with_extension("parquet.tmp");
        let mut df = bars_to_dataframe(bars)?;
        write_parquet(&mut df, &tmp_path)?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            BundleError::Cache(format!("atomic rename failed: {e}"))
        })?;
        Ok(())
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn bars_to_dataframe(bars: &[RawBar]) -> Result<DataFrame> {
    let epoch = epoch();
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| BundleError::Cache(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| BundleError::Cache(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file =
        fs::File::create(path).map_err(|e| BundleError::Cache(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| BundleError::Cache(format!("write parquet: {e}")))?;
    Ok(())
}

fn read_bars_parquet(path: &Path) -> Result<Vec<RawBar>> {
    let file = fs::File::open(path).map_err(|e| BundleError::Cache(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| BundleError::Cache(format!("read: {e}")))?;

    let map_err = |e: PolarsError| BundleError::Cache(format!("column read: {e}"));
    let date_ca = df.column("date").map_err(map_err)?.date().map_err(map_err)?;
    let open_ca = df.column("open").map_err(map_err)?.f64().map_err(map_err)?;
    let high_ca = df.column("high").map_err(map_err)?.f64().map_err(map_err)?;
    let close_ca = df.column("close").map_err(map_err)?.f64().map_err(map_err)?;
    let vol_ca = df.column("volume").map_err(map_err)?.f64().map_err(map_err)?;

    let epoch = epoch();
    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| BundleError::Cache(format!("null date at row {i}")))?;
        bars.push(RawBar {
            date: epoch + chrono::Duration::days(days as i64),
            open: open_ca.get(i).unwrap_or(0.0),
            high: high_ca.get(i).unwrap_or(0.0),
            close: close_ca.get(i).unwrap_or(0.0),
            volume: vol_ca.get(i).unwrap_or(0.0),
        });
    }
    Ok(bars)
}
