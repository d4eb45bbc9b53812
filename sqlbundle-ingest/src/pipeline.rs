//! One ingestion run, from the source database to a committed bundle.
//!
//! [`ingest`] drives the transform against trait objects:
//! 1. resolve the symbol universe (de-duplicated, sorted)
//! 2. allocate dense sids in that order
//! 3. stream `(sid, series)` pairs to the bar writer, recording each
//!    symbol's metadata row as its series passes through
//! 4. write the asset table
//! 5. derive splits/dividends for the allocated sids and write them
//!
//! [`run_ingest`] wires the concrete SQLite source, calendar, cache and
//! on-disk writers around it and commits the bundle directory.

use crate::bundle::{hash_files, BundleDir, BundleManifest, MANIFEST_VERSION};
use crate::config::{CalendarSection, ConfigError, IngestConfig};
use crate::progress::{IngestProgress, LogProgress};
use crate::writer::{
    AdjustmentWriter, AssetWriter, BarWriter, CsvAdjustmentWriter, CsvAssetWriter,
    ParquetBarWriter,
};
use chrono::Utc;
use rayon::prelude::*;
use sqlbundle_core::calendar::{CalendarRegistry, TradingCalendar, WeekdayCalendar};
use sqlbundle_core::data::{
    cache_key, read_through, BarCache, DataKind, MemoryCache, ParquetCache, RawDataSource,
    SqliteSource,
};
use sqlbundle_core::domain::{NormalizedSeries, RawBar, Sid, SymbolMetadata};
use sqlbundle_core::{
    BundleError, CorporateActionsDeriver, Coverage, LowPolicy, MetadataTable,
    PriceSeriesNormalizer, Result, SymbolIndex,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("bundle I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Read side of a run.
pub struct IngestContext<'a> {
    pub source: &'a dyn RawDataSource,
    pub calendar: &'a dyn TradingCalendar,
    pub cache: &'a mut dyn BarCache,
    pub progress: &'a dyn IngestProgress,
}

/// Write side of a run.
pub struct Writers<'a> {
    pub bars: &'a mut dyn BarWriter,
    pub assets: &'a mut dyn AssetWriter,
    pub adjustments: &'a mut dyn AdjustmentWriter,
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Empty means every symbol the source lists.
    pub symbols: Vec<String>,
    pub exchange: String,
    pub low_policy: LowPolicy,
    /// Normalize on the rayon pool. Raw reads stay sequential.
    pub parallel: bool,
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    /// Asset rows in sid order.
    pub assets: Vec<SymbolMetadata>,
    pub sessions: usize,
    /// Sessions with no raw row, written as all-zero bars.
    pub zero_filled: usize,
    pub splits: usize,
    pub dividends: usize,
}

/// Symbols to ingest: `requested`, or every symbol in the source when empty.
pub fn resolve_symbols(source: &dyn RawDataSource, requested: &[String]) -> Result<Vec<String>> {
    let symbols: BTreeSet<String> = if requested.is_empty() {
        source.list_symbols()?.into_iter().collect()
    } else {
        requested.iter().cloned().collect()
    };
    Ok(symbols.into_iter().collect())
}

pub fn ingest(ctx: IngestContext<'_>, writers: Writers<'_>, opts: &IngestOptions) -> Result<IngestSummary> {
    let IngestContext {
        source,
        calendar,
        cache,
        progress,
    } = ctx;

    let index = SymbolIndex::allocate(resolve_symbols(source, &opts.symbols)?);
    let total = index.len();
    if index.is_empty() {
        warn!("no symbols to ingest");
    }
    info!(symbols = total, calendar = calendar.name(), parallel = opts.parallel, "starting ingestion");

    let normalizer = PriceSeriesNormalizer::new(opts.low_policy);
    let mut metadata = MetadataTable::new(&index, opts.exchange.as_str());
    let mut tally = Tally::default();

    if opts.parallel {
        let prepared = normalize_parallel(&index, source, cache, calendar, normalizer, progress)?;
        let mut stream = Recording::new(prepared.into_iter(), &index, &mut metadata, &mut tally, progress);
        writers.bars.write_bars(&mut stream)?;
    } else {
        let inner = index.iter().enumerate().map(move |(i, (sid, symbol))| -> Result<Normalized> {
            progress.on_start(symbol, i, total);
            let raw = fetch_bars(source, &mut *cache, symbol)?;
            let (series, coverage) = normalizer.normalize(symbol, &raw, calendar)?;
            Ok(Normalized {
                sid,
                series,
                coverage,
            })
        });
        let mut stream = Recording::new(inner, &index, &mut metadata, &mut tally, progress);
        writers.bars.write_bars(&mut stream)?;
    }
    progress.on_batch_complete(tally.completed, total);

    let assets = metadata.finish(&index)?;
    writers.assets.write_equities(&assets)?;

    let events = source.corporate_actions()?;
    let tables = CorporateActionsDeriver::new().derive(&events, &index.symbol_map())?;
    writers.adjustments.write_adjustments(&tables)?;

    info!(
        symbols = assets.len(),
        sessions = tally.sessions,
        zero_filled = tally.zero_filled,
        splits = tables.splits.len(),
        dividends = tables.dividends.len(),
        "ingestion complete"
    );

    Ok(IngestSummary {
        assets,
        sessions: tally.sessions,
        zero_filled: tally.zero_filled,
        splits: tables.splits.len(),
        dividends: tables.dividends.len(),
    })
}

fn fetch_bars(source: &dyn RawDataSource, cache: &mut dyn BarCache, symbol: &str) -> Result<Vec<RawBar>> {
    read_through(cache, &cache_key(symbol, DataKind::Ohlcv), || {
        source.daily_bars(symbol)
    })
}

/// Sequential reads (one connection), then normalization on the rayon pool.
/// Results keep sid order.
fn normalize_parallel(
    index: &SymbolIndex,
    source: &dyn RawDataSource,
    cache: &mut dyn BarCache,
    calendar: &dyn TradingCalendar,
    normalizer: PriceSeriesNormalizer,
    progress: &dyn IngestProgress,
) -> Result<Vec<Result<Normalized>>> {
    let total = index.len();
    let mut raw: Vec<(Sid, &str, Vec<RawBar>)> = Vec::with_capacity(total);
    for (i, (sid, symbol)) in index.iter().enumerate() {
        progress.on_start(symbol, i, total);
        raw.push((sid, symbol, fetch_bars(source, cache, symbol)?));
    }

    Ok(raw
        .par_iter()
        .map(|(sid, symbol, bars)| -> Result<Normalized> {
            let (series, coverage) = normalizer.normalize(symbol, bars, calendar)?;
            Ok(Normalized {
                sid: *sid,
                series,
                coverage,
            })
        })
        .collect())
}

struct Normalized {
    sid: Sid,
    series: NormalizedSeries,
    coverage: Coverage,
}

#[derive(Default)]
struct Tally {
    completed: usize,
    sessions: usize,
    zero_filled: usize,
}

/// Passes series through to the bar writer, recording each symbol's
/// metadata row on the way. Yields nothing after the first error.
struct Recording<'a, I> {
    inner: I,
    index: &'a SymbolIndex,
    metadata: &'a mut MetadataTable,
    tally: &'a mut Tally,
    progress: &'a dyn IngestProgress,
    failed: bool,
}

impl<'a, I> Recording<'a, I> {
    fn new(
        inner: I,
        index: &'a SymbolIndex,
        metadata: &'a mut MetadataTable,
        tally: &'a mut Tally,
        progress: &'a dyn IngestProgress,
    ) -> Self {
        Self {
            inner,
            index,
            metadata,
            tally,
            progress,
            failed: false,
        }
    }

    fn record(&mut self, item: Normalized) -> Result<(Sid, NormalizedSeries)> {
        let Normalized {
            sid,
            series,
            coverage,
        } = item;
        check_sid(self.index, sid, &series.symbol)?;
        self.metadata.record(sid, &series.symbol, coverage)?;
        self.progress
            .on_complete(&series.symbol, sid.index(), self.index.len(), series.len());
        self.tally.completed += 1;
        self.tally.sessions += series.len();
        self.tally.zero_filled += series.zero_filled();
        Ok((sid, series))
    }
}

impl<I> Iterator for Recording<'_, I>
where
    I: Iterator<Item = Result<Normalized>>,
{
    type Item = Result<(Sid, NormalizedSeries)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = match self.inner.next()? {
            Ok(item) => self.record(item),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!(symbol = e.symbol().unwrap_or("-"), error = %e, "aborting ingestion");
            self.failed = true;
        }
        Some(result)
    }
}

/// A series must arrive under the sid its symbol was allocated.
fn check_sid(index: &SymbolIndex, sid: Sid, symbol: &str) -> Result<()> {
    if index.require(symbol)? != sid {
        return Err(BundleError::Mapping {
            symbol: symbol.to_string(),
        });
    }
    Ok(())
}

// ── Concrete wiring ──────────────────────────────────────────────────

/// What a committed run produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub path: PathBuf,
    pub manifest: BundleManifest,
    pub summary: IngestSummary,
}

/// Built-in calendars plus the configured holidays and alias.
///
/// Holidays replace the named calendar with a weekday calendar that skips them.
pub fn build_calendar_registry(section: &CalendarSection) -> Result<CalendarRegistry> {
    let mut registry = CalendarRegistry::with_defaults();
    if !section.holidays.is_empty() {
        registry.register(
            WeekdayCalendar::new(section.name.as_str()).with_holidays(section.holidays.iter().copied()),
        );
    }
    if let Some(alias) = &section.alias {
        registry.register_alias(alias, &section.name)?;
    }
    Ok(registry)
}

/// Ingest into a new bundle directory and commit it.
///
/// Nothing is left under the bundle directory when any step fails.
pub fn run_ingest(config: &IngestConfig) -> std::result::Result<IngestReport, IngestError> {
    run_ingest_with(config, &LogProgress)
}

pub fn run_ingest_with(
    config: &IngestConfig,
    progress: &dyn IngestProgress,
) -> std::result::Result<IngestReport, IngestError> {
    config.validate()?;

    let source = SqliteSource::open(&config.source.database, config.source.schema.clone())?;
    let registry = build_calendar_registry(&config.calendar)?;
    let calendar_name = config.calendar.bundle_calendar();
    let calendar = registry.get(calendar_name)?;

    let mut cache: Box<dyn BarCache> = match &config.cache.dir {
        Some(dir) => Box::new(ParquetCache::new(dir)),
        None => Box::new(MemoryCache::new()),
    };

    let created_at = Utc::now();
    let bundle = BundleDir::create(&config.bundle.output_dir, &config.bundle.name, created_at)?;
    let mut bars = ParquetBarWriter::new(bundle.staging());
    let mut assets = CsvAssetWriter::new(bundle.staging());
    let mut adjustments = CsvAdjustmentWriter::new(bundle.staging());

    let opts = IngestOptions {
        symbols: config.symbols.clone(),
        exchange: config.bundle.exchange.clone(),
        low_policy: config.normalize.low_policy,
        parallel: config.parallel,
    };
    let summary = ingest(
        IngestContext {
            source: &source,
            calendar: calendar.as_ref(),
            cache: &mut *cache,
            progress,
        },
        Writers {
            bars: &mut bars,
            assets: &mut assets,
            adjustments: &mut adjustments,
        },
        &opts,
    )?;

    let manifest = BundleManifest {
        version: MANIFEST_VERSION,
        bundle: config.bundle.name.clone(),
        calendar: calendar_name.to_string(),
        exchange: config.bundle.exchange.clone(),
        created_at,
        symbols: summary.assets.len(),
        sessions: summary.sessions,
        splits: summary.splits,
        dividends: summary.dividends,
        files: hash_files(bundle.staging())?,
    };
    let path = bundle.commit(&manifest)?;

    Ok(IngestReport {
        path,
        manifest,
        summary,
    })
}
