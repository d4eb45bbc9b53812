//! Property tests for the ingestion run over an in-memory source.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use sqlbundle_core::calendar::{TradingCalendar, WeekdayCalendar, SHSZ};
use sqlbundle_core::data::{MemoryCache, RawDataSource};
use sqlbundle_core::domain::{
    AdjustmentTables, NormalizedSeries, RawBar, RawCorporateActionEvent, Sid, SymbolMetadata,
};
use sqlbundle_core::Result;
use sqlbundle_ingest::writer::{AdjustmentWriter, AssetWriter, BarWriter};
use sqlbundle_ingest::{ingest, IngestContext, IngestOptions, NoProgress, Writers};
use std::collections::BTreeMap;

struct MapSource {
    bars: BTreeMap<String, Vec<RawBar>>,
}

impl RawDataSource for MapSource {
    fn list_symbols(&self) -> Result<Vec<String>> {
        Ok(self.bars.keys().rev().cloned().collect())
    }

    fn daily_bars(&self, symbol: &str) -> Result<Vec<RawBar>> {
        Ok(self.bars.get(symbol).cloned().unwrap_or_default())
    }

    fn corporate_actions(&self) -> Result<Vec<RawCorporateActionEvent>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct Sink {
    series: Vec<(Sid, NormalizedSeries)>,
    assets: Vec<SymbolMetadata>,
}

impl BarWriter for Sink {
    fn write_bars(
        &mut self,
        bars: &mut dyn Iterator<Item = Result<(Sid, NormalizedSeries)>>,
    ) -> Result<usize> {
        for item in bars {
            self.series.push(item?);
        }
        Ok(self.series.len())
    }
}

impl AssetWriter for Sink {
    fn write_equities(&mut self, rows: &[SymbolMetadata]) -> Result<()> {
        self.assets = rows.to_vec();
        Ok(())
    }
}

struct Discard;

impl AdjustmentWriter for Discard {
    fn write_adjustments(&mut self, _tables: &AdjustmentTables) -> Result<()> {
        Ok(())
    }
}

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn arb_bars() -> impl Strategy<Value = Vec<RawBar>> {
    prop::collection::btree_set(0i64..120, 1..30).prop_map(|mut offsets| {
        // 2020-01-01 is a Wednesday, so every symbol has a session
        offsets.insert(0);
        offsets
            .into_iter()
            .map(|d| RawBar {
                date: base() + Duration::days(d),
                open: 10.0,
                high: 11.0,
                close: 10.5,
                volume: 100.0,
            })
            .collect()
    })
}

fn arb_universe() -> impl Strategy<Value = BTreeMap<String, Vec<RawBar>>> {
    prop::collection::btree_map("[A-Z]{2}[0-9]{4}", arb_bars(), 1..6)
}

fn run(source: &MapSource, parallel: bool) -> Sink {
    let calendar = WeekdayCalendar::new(SHSZ);
    let mut cache = MemoryCache::new();
    let mut sink = Sink::default();
    let mut assets = Sink::default();
    let opts = IngestOptions {
        exchange: "sqlitedb".into(),
        parallel,
        ..IngestOptions::default()
    };
    ingest(
        IngestContext {
            source,
            calendar: &calendar,
            cache: &mut cache,
            progress: &NoProgress,
        },
        Writers {
            bars: &mut sink,
            assets: &mut assets,
            adjustments: &mut Discard,
        },
        &opts,
    )
    .unwrap();
    sink.assets = assets.assets;
    sink
}

proptest! {
    #[test]
    fn sids_are_dense_and_series_match_sessions(bars in arb_universe()) {
        let source = MapSource { bars };
        let sink = run(&source, false);
        let calendar = WeekdayCalendar::new(SHSZ);

        prop_assert_eq!(sink.assets.len(), source.bars.len());
        for (i, (sid, series)) in sink.series.iter().enumerate() {
            prop_assert_eq!(*sid, Sid(i as u32));
            let row = &sink.assets[i];
            prop_assert_eq!(row.sid, *sid);
            prop_assert_eq!(&row.symbol, &series.symbol);
            let sessions = calendar.sessions_in_range(row.start_date, row.end_date);
            prop_assert_eq!(series.dates().collect::<Vec<_>>(), sessions);
        }
    }

    #[test]
    fn parallel_and_sequential_agree(bars in arb_universe()) {
        let source = MapSource { bars };
        let sequential = run(&source, false);
        let parallel = run(&source, true);
        prop_assert_eq!(sequential.series, parallel.series);
        prop_assert_eq!(sequential.assets, parallel.assets);
    }
}
