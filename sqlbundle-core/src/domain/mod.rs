//! Domain types for a single ingestion run.

pub mod adjustment;
pub mod asset;
pub mod bar;

pub use adjustment::{AdjustmentTables, DividendEvent, RawCorporateActionEvent, SplitEvent};
pub use asset::{Sid, SymbolMetadata};
pub use bar::{NormalizedBar, NormalizedSeries, RawBar};
