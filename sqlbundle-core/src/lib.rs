//! sqlbundle core: everything between the source database and the bundle writers.
//!
//! This crate contains:
//! - Domain types (raw/normalized bars, corporate-action rows, splits, dividends, asset metadata)
//! - Error taxonomy shared by all stages of a run
//! - Trading calendars with a name/alias registry
//! - SQLite raw data source and a read-through bar cache
//! - Price-series normalization onto calendar sessions
//! - Split/dividend derivation
//! - Dense sid allocation and the asset metadata table

pub mod calendar;
pub mod corporate_actions;
pub mod data;
pub mod domain;
pub mod error;
pub mod metadata;
pub mod normalize;

pub use calendar::{CalendarRegistry, TradingCalendar, WeekdayCalendar};
pub use corporate_actions::CorporateActionsDeriver;
pub use error::{BundleError, Result};
pub use metadata::{MetadataTable, SymbolIndex};
pub use normalize::{Coverage, LowPolicy, PriceSeriesNormalizer};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across the rayon pool are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::RawBar>();
        require_sync::<domain::RawBar>();
        require_send::<domain::NormalizedSeries>();
        require_sync::<domain::NormalizedSeries>();
        require_send::<domain::SymbolMetadata>();
        require_sync::<domain::SymbolMetadata>();
        require_send::<Coverage>();
        require_sync::<Coverage>();
        require_send::<PriceSeriesNormalizer>();
        require_sync::<PriceSeriesNormalizer>();
        require_send::<WeekdayCalendar>();
        require_sync::<WeekdayCalendar>();
        require_send::<BundleError>();
        require_sync::<BundleError>();
    }
}
