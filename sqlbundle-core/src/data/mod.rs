//! Raw data access: source database and read-through cache

pub mod cache;
pub mod source;
pub mod sqlite;

pub use cache::{cache_key, read_through, BarCache, DataKind, MemoryCache, ParquetCache};
pub use source::{RawDataSource, SourceSchema};
pub use sqlite::SqliteSource;
