//! SQLite-backed raw data source.
//!
//! The connection is opened read-only when the source is constructed and
//! closed when it is dropped. Symbol values are always bound as parameters;
//! only validated table/column names reach the query text.

use super::source::{RawDataSource, SourceSchema};
use crate::domain::{RawBar, RawCorporateActionEvent};
use crate::error::{BundleError, Result};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use tracing::{debug, info};

pub struct SqliteSource {
    conn: Connection,
    schema: SourceSchema,
}

impl SqliteSource {
    /// Open the database at `path` read-only.
    pub fn open(path: impl AsRef<Path>, schema: SourceSchema) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BundleError::SourceUnavailable {
                path: path.to_path_buf(),
            });
        }
        schema.validate()?;

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!(path = %path.display(), "opened source database");

        Ok(Self { conn, schema })
    }

    /// Wrap an already-open connection (in-memory databases, tests).
    pub fn from_connection(conn: Connection, schema: SourceSchema) -> Result<Self> {
        schema.validate()?;
        Ok(Self { conn, schema })
    }
}

impl RawDataSource for SqliteSource {
    fn list_symbols(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&self.schema.symbols_query())?;
        let symbols = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(count = symbols.len(), "listed source symbols");
        Ok(symbols)
    }

    fn daily_bars(&self, symbol: &str) -> Result<Vec<RawBar>> {
        let mut stmt = self.conn.prepare(&self.schema.bars_query())?;
        let rows = stmt
            .query_map([symbol], |row| {
                Ok((
                    row.get::<_, Value>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut bars = Vec::with_capacity(rows.len());
        for (date, open, high, close, volume) in rows {
            let date = parse_date(&date).ok_or_else(|| {
                BundleError::integrity(symbol, format!("unparseable bar date {date:?}"))
            })?;
            // NULL prices carry no information; they are stored as zero like
            // any other session without trading
            bars.push(RawBar {
                date,
                open: open.unwrap_or(0.0),
                high: high.unwrap_or(0.0),
                close: close.unwrap_or(0.0),
                volume: volume.unwrap_or(0.0),
            });
        }
        debug!(symbol, rows = bars.len(), "read daily bars");
        Ok(bars)
    }

    fn corporate_actions(&self) -> Result<Vec<RawCorporateActionEvent>> {
        let mut stmt = self.conn.prepare(&self.schema.actions_query())?;
        let rows = stmt
            .query_map([self.schema.action_category], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Value>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut events = Vec::with_capacity(rows.len());
        for (symbol, date, px, sg) in rows {
            let date = parse_date(&date).ok_or_else(|| {
                BundleError::integrity(&symbol, format!("unparseable corporate action date {date:?}"))
            })?;
            events.push(RawCorporateActionEvent {
                symbol,
                date,
                price_adjustment: px.unwrap_or(0.0),
                share_adjustment: sg.unwrap_or(0.0),
            });
        }
        debug!(rows = events.len(), "read corporate actions");
        Ok(events)
    }
}

/// Parse a date stored as `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYYMMDD`
/// text, or a `YYYYMMDD` integer.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Text(s) => parse_date_str(s),
        Value::Integer(n) => from_yyyymmdd(*n),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Some(prefix) = s.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(d);
        }
    }
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok().and_then(from_yyyymmdd);
    }
    None
}

fn from_yyyymmdd(n: i64) -> Option<NaiveDate> {
    if !(10_000_101..=99_991_231).contains(&n) {
        return None;
    }
    NaiveDate::from_ymd_opt((n / 10_000) as i32, ((n / 100) % 100) as u32, (n % 100) as u32)
}
