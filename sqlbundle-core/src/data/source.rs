//! Raw data source trait and the table layout it reads from.

use crate::domain::{RawBar, RawCorporateActionEvent};
use crate::error::{BundleError, Result};
use serde::{Deserialize, Serialize};

/// Read side of the relational store holding raw prices and corporate actions.
///
/// Implementations own their connection; dropping the source releases it.
pub trait RawDataSource {
    /// Every symbol the store knows about.
    fn list_symbols(&self) -> Result<Vec<String>>;

    /// Daily bars for one symbol. Order is not guaranteed.
    fn daily_bars(&self, symbol: &str) -> Result<Vec<RawBar>>;

    /// Corporate-action rows of the configured category, for all symbols.
    fn corporate_actions(&self) -> Result<Vec<RawCorporateActionEvent>>;
}

/// Table and column names of the source database.
///
/// Defaults match the layout the ingestion tool was built against:
/// `stock(symbol)`, `stock_history(symbol, stat_date, open, high, close, vol)`
/// and `divs_splits(symbol, date, fenhong, songzhuangu, category)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSchema {
    pub symbols_table: String,
    pub symbols_column: String,

    pub bars_table: String,
    pub bars_symbol: String,
    pub bars_date: String,
    pub bars_open: String,
    pub bars_high: String,
    pub bars_close: String,
    pub bars_volume: String,

    pub actions_table: String,
    pub actions_symbol: String,
    pub actions_date: String,
    pub actions_price_adjustment: String,
    pub actions_share_adjustment: String,
    pub actions_category: String,
    /// Only rows with this category value are read.
    pub action_category: i64,
}

impl Default for SourceSchema {
    fn default() -> Self {
        Self {
            symbols_table: "stock".into(),
            symbols_column: "symbol".into(),
            bars_table: "stock_history".into(),
            bars_symbol: "symbol".into(),
            bars_date: "stat_date".into(),
            bars_open: "open".into(),
            bars_high: "high".into(),
            bars_close: "close".into(),
            bars_volume: "vol".into(),
            actions_table: "divs_splits".into(),
            actions_symbol: "symbol".into(),
            actions_date: "date".into(),
            actions_price_adjustment: "fenhong".into(),
            actions_share_adjustment: "songzhuangu".into(),
            actions_category: "category".into(),
            action_category: 1,
        }
    }
}

impl SourceSchema {
    /// Reject identifiers that are not plain SQL names.
    ///
    /// Names are spliced into query text, so only `[A-Za-z_][A-Za-z0-9_]*`
    /// is accepted.
    pub fn validate(&self) -> Result<()> {
        for ident in self.identifiers() {
            if !is_plain_identifier(ident) {
                return Err(BundleError::Query(format!(
                    "invalid table or column name '{ident}'"
                )));
            }
        }
        Ok(())
    }

    pub fn symbols_query(&self) -> String {
        format!(
            "SELECT DISTINCT {col} FROM {table} ORDER BY {col}",
            col = self.symbols_column,
            table = self.symbols_table,
        )
    }

    pub fn bars_query(&self) -> String {
        format!(
            "SELECT {date}, {open}, {high}, {close}, {volume} FROM {table} \
             WHERE {symbol} = ?1 ORDER BY {date} ASC",
            date = self.bars_date,
            open = self.bars_open,
            high = self.bars_high,
            close = self.bars_close,
            volume = self.bars_volume,
            table = self.bars_table,
            symbol = self.bars_symbol,
        )
    }

    pub fn actions_query(&self) -> String {
        format!(
            "SELECT {symbol}, {date}, {px}, {sg} FROM {table} \
             WHERE {category} = ?1 ORDER BY {symbol}, {date}",
            symbol = self.actions_symbol,
            date = self.actions_date,
            px = self.actions_price_adjustment,
            sg = self.actions_share_adjustment,
            table = self.actions_table,
            category = self.actions_category,
        )
    }

    fn identifiers(&self) -> [&str; 15] {
        [
            self.symbols_table.as_str(),
            self.symbols_column.as_str(),
            self.bars_table.as_str(),
            self.bars_symbol.as_str(),
            self.bars_date.as_str(),
            self.bars_open.as_str(),
            self.bars_high.as_str(),
            self.bars_close.as_str(),
            self.bars_volume.as_str(),
            self.actions_table.as_str(),
            self.actions_symbol.as_str(),
            self.actions_date.as_str(),
            self.actions_price_adjustment.as_str(),
            self.actions_share_adjustment.as_str(),
            self.actions_category.as_str(),
        ]
    }
}

fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
