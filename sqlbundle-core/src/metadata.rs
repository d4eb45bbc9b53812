//! Dense sid allocation and the per-run asset metadata table.
//!
//! Sids are assigned `0..n` in the order symbols are processed. The same
//! index is used to write metadata rows and to build the symbol map handed to
//! the corporate-actions step, so no consumer has to infer ids from iteration
//! order.

use crate::domain::{Sid, SymbolMetadata};
use crate::error::{BundleError, Result};
use crate::normalize::Coverage;
use std::collections::{BTreeMap, HashMap};

/// Symbol ↔ sid mapping for one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct SymbolIndex {
    symbols: Vec<String>,
    by_symbol: HashMap<String, Sid>,
}

impl SymbolIndex {
    /// Assign dense sids in iteration order. Repeated symbols keep their
    /// first sid.
    pub fn allocate<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for symbol in symbols {
            let symbol = symbol.into();
            if index.by_symbol.contains_key(&symbol) {
                continue;
            }
            let sid = Sid(index.symbols.len() as u32);
            index.by_symbol.insert(symbol.clone(), sid);
            index.symbols.push(symbol);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn sid(&self, symbol: &str) -> Option<Sid> {
        self.by_symbol.get(symbol).copied()
    }

    /// Like [`sid`](Self::sid), but a missing symbol is a `Mapping` error.
    pub fn require(&self, symbol: &str) -> Result<Sid> {
        self.sid(symbol).ok_or_else(|| BundleError::Mapping {
            symbol: symbol.to_string(),
        })
    }

    pub fn symbol(&self, sid: Sid) -> Option<&str> {
        self.symbols.get(sid.index()).map(String::as_str)
    }

    /// `(sid, symbol)` pairs in sid order.
    pub fn iter(&self) -> impl Iterator<Item = (Sid, &str)> + '_ {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (Sid(i as u32), s.as_str()))
    }

    pub fn symbol_map(&self) -> BTreeMap<String, Sid> {
        self.by_symbol
            .iter()
            .map(|(symbol, sid)| (symbol.clone(), *sid))
            .collect()
    }
}

/// Asset metadata rows, one slot per sid.
#[derive(Debug, Clone)]
pub struct MetadataTable {
    exchange: String,
    rows: Vec<Option<SymbolMetadata>>,
}

impl MetadataTable {
    pub fn new(index: &SymbolIndex, exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            rows: vec![None; index.len()],
        }
    }

    /// Write one complete row. Rows are written whole or not at all.
    pub fn record(&mut self, sid: Sid, symbol: &str, coverage: Coverage) -> Result<()> {
        let slot = self
            .rows
            .get_mut(sid.index())
            .ok_or_else(|| BundleError::Mapping {
                symbol: symbol.to_string(),
            })?;
        *slot = Some(SymbolMetadata {
            sid,
            symbol: symbol.to_string(),
            start_date: coverage.start_date,
            end_date: coverage.end_date,
            auto_close_date: coverage.auto_close_date,
            exchange: self.exchange.clone(),
        });
        Ok(())
    }

    /// All rows in sid order; any sid without a row is a `Mapping` error.
    pub fn finish(self, index: &SymbolIndex) -> Result<Vec<SymbolMetadata>> {
        self.rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                row.ok_or_else(|| BundleError::Mapping {
                    symbol: index
                        .symbol(Sid(i as u32))
                        .unwrap_or("<unallocated>")
                        .to_string(),
                })
            })
            .collect()
    }
}
