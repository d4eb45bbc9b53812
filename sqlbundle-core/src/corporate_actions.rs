//! Split and dividend derivation from raw corporate-action rows.
//!
//! Source rows quote both adjustments per 10 shares:
//! - share adjustment `v` (bonus shares per 10) becomes a split with
//!   `ratio = 10 / (10 + v)`;
//! - price adjustment `p` (cash per 10 shares) becomes a dividend with
//!   `amount = p / 10`.
//!
//! One row can produce a split, a dividend, both, or neither.

use crate::domain::{AdjustmentTables, DividendEvent, RawCorporateActionEvent, Sid, SplitEvent};
use crate::error::{BundleError, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Number of shares the source's adjustment values are quoted against.
pub const SHARE_BASIS: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct CorporateActionsDeriver;

impl CorporateActionsDeriver {
    pub fn new() -> Self {
        Self
    }

    /// `10 / (10 + share_adjustment)`; a zero denominator is an integrity error.
    pub fn split_ratio(&self, symbol: &str, share_adjustment: f64) -> Result<f64> {
        if !share_adjustment.is_finite() {
            return Err(BundleError::integrity(
                symbol,
                format!("non-finite share adjustment {share_adjustment}"),
            ));
        }
        let denominator = SHARE_BASIS + share_adjustment;
        if denominator == 0.0 {
            return Err(BundleError::integrity(
                symbol,
                format!("split denominator is zero (share adjustment {share_adjustment})"),
            ));
        }
        Ok(SHARE_BASIS / denominator)
    }

    pub fn dividend_amount(&self, symbol: &str, price_adjustment: f64) -> Result<f64> {
        if !price_adjustment.is_finite() {
            return Err(BundleError::integrity(
                symbol,
                format!("non-finite price adjustment {price_adjustment}"),
            ));
        }
        Ok(price_adjustment / SHARE_BASIS)
    }

    /// Derive one symbol's events, ordered by date.
    pub fn derive_symbol(
        &self,
        sid: Sid,
        events: &[&RawCorporateActionEvent],
    ) -> Result<AdjustmentTables> {
        let mut tables = AdjustmentTables::default();
        for event in events {
            if event.share_adjustment != 0.0 {
                tables.splits.push(SplitEvent {
                    sid,
                    effective_date: event.date,
                    ratio: self.split_ratio(&event.symbol, event.share_adjustment)?,
                });
            }
            if event.price_adjustment != 0.0 {
                tables.dividends.push(DividendEvent::cash(
                    sid,
                    event.date,
                    self.dividend_amount(&event.symbol, event.price_adjustment)?,
                ));
            }
        }
        tables.splits.sort_by_key(|s| s.effective_date);
        tables.dividends.sort_by_key(|d| d.ex_date);
        Ok(tables)
    }

    /// Derive split and dividend tables for every mapped symbol.
    ///
    /// Symbols missing from `symbol_map` are skipped. Output is ordered by
    /// sid, then by date.
    pub fn derive(
        &self,
        events: &[RawCorporateActionEvent],
        symbol_map: &BTreeMap<String, Sid>,
    ) -> Result<AdjustmentTables> {
        let mut by_symbol: BTreeMap<&str, Vec<&RawCorporateActionEvent>> = BTreeMap::new();
        for event in events {
            by_symbol.entry(event.symbol.as_str()).or_default().push(event);
        }

        let mut parts: Vec<(Sid, AdjustmentTables)> = Vec::with_capacity(by_symbol.len());
        for (symbol, rows) in &by_symbol {
            let Some(&sid) = symbol_map.get(*symbol) else {
                debug!(symbol, rows = rows.len(), "skipping corporate actions for untracked symbol");
                continue;
            };
            parts.push((sid, self.derive_symbol(sid, rows)?));
        }
        parts.sort_by_key(|(sid, _)| *sid);

        let tables = AdjustmentTables::merge(parts.into_iter().map(|(_, t)| t));
        info!(
            splits = tables.splits.len(),
            dividends = tables.dividends.len(),
            "derived corporate actions"
        );
        Ok(tables)
    }
}
