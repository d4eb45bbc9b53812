//! Corporate-action rows and the split/dividend tables derived from them.

use super::asset::Sid;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One corporate-action row as stored in the source.
///
/// Both adjustment values are quoted per 10 shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCorporateActionEvent {
    pub symbol: String,
    pub date: NaiveDate,
    /// Cash paid per 10 shares.
    pub price_adjustment: f64,
    /// Bonus/transferred shares per 10 shares.
    pub share_adjustment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitEvent {
    pub sid: Sid,
    pub effective_date: NaiveDate,
    /// Share-count multiplier in the engine's convention; below 1 means dilution.
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub sid: Sid,
    pub ex_date: NaiveDate,
    pub amount: f64,
    pub record_date: Option<NaiveDate>,
    pub declared_date: Option<NaiveDate>,
    pub pay_date: Option<NaiveDate>,
}

impl DividendEvent {
    /// Cash dividend with only the ex-date known.
    pub fn cash(sid: Sid, ex_date: NaiveDate, amount: f64) -> Self {
        Self {
            sid,
            ex_date,
            amount,
            record_date: None,
            declared_date: None,
            pay_date: None,
        }
    }
}

/// Split and dividend tables handed to the adjustment writer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentTables {
    pub splits: Vec<SplitEvent>,
    pub dividends: Vec<DividendEvent>,
}

impl AdjustmentTables {
    /// Concatenate per-symbol tables in the given order.
    ///
    /// Zero parts, or parts that are all empty, produce empty tables rather
    /// than an error.
    pub fn merge(parts: impl IntoIterator<Item = AdjustmentTables>) -> Self {
        parts
            .into_iter()
            .fold(AdjustmentTables::default(), |mut acc, part| {
                acc.splits.extend(part.splits);
                acc.dividends.extend(part.dividends);
                acc
            })
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty() && self.dividends.is_empty()
    }
}
