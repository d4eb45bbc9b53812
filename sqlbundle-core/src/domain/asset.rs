use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense 0-based asset identifier, assigned in symbol-processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sid(pub u32);

impl Sid {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the asset registry table.
///
/// Recorded once per run when the symbol's price series is normalized and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMetadata {
    pub sid: Sid,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// First calendar day after `end_date`; the engine treats the asset as
    /// inactive from here on.
    pub auto_close_date: NaiveDate,
    pub exchange: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sid_orders_and_displays_numerically() {
        assert!(Sid(2) < Sid(10));
        assert_eq!(Sid(7).to_string(), "7");
        assert_eq!(Sid(3).index(), 3);
    }
}
