//! Bars before and after calendar alignment.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily bar as stored in the source database.
///
/// The source carries no low price; see [`crate::normalize::LowPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub close: f64,
    pub volume: f64,
}

impl RawBar {
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// Bar aligned to a trading session, in the column layout the bar writer expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl NormalizedBar {
    /// All-zero bar for a session with no raw row.
    pub fn zero(date: NaiveDate) -> Self {
        Self {
            date,
            open: 0.0,
            high: 0.0,
            low: 0.0,
            close: 0.0,
            volume: 0.0,
        }
    }

    /// True for bars that carry no trading activity at all.
    ///
    /// Zero-filled sessions and genuinely halted days with zero prices are
    /// indistinguishable here.
    pub fn is_zero_fill(&self) -> bool {
        self.open == 0.0
            && self.high == 0.0
            && self.low == 0.0
            && self.close == 0.0
            && self.volume == 0.0
    }
}

/// One symbol's bars re-indexed onto consecutive calendar sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSeries {
    pub symbol: String,
    pub bars: Vec<NormalizedBar>,
}

impl NormalizedSeries {
    /// Column order of every persisted series.
    pub const COLUMNS: [&'static str; 5] = ["open", "high", "low", "close", "volume"];

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().map(|b| b.date)
    }

    pub fn zero_filled(&self) -> usize {
        self.bars.iter().filter(|b| b.is_zero_fill()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn zero_bar_is_zero_fill() {
        assert!(NormalizedBar::zero(date("2020-01-02")).is_zero_fill());
    }

    #[test]
    fn traded_bar_is_not_zero_fill() {
        let bar = NormalizedBar {
            date: date("2020-01-02"),
            open: 10.0,
            high: 11.0,
            low: 10.0,
            close: 10.5,
            volume: 100.0,
        };
        assert!(!bar.is_zero_fill());
    }

    #[test]
    fn raw_bar_rejects_nan() {
        let mut bar = RawBar {
            date: date("2020-01-02"),
            open: 10.0,
            high: 11.0,
            close: 10.5,
            volume: 100.0,
        };
        assert!(bar.is_finite());
        bar.close = f64::NAN;
        assert!(!bar.is_finite());
    }

    #[test]
    fn series_counts_zero_filled_sessions() {
        let series = NormalizedSeries {
            symbol: "SH000001".into(),
            bars: vec![
                NormalizedBar::zero(date("2020-01-02")),
                NormalizedBar {
                    date: date("2020-01-03"),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 5.0,
                },
            ],
        };
        assert_eq!(series.len(), 2);
        assert_eq!(series.zero_filled(), 1);
        assert_eq!(
            series.dates().collect::<Vec<_>>(),
            vec![date("2020-01-02"), date("2020-01-03")]
        );
    }
}
