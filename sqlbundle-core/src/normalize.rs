//! Price-series normalization.
//!
//! Given one symbol's raw bars and a trading calendar, derive the coverage
//! window and re-index the bars onto every calendar session inside it.
//! Sessions without a raw row get an all-zero bar (no forward-fill, no
//! interpolation); the engine reads zero volume as "no trading activity".

use crate::calendar::TradingCalendar;
use crate::domain::{NormalizedBar, NormalizedSeries, RawBar};
use crate::error::{BundleError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// How the low price is filled in, given the source has none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowPolicy {
    /// `low = min(open, close)` for observed sessions.
    #[default]
    MinOpenClose,
    /// `low = 0` everywhere.
    Zero,
}

impl LowPolicy {
    fn low(self, bar: &RawBar) -> f64 {
        match self {
            LowPolicy::MinOpenClose => bar.open.min(bar.close),
            LowPolicy::Zero => 0.0,
        }
    }
}

/// A symbol's observed date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// `end_date` plus one calendar day (not one session).
    pub auto_close_date: NaiveDate,
}

impl Coverage {
    /// True min/max over `bars`, regardless of row order.
    pub fn from_bars(symbol: &str, bars: &[RawBar]) -> Result<Self> {
        let mut dates = bars.iter().map(|b| b.date);
        let first = dates.next().ok_or_else(|| BundleError::NoData {
            symbol: symbol.to_string(),
        })?;
        let (start_date, end_date) =
            dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));

        let auto_close_date = end_date
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| BundleError::integrity(symbol, "end date at calendar limit"))?;

        Ok(Self {
            start_date,
            end_date,
            auto_close_date,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PriceSeriesNormalizer {
    low_policy: LowPolicy,
}

impl PriceSeriesNormalizer {
    pub fn new(low_policy: LowPolicy) -> Self {
        Self { low_policy }
    }

    /// Normalize one symbol's raw bars onto `calendar`.
    ///
    /// Fails with `NoData` for an empty input and `DataIntegrity` for
    /// duplicate dates, non-finite values, or a window holding no session.
    pub fn normalize(
        &self,
        symbol: &str,
        raw: &[RawBar],
        calendar: &dyn TradingCalendar,
    ) -> Result<(NormalizedSeries, Coverage)> {
        let coverage = Coverage::from_bars(symbol, raw)?;
        let observed = self.to_normalized(symbol, raw)?;

        let sessions = calendar.sessions_in_range(coverage.start_date, coverage.end_date);
        if sessions.is_empty() {
            return Err(BundleError::integrity(
                symbol,
                format!(
                    "no raw rows on {} sessions between {} and {}",
                    calendar.name(),
                    coverage.start_date,
                    coverage.end_date
                ),
            ));
        }
        let bars = reindex_bars(&observed, &sessions);

        let session_set: HashSet<NaiveDate> = sessions.iter().copied().collect();
        let off_calendar = observed
            .iter()
            .filter(|b| !session_set.contains(&b.date))
            .count();
        if off_calendar > 0 {
            debug!(
                symbol,
                off_calendar,
                calendar = calendar.name(),
                "dropped raw rows outside calendar sessions"
            );
        }
        debug!(
            symbol,
            start = %coverage.start_date,
            end = %coverage.end_date,
            sessions = sessions.len(),
            "normalized price series"
        );

        Ok((
            NormalizedSeries {
                symbol: symbol.to_string(),
                bars,
            },
            coverage,
        ))
    }

    fn to_normalized(&self, symbol: &str, raw: &[RawBar]) -> Result<Vec<NormalizedBar>> {
        let mut seen: HashSet<NaiveDate> = HashSet::with_capacity(raw.len());
        let mut out = Vec::with_capacity(raw.len());
        for bar in raw {
            if !bar.is_finite() {
                return Err(BundleError::integrity(
                    symbol,
                    format!("non-finite price or volume on {}", bar.date),
                ));
            }
            if !seen.insert(bar.date) {
                return Err(BundleError::integrity(
                    symbol,
                    format!("duplicate bar date {}", bar.date),
                ));
            }
            out.push(NormalizedBar {
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: self.low_policy.low(bar),
                close: bar.close,
                volume: bar.volume,
            });
        }
        Ok(out)
    }
}

/// Re-index `bars` onto `sessions`.
///
/// Sessions with a matching bar keep it, the rest become all-zero bars, and
/// bars on dates outside `sessions` are dropped. Applying this twice with the
/// same sessions is the same as applying it once.
pub fn reindex_bars(bars: &[NormalizedBar], sessions: &[NaiveDate]) -> Vec<NormalizedBar> {
    let by_date: HashMap<NaiveDate, &NormalizedBar> = bars.iter().map(|b| (b.date, b)).collect();
    sessions
        .iter()
        .map(|date| {
            by_date
                .get(date)
                .map(|b| (*b).clone())
                .unwrap_or_else(|| NormalizedBar::zero(*date))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{WeekdayCalendar, SHSZ};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn raw(d: &str, open: f64, high: f64, close: f64, volume: f64) -> RawBar {
        RawBar {
            date: date(d),
            open,
            high,
            close,
            volume,
        }
    }

    fn scenario_rows() -> Vec<RawBar> {
        vec![
            raw("2020-01-02", 10.0, 11.0, 10.5, 100.0),
            raw("2020-01-06", 10.5, 12.0, 11.0, 200.0),
        ]
    }

    #[test]
    fn calendar_gap_needs_no_fill() {
        // 2020-01-03 closed, 2020-01-04/05 weekend
        let cal = WeekdayCalendar::new(SHSZ).with_holidays([date("2020-01-03")]);
        let normalizer = PriceSeriesNormalizer::default();

        let (series, coverage) = normalizer.normalize("SZ300079", &scenario_rows(), &cal).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.zero_filled(), 0);
        assert_eq!(series.bars[0].open, 10.0);
        assert_eq!(series.bars[0].high, 11.0);
        assert_eq!(series.bars[0].close, 10.5);
        assert_eq!(series.bars[0].volume, 100.0);
        assert_eq!(series.bars[1].close, 11.0);
        assert_eq!(series.bars[1].volume, 200.0);
        assert_eq!(coverage.start_date, date("2020-01-02"));
        assert_eq!(coverage.end_date, date("2020-01-06"));
        assert_eq!(coverage.auto_close_date, date("2020-01-07"));
    }

    #[test]
    fn missing_session_is_zero_filled() {
        let cal = WeekdayCalendar::new(SHSZ);
        let (series, _) = PriceSeriesNormalizer::default()
            .normalize("SZ300079", &scenario_rows(), &cal)
            .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.bars[1], NormalizedBar::zero(date("2020-01-03")));
        assert_eq!(series.zero_filled(), 1);
    }

    #[test]
    fn unsorted_input_uses_true_bounds() {
        let cal = WeekdayCalendar::new(SHSZ);
        let rows = vec![
            raw("2020-01-06", 1.0, 1.0, 1.0, 1.0),
            raw("2020-01-02", 1.0, 1.0, 1.0, 1.0),
            raw("2020-01-03", 1.0, 1.0, 1.0, 1.0),
        ];
        let (series, coverage) = PriceSeriesNormalizer::default()
            .normalize("SH000001", &rows, &cal)
            .unwrap();

        assert_eq!(coverage.start_date, date("2020-01-02"));
        assert_eq!(coverage.end_date, date("2020-01-06"));
        assert_eq!(series.dates().next(), Some(date("2020-01-02")));
        assert_eq!(series.dates().last(), Some(date("2020-01-06")));
    }

    #[test]
    fn empty_input_is_no_data() {
        let cal = WeekdayCalendar::new(SHSZ);
        let err = PriceSeriesNormalizer::default()
            .normalize("SH000001", &[], &cal)
            .unwrap_err();
        assert!(matches!(err, BundleError::NoData { symbol } if symbol == "SH000001"));
    }

    #[test]
    fn duplicate_dates_are_rejected() {
        let cal = WeekdayCalendar::new(SHSZ);
        let rows = vec![
            raw("2020-01-02", 1.0, 1.0, 1.0, 1.0),
            raw("2020-01-02", 2.0, 2.0, 2.0, 2.0),
        ];
        let err = PriceSeriesNormalizer::default()
            .normalize("SH000001", &rows, &cal)
            .unwrap_err();
        assert!(matches!(err, BundleError::DataIntegrity { .. }));
    }

    #[test]
    fn nan_is_rejected() {
        let cal = WeekdayCalendar::new(SHSZ);
        let rows = vec![raw("2020-01-02", f64::NAN, 1.0, 1.0, 1.0)];
        assert!(PriceSeriesNormalizer::default()
            .normalize("SH000001", &rows, &cal)
            .is_err());
    }

    #[test]
    fn weekend_row_is_dropped() {
        let cal = WeekdayCalendar::new(SHSZ);
        let rows = vec![
            raw("2020-01-03", 1.0, 1.0, 1.0, 1.0),
            raw("2020-01-04", 9.0, 9.0, 9.0, 9.0),
            raw("2020-01-06", 1.0, 1.0, 1.0, 1.0),
        ];
        let (series, _) = PriceSeriesNormalizer::default()
            .normalize("SH000001", &rows, &cal)
            .unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.bars.iter().all(|b| b.close == 1.0));
    }

    #[test]
    fn rows_only_on_closed_days_are_rejected() {
        let cal = WeekdayCalendar::new(SHSZ).with_holidays([date("2020-01-03")]);
        // Friday holiday plus the weekend after it
        let rows = vec![
            raw("2020-01-03", 1.0, 1.0, 1.0, 1.0),
            raw("2020-01-04", 1.0, 1.0, 1.0, 1.0),
        ];
        let err = PriceSeriesNormalizer::default()
            .normalize("SZ300079", &rows, &cal)
            .unwrap_err();
        assert!(matches!(err, BundleError::DataIntegrity { symbol, .. } if symbol == "SZ300079"));

        let weekend_only = vec![raw("2020-01-04", 1.0, 1.0, 1.0, 1.0)];
        assert!(PriceSeriesNormalizer::default()
            .normalize("SZ300079", &weekend_only, &WeekdayCalendar::new(SHSZ))
            .is_err());
    }

    #[test]
    fn low_policies() {
        let cal = WeekdayCalendar::new(SHSZ);
        let rows = vec![raw("2020-01-02", 10.0, 11.0, 10.5, 100.0)];

        let (series, _) = PriceSeriesNormalizer::new(LowPolicy::MinOpenClose)
            .normalize("SZ300079", &rows, &cal)
            .unwrap();
        assert_eq!(series.bars[0].low, 10.0);

        let (series, _) = PriceSeriesNormalizer::new(LowPolicy::Zero)
            .normalize("SZ300079", &rows, &cal)
            .unwrap();
        assert_eq!(series.bars[0].low, 0.0);
    }

    #[test]
    fn reindex_is_idempotent() {
        let cal = WeekdayCalendar::new(SHSZ);
        let (series, coverage) = PriceSeriesNormalizer::default()
            .normalize("SZ300079", &scenario_rows(), &cal)
            .unwrap();
        let sessions = cal.sessions_in_range(coverage.start_date, coverage.end_date);
        assert_eq!(reindex_bars(&series.bars, &sessions), series.bars);
    }

    #[test]
    fn low_policy_parses_from_snake_case() {
        let policy: LowPolicy = serde_json::from_str("\"zero\"").unwrap();
        assert_eq!(policy, LowPolicy::Zero);
        let policy: LowPolicy = serde_json::from_str("\"min_open_close\"").unwrap();
        assert_eq!(policy, LowPolicy::MinOpenClose);
    }
}
