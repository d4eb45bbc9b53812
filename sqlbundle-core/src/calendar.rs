//! Trading calendars and the name/alias registry used to look them up.
//!
//! A calendar answers one question for the normalizer: which dates between two
//! bounds are trading sessions. Bundles name their calendar; the registry maps
//! that name (or an alias of it) to an implementation.

use crate::error::{BundleError, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Shanghai/Shenzhen exchange calendar name.
pub const SHSZ: &str = "SHSZ";

pub trait TradingCalendar: Send + Sync {
    fn name(&self) -> &str;

    fn is_session(&self, date: NaiveDate) -> bool;

    /// Ascending sessions in `[start, end]`, both bounds inclusive.
    ///
    /// Empty when `start > end`.
    fn sessions_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_session(*d))
            .collect()
    }
}

/// Monday–Friday calendar minus an explicit holiday set.
#[derive(Debug, Clone)]
pub struct WeekdayCalendar {
    name: String,
    holidays: BTreeSet<NaiveDate>,
}

impl WeekdayCalendar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            holidays: BTreeSet::new(),
        }
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }
}

impl TradingCalendar for WeekdayCalendar {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_session(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }
}

/// Calendars by name, plus aliases pointing at registered names.
#[derive(Default, Clone)]
pub struct CalendarRegistry {
    calendars: HashMap<String, Arc<dyn TradingCalendar>>,
    aliases: HashMap<String, String>,
}

impl CalendarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `SHSZ` weekday calendar.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(WeekdayCalendar::new(SHSZ));
        registry
    }

    /// Register (or replace) a calendar under its own name.
    pub fn register(&mut self, calendar: impl TradingCalendar + 'static) {
        let name = calendar.name().to_string();
        self.aliases.remove(&name);
        self.calendars.insert(name, Arc::new(calendar));
    }

    /// Make `alias` resolve to the calendar registered as `target`.
    pub fn register_alias(&mut self, alias: &str, target: &str) -> Result<()> {
        if self.calendars.contains_key(alias) {
            return Err(BundleError::Calendar(format!(
                "alias '{alias}' would shadow a registered calendar"
            )));
        }
        let resolved = self.resolve_name(target)?.to_string();
        self.aliases.insert(alias.to_string(), resolved);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn TradingCalendar>> {
        let resolved = self.resolve_name(name)?;
        self.calendars
            .get(resolved)
            .cloned()
            .ok_or_else(|| BundleError::UnknownCalendar(name.to_string()))
    }

    fn resolve_name<'a>(&'a self, name: &'a str) -> Result<&'a str> {
        if self.calendars.contains_key(name) {
            return Ok(name);
        }
        match self.aliases.get(name) {
            Some(target) => Ok(target.as_str()),
            None => Err(BundleError::UnknownCalendar(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn weekends_are_not_sessions() {
        let cal = WeekdayCalendar::new(SHSZ);
        // 2020-01-04/05 is a weekend
        let sessions = cal.sessions_in_range(date("2020-01-02"), date("2020-01-07"));
        assert_eq!(
            sessions,
            vec![
                date("2020-01-02"),
                date("2020-01-03"),
                date("2020-01-06"),
                date("2020-01-07"),
            ]
        );
    }

    #[test]
    fn holidays_are_excluded() {
        let cal = WeekdayCalendar::new(SHSZ).with_holidays([date("2020-01-03")]);
        let sessions = cal.sessions_in_range(date("2020-01-02"), date("2020-01-06"));
        assert_eq!(sessions, vec![date("2020-01-02"), date("2020-01-06")]);
    }

    #[test]
    fn inverted_range_is_empty() {
        let cal = WeekdayCalendar::new(SHSZ);
        assert!(cal
            .sessions_in_range(date("2020-01-06"), date("2020-01-02"))
            .is_empty());
    }

    #[test]
    fn single_day_range_includes_both_bounds() {
        let cal = WeekdayCalendar::new(SHSZ);
        let sessions = cal.sessions_in_range(date("2020-01-02"), date("2020-01-02"));
        assert_eq!(sessions, vec![date("2020-01-02")]);
    }

    #[test]
    fn alias_resolves_to_target() {
        let mut registry = CalendarRegistry::with_defaults();
        registry.register_alias("SQLITEDB", SHSZ).unwrap();

        let cal = registry.get("SQLITEDB").unwrap();
        assert_eq!(cal.name(), SHSZ);
    }

    #[test]
    fn alias_of_alias_resolves_to_calendar() {
        let mut registry = CalendarRegistry::with_defaults();
        registry.register_alias("SQLITEDB", SHSZ).unwrap();
        registry.register_alias("CN", "SQLITEDB").unwrap();
        assert_eq!(registry.get("CN").unwrap().name(), SHSZ);
    }

    #[test]
    fn unknown_calendar_is_an_error() {
        let registry = CalendarRegistry::with_defaults();
        assert!(matches!(
            registry.get("XNYS"),
            Err(BundleError::UnknownCalendar(name)) if name == "XNYS"
        ));
    }

    #[test]
    fn alias_to_unknown_target_fails() {
        let mut registry = CalendarRegistry::with_defaults();
        assert!(registry.register_alias("SQLITEDB", "XNYS").is_err());
    }

    #[test]
    fn alias_cannot_shadow_calendar() {
        let mut registry = CalendarRegistry::with_defaults();
        registry.register(WeekdayCalendar::new("XSHG"));
        assert!(matches!(
            registry.register_alias("XSHG", SHSZ),
            Err(BundleError::Calendar(_))
        ));
    }

    #[test]
    fn reregistering_replaces_calendar() {
        let mut registry = CalendarRegistry::with_defaults();
        registry.register(WeekdayCalendar::new(SHSZ).with_holidays([date("2020-01-03")]));
        let cal = registry.get(SHSZ).unwrap();
        assert!(!cal.is_session(date("2020-01-03")));
    }
}
