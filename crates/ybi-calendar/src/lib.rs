//! Trading-day, holiday, and session-window arithmetic in US/Eastern.
//!
//! Pure and deterministic: no I/O, no wall-clock reads. `prev_trading_day`
//! is the one exception that talks to the outside world, and only through a
//! caller-supplied callback — the calendar itself never assumes a session
//! had data just because it wasn't a weekend or holiday.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::US::Eastern;
use serde::{Deserialize, Serialize};

/// Configurable session boundaries, all in US/Eastern wall-clock time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionConfig {
    pub entry_window_start: NaiveTime,
    pub entry_window_end: NaiveTime,
    pub force_flat_time: NaiveTime,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            entry_window_start: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            entry_window_end: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            force_flat_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        }
    }
}

pub fn premarket_start() -> NaiveTime {
    NaiveTime::from_hms_opt(4, 0, 0).unwrap()
}

pub fn rth_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap()
}

pub fn rth_close() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 0, 0).unwrap()
}

/// Deterministic US equity market calendar for the backtest's configured
/// date span. Holidays are a hardcoded table, same approximation the
/// project's other calendar-aware code in the corpus makes; extend the
/// table for spans outside 2022-2027.
pub struct MarketCalendar {
    pub session: SessionConfig,
}

impl MarketCalendar {
    pub fn new(session: SessionConfig) -> Self {
        Self { session }
    }

    /// `true` if `date` is a weekday and not a known NYSE holiday.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_nyse_holiday(date)
    }

    /// The most recent trading day strictly before `date` for which
    /// `has_data` reports a session is available. Does not assume a
    /// calendar trading day actually has data (e.g. a data gap or halt) --
    /// callers must supply `has_data` to verify.
    pub fn prev_trading_day(
        &self,
        date: NaiveDate,
        has_data: impl Fn(NaiveDate) -> bool,
    ) -> Option<NaiveDate> {
        let mut cursor = date.pred_opt()?;
        for _ in 0..30 {
            if self.is_trading_day(cursor) && has_data(cursor) {
                return Some(cursor);
            }
            cursor = cursor.pred_opt()?;
        }
        None
    }

    /// Converts a UTC instant to the US/Eastern wall-clock time of day.
    pub fn eastern_time_of_day(&self, ts: DateTime<Utc>) -> NaiveTime {
        ts.with_timezone(&Eastern).time()
    }

    /// Converts a UTC instant to the US/Eastern calendar date.
    pub fn eastern_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&Eastern).date_naive()
    }

    pub fn is_premarket(&self, ts: DateTime<Utc>) -> bool {
        let t = self.eastern_time_of_day(ts);
        t >= premarket_start() && t < rth_open()
    }

    pub fn is_rth(&self, ts: DateTime<Utc>) -> bool {
        let t = self.eastern_time_of_day(ts);
        t >= rth_open() && t < rth_close()
    }

    pub fn is_in_entry_window(&self, ts: DateTime<Utc>) -> bool {
        let t = self.eastern_time_of_day(ts);
        t >= self.session.entry_window_start && t <= self.session.entry_window_end
    }

    pub fn is_at_or_past_force_flat(&self, ts: DateTime<Utc>) -> bool {
        self.eastern_time_of_day(ts) >= self.session.force_flat_time
    }

    /// Builds a UTC instant for `date` at the given US/Eastern wall-clock
    /// time, resolving DST via `chrono-tz`.
    pub fn eastern_instant(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        Eastern
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Hardcoded observed NYSE holidays, 2022-2027. New Year's Day, MLK Day,
/// Washington's Birthday, Good Friday, Memorial Day, Juneteenth,
/// Independence Day, Labor Day, Thanksgiving, Christmas.
fn is_nyse_holiday(date: NaiveDate) -> bool {
    const HOLIDAYS: &[(i32, u32, u32)] = &[
        (2022, 1, 17),
        (2022, 2, 21),
        (2022, 4, 15),
        (2022, 5, 30),
        (2022, 6, 20),
        (2022, 7, 4),
        (2022, 9, 5),
        (2022, 11, 24),
        (2022, 12, 26),
        (2023, 1, 2),
        (2023, 1, 16),
        (2023, 2, 20),
        (2023, 4, 7),
        (2023, 5, 29),
        (2023, 6, 19),
        (2023, 7, 4),
        (2023, 9, 4),
        (2023, 11, 23),
        (2023, 12, 25),
        (2024, 1, 1),
        (2024, 1, 15),
        (2024, 2, 19),
        (2024, 3, 29),
        (2024, 5, 27),
        (2024, 6, 19),
        (2024, 7, 4),
        (2024, 9, 2),
        (2024, 11, 28),
        (2024, 12, 25),
        (2025, 1, 1),
        (2025, 1, 20),
        (2025, 2, 17),
        (2025, 4, 18),
        (2025, 5, 26),
        (2025, 6, 19),
        (2025, 7, 4),
        (2025, 9, 1),
        (2025, 11, 27),
        (2025, 12, 25),
        (2026, 1, 1),
        (2026, 1, 19),
        (2026, 2, 16),
        (2026, 4, 3),
        (2026, 5, 25),
        (2026, 6, 19),
        (2026, 7, 3),
        (2026, 9, 7),
        (2026, 11, 26),
        (2026, 12, 25),
        (2027, 1, 1),
        (2027, 1, 18),
        (2027, 2, 15),
        (2027, 3, 26),
        (2027, 5, 31),
        (2027, 6, 18),
        (2027, 7, 5),
        (2027, 9, 6),
        (2027, 11, 25),
        (2027, 12, 24),
    ];
    HOLIDAYS
        .iter()
        .any(|&(y, m, d)| date.year() == y && date.month() == m && date.day() == d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekend_is_not_a_trading_day() {
        let cal = MarketCalendar::new(SessionConfig::default());
        assert!(!cal.is_trading_day(date(2024, 3, 30))); // Saturday
        assert!(!cal.is_trading_day(date(2024, 3, 31))); // Sunday
    }

    #[test]
    fn holiday_is_not_a_trading_day() {
        let cal = MarketCalendar::new(SessionConfig::default());
        assert!(!cal.is_trading_day(date(2024, 7, 4)));
    }

    #[test]
    fn prev_trading_day_skips_weekend_and_requires_data() {
        let cal = MarketCalendar::new(SessionConfig::default());
        // Monday 2024-04-01; previous trading day with data should be Friday 2024-03-29.
        let prev = cal.prev_trading_day(date(2024, 4, 1), |_| true);
        assert_eq!(prev, Some(date(2024, 3, 29)));
    }

    #[test]
    fn prev_trading_day_respects_missing_data_callback() {
        let cal = MarketCalendar::new(SessionConfig::default());
        let prev = cal.prev_trading_day(date(2024, 4, 1), |d| d != date(2024, 3, 29));
        assert_eq!(prev, Some(date(2024, 3, 28)));
    }

    #[test]
    fn entry_window_default_matches_rth_open_to_eleven() {
        let cal = MarketCalendar::new(SessionConfig::default());
        let ts = cal
            .eastern_instant(date(2024, 3, 29), NaiveTime::from_hms_opt(10, 30, 0).unwrap())
            .unwrap();
        assert!(cal.is_in_entry_window(ts));
        let after = cal
            .eastern_instant(date(2024, 3, 29), NaiveTime::from_hms_opt(11, 30, 0).unwrap())
            .unwrap();
        assert!(!cal.is_in_entry_window(after));
    }
}
