//! Time types for calendar events.
//!
//! [`EventTime`] represents an event boundary, which is either a concrete
//! datetime (stored in UTC) or a bare date for all-day events, never both.
//! [`TimeWindow`] is the half-open UTC range used when querying events.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Start or end time of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific point in time, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date with no specific time.
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates an `EventTime::DateTime` from a UTC datetime.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }

    /// Creates an `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Returns `true` for all-day event times.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns the datetime if this is a `DateTime` variant.
    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            Self::AllDay(_) => None,
        }
    }

    /// Returns the date if this is an `AllDay` variant.
    pub fn as_date(&self) -> Option<&NaiveDate> {
        match self {
            Self::AllDay(d) => Some(d),
            Self::DateTime(_) => None,
        }
    }

    /// Converts to a UTC datetime for comparison.
    ///
    /// All-day events compare at midnight UTC on their date.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_hms_opt(0, 0, 0).expect("valid time").and_utc(),
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

/// A half-open interval `[start, end)` in UTC for querying events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// Creates a window starting at `now` and extending `duration` forward.
    pub fn from_now(now: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(now, now + duration)
    }

    /// Returns the duration covered by this window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks if a datetime falls within this window.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }

    /// Checks if an event time falls within this window.
    pub fn contains_event_time(&self, et: &EventTime) -> bool {
        self.contains(et.to_utc_datetime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn datetime_creation() {
        let dt = utc(2026, 3, 5, 10, 30, 0);
        let et = EventTime::from_utc(dt);
        assert!(!et.is_all_day());
        assert_eq!(et.as_datetime(), Some(&dt));
        assert_eq!(et.as_date(), None);
    }

    #[test]
    fn allday_creation() {
        let d = date(2026, 3, 5);
        let et = EventTime::from_date(d);
        assert!(et.is_all_day());
        assert_eq!(et.as_date(), Some(&d));
        assert_eq!(et.as_datetime(), None);
    }

    #[test]
    fn allday_compares_at_midnight() {
        let morning = EventTime::from_utc(utc(2026, 3, 5, 9, 0, 0));
        let all_day = EventTime::from_date(date(2026, 3, 5));
        assert!(all_day < morning);
        assert_eq!(all_day.to_utc_datetime(), utc(2026, 3, 5, 0, 0, 0));
    }

    #[test]
    fn event_time_serde_roundtrip() {
        let et = EventTime::from_utc(utc(2026, 3, 5, 10, 30, 0));
        let json = serde_json::to_string(&et).unwrap();
        let parsed: EventTime = serde_json::from_str(&json).unwrap();
        assert_eq!(et, parsed);

        let et = EventTime::from_date(date(2026, 3, 5));
        let json = serde_json::to_string(&et).unwrap();
        let parsed: EventTime = serde_json::from_str(&json).unwrap();
        assert_eq!(et, parsed);
    }

    #[test]
    fn window_bounds() {
        let window = TimeWindow::new(utc(2026, 3, 5, 9, 0, 0), utc(2026, 3, 5, 17, 0, 0));
        assert_eq!(window.duration(), Duration::hours(8));
        assert!(window.contains(utc(2026, 3, 5, 9, 0, 0))); // start inclusive
        assert!(!window.contains(utc(2026, 3, 5, 17, 0, 0))); // end exclusive
    }

    #[test]
    #[should_panic(expected = "start must be <= end")]
    fn window_rejects_inverted_bounds() {
        TimeWindow::new(utc(2026, 3, 5, 17, 0, 0), utc(2026, 3, 5, 9, 0, 0));
    }

    #[test]
    fn window_from_now() {
        let now = utc(2026, 3, 5, 12, 0, 0);
        let window = TimeWindow::from_now(now, Duration::days(30));
        assert_eq!(window.start, now);
        assert_eq!(window.end, utc(2026, 4, 4, 12, 0, 0));
    }
}
