use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const CANONICAL_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DateError {
    #[error("invalid calendar date: {raw:?} (expected YYYY-MM-DD)")]
    Invalid { raw: String },

    #[error("date arithmetic out of range")]
    OutOfRange,
}

/// A local calendar day with no time or timezone component.
///
/// Every date entering or leaving the tracker goes through this type, so the
/// `YYYY-MM-DD` rendering is defined in exactly one place.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Builds a date from year/month/day fields.
    ///
    /// # Errors
    ///
    /// Returns `DateError::Invalid` when the fields do not name a real day.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| DateError::Invalid {
                raw: format!("{year:04}-{month:02}-{day:02}"),
            })
    }

    #[must_use]
    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Takes the calendar day of a timestamp as seen in its own timezone.
    ///
    /// Callers holding a UTC instant should convert with `with_timezone(&Local)`
    /// first; using UTC fields directly shifts the day near midnight.
    #[must_use]
    pub fn from_datetime<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        Self(at.date_naive())
    }

    /// Parses the leading `YYYY-MM-DD` of a longer timestamp string such as
    /// `2024-02-01T18:30:00Z`.
    ///
    /// # Errors
    ///
    /// Returns `DateError::Invalid` if the prefix is not a canonical date.
    pub fn parse_prefix(raw: &str) -> Result<Self, DateError> {
        let head = raw.trim().get(..10).ok_or_else(|| DateError::Invalid {
            raw: raw.to_string(),
        })?;
        head.parse()
    }

    #[must_use]
    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    /// Day of week, 0 = Sunday through 6 = Saturday.
    #[must_use]
    pub fn weekday_from_sunday(&self) -> u32 {
        self.0.weekday().num_days_from_sunday()
    }

    /// Moves the date by a signed number of days.
    ///
    /// # Errors
    ///
    /// Returns `DateError::OutOfRange` past the representable calendar.
    pub fn add_days(self, delta: i64) -> Result<Self, DateError> {
        let magnitude = Days::new(delta.unsigned_abs());
        let moved = if delta >= 0 {
            self.0.checked_add_days(magnitude)
        } else {
            self.0.checked_sub_days(magnitude)
        };
        moved.map(Self).ok_or(DateError::OutOfRange)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

impl fmt::Debug for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CalendarDate({self})")
    }
}

impl FromStr for CalendarDate {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DateError::Invalid { raw: s.to_string() };
        // chrono accepts unpadded fields; the canonical form does not.
        let bytes = s.as_bytes();
        if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return Err(invalid());
        }
        NaiveDate::parse_from_str(s, CANONICAL_FORMAT)
            .map(Self)
            .map_err(|_| invalid())
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The seven Monday-to-Sunday calendar dates surrounding an anchor date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekWindow {
    days: [CalendarDate; 7],
}

impl WeekWindow {
    /// Computes the week containing `anchor`.
    ///
    /// # Errors
    ///
    /// Returns `DateError::OutOfRange` only at the very edges of the calendar.
    pub fn containing(anchor: CalendarDate) -> Result<Self, DateError> {
        let weekday = i64::from(anchor.weekday_from_sunday());
        let offset = if weekday == 0 { -6 } else { 1 - weekday };
        let monday = anchor.add_days(offset)?;

        let mut days = [monday; 7];
        for (step, slot) in (0_i64..).zip(days.iter_mut()) {
            *slot = monday.add_days(step)?;
        }
        Ok(Self { days })
    }

    #[must_use]
    pub fn days(&self) -> &[CalendarDate; 7] {
        &self.days
    }

    /// Monday.
    #[must_use]
    pub fn first(&self) -> CalendarDate {
        self.days[0]
    }

    /// Sunday.
    #[must_use]
    pub fn last(&self) -> CalendarDate {
        self.days[6]
    }

    #[must_use]
    pub fn contains(&self, date: CalendarDate) -> bool {
        self.first() <= date && date <= self.last()
    }

    /// Canonical `YYYY-MM-DD` strings, Monday first.
    #[must_use]
    pub fn date_strings(&self) -> [String; 7] {
        self.days.map(|day| day.to_string())
    }

    /// The window `weeks` weeks before (negative) or after (positive) this one.
    ///
    /// # Errors
    ///
    /// Returns `DateError::OutOfRange` when the shift leaves the calendar.
    pub fn shift(&self, weeks: i64) -> Result<Self, DateError> {
        let delta = weeks.checked_mul(7).ok_or(DateError::OutOfRange)?;
        Self::containing(self.first().add_days(delta)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = CalendarDate> + '_ {
        self.days.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(raw: &str) -> CalendarDate {
        raw.parse().unwrap()
    }

    #[test]
    fn wednesday_anchor_spans_monday_to_sunday() {
        let window = WeekWindow::containing(date("2024-01-17")).unwrap();
        assert_eq!(
            window.date_strings(),
            [
                "2024-01-15",
                "2024-01-16",
                "2024-01-17",
                "2024-01-18",
                "2024-01-19",
                "2024-01-20",
                "2024-01-21",
            ]
        );
    }

    #[test]
    fn sunday_anchor_belongs_to_preceding_monday() {
        let window = WeekWindow::containing(date("2024-01-21")).unwrap();
        assert_eq!(window.first(), date("2024-01-15"));
        assert_eq!(window.last(), date("2024-01-21"));
    }

    #[test]
    fn monday_anchor_starts_its_own_week() {
        let window = WeekWindow::containing(date("2024-01-15")).unwrap();
        assert_eq!(window.first(), date("2024-01-15"));
    }

    #[test]
    fn every_window_is_seven_consecutive_days_from_monday() {
        let mut anchor = date("2023-12-20");
        for _ in 0..60 {
            let window = WeekWindow::containing(anchor).unwrap();
            assert_eq!(window.first().naive().weekday(), Weekday::Mon);
            for pair in window.days().windows(2) {
                assert_eq!(pair[0].add_days(1).unwrap(), pair[1]);
            }
            assert!(window.contains(anchor));
            assert_eq!(WeekWindow::containing(anchor).unwrap(), window);
            anchor = anchor.add_days(1).unwrap();
        }
    }

    #[test]
    fn window_crosses_year_boundary() {
        let window = WeekWindow::containing(date("2025-01-01")).unwrap();
        assert_eq!(window.first(), date("2024-12-30"));
        assert_eq!(window.last(), date("2025-01-05"));
    }

    #[test]
    fn shift_moves_whole_weeks() {
        let window = WeekWindow::containing(date("2024-01-17")).unwrap();
        assert_eq!(window.shift(-1).unwrap().first(), date("2024-01-08"));
        assert_eq!(window.shift(2).unwrap().first(), date("2024-01-29"));
    }

    #[test]
    fn rejects_non_canonical_strings() {
        assert!("2024-1-5".parse::<CalendarDate>().is_err());
        assert!("2024-02-30".parse::<CalendarDate>().is_err());
        assert!("20240201".parse::<CalendarDate>().is_err());
    }

    #[test]
    fn parse_prefix_drops_time_component() {
        assert_eq!(
            CalendarDate::parse_prefix("2024-02-01T23:59:00Z").unwrap(),
            date("2024-02-01")
        );
        assert!(CalendarDate::parse_prefix("Feb 1").is_err());
    }

    #[test]
    fn local_fields_decide_the_day() {
        let east = chrono::FixedOffset::east_opt(9 * 3600).unwrap();
        let at = chrono::Utc
            .with_ymd_and_hms(2024, 1, 31, 20, 0, 0)
            .unwrap()
            .with_timezone(&east);
        assert_eq!(CalendarDate::from_datetime(&at), date("2024-02-01"));
    }
}
