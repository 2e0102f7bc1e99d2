use chrono::{Duration, Local, NaiveDate, NaiveDateTime};

use crate::calendar::CalendarDate;

/// A simple clock abstraction for deterministic "today" in services and tests.
///
/// Times are local wall-clock readings; the tracker only ever needs the local
/// calendar day.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(NaiveDateTime),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given local time.
    #[must_use]
    pub fn fixed(at: NaiveDateTime) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current local time according to the clock.
    #[must_use]
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::Default => Local::now().naive_local(),
            Clock::Fixed(t) => *t,
        }
    }

    /// The local calendar day according to the clock.
    #[must_use]
    pub fn today(&self) -> CalendarDate {
        CalendarDate::from_naive(self.now().date())
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

/// Returns a deterministic local time for tests (Wednesday 2024-01-17 09:30).
///
/// # Panics
///
/// Panics if the fixed date cannot be represented.
#[must_use]
pub fn fixed_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 17)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .expect("fixed test time should be valid")
}

/// Returns a `Clock` fixed at the deterministic test time.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
