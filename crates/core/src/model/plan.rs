use chrono::{Datelike, Weekday};

use crate::calendar::{CalendarDate, WeekWindow};
use crate::model::ids::{PlanId, SessionId, SessionRef};
use crate::model::key::CompletionKey;

/// Set of weekdays a session recurs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WeeklySchedule(u8);

impl WeeklySchedule {
    #[must_use]
    pub fn empty() -> Self {
        Self(0)
    }

    /// Builds a schedule from backend weekday codes, skipping unknown ones.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes
            .into_iter()
            .filter_map(|code| parse_weekday_code(code.as_ref()))
            .collect()
    }

    #[must_use]
    pub fn with(mut self, day: Weekday) -> Self {
        self.0 |= 1 << day.num_days_from_monday();
        self
    }

    #[must_use]
    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Weekday> for WeeklySchedule {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// Accepts `mon`, `monday`, `mo`, and numeric codes where 0 and 7 both mean Sunday.
#[must_use]
pub fn parse_weekday_code(code: &str) -> Option<Weekday> {
    let day = match code.trim().to_ascii_lowercase().as_str() {
        "mo" | "mon" | "monday" | "1" => Weekday::Mon,
        "tu" | "tue" | "tues" | "tuesday" | "2" => Weekday::Tue,
        "we" | "wed" | "wednesday" | "3" => Weekday::Wed,
        "th" | "thu" | "thur" | "thurs" | "thursday" | "4" => Weekday::Thu,
        "fr" | "fri" | "friday" | "5" => Weekday::Fri,
        "sa" | "sat" | "saturday" | "6" => Weekday::Sat,
        "su" | "sun" | "sunday" | "0" | "7" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSession {
    pub id: SessionId,
    pub title: String,
    pub duration_minutes: Option<u32>,
    pub goal: Option<String>,
    pub schedule: WeeklySchedule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutPlan {
    pub id: PlanId,
    pub title: String,
    pub sessions: Vec<PlanSession>,
    /// Used only when the plan has no sessions of its own.
    pub schedule: WeeklySchedule,
}

/// One concrete instance of a recurring session on a calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOccurrence {
    pub plan_id: PlanId,
    pub session: SessionRef,
    pub date: CalendarDate,
    pub weekday: Weekday,
    pub title: String,
    pub duration_minutes: Option<u32>,
    pub goal: Option<String>,
}

impl SessionOccurrence {
    #[must_use]
    pub fn key(&self) -> CompletionKey {
        CompletionKey::new(self.plan_id.clone(), self.session.clone(), self.date)
    }
}

/// Occurrences scheduled on one day of a week window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOccurrences {
    pub date: CalendarDate,
    pub occurrences: Vec<SessionOccurrence>,
}

/// Expands every plan's weekly recurrence against the window, Monday first.
#[must_use]
pub fn expand_week(plans: &[WorkoutPlan], window: &WeekWindow) -> Vec<DayOccurrences> {
    window
        .iter()
        .map(|date| {
            let weekday = date.naive().weekday();
            let mut occurrences = Vec::new();
            for plan in plans {
                if plan.sessions.is_empty() {
                    if plan.schedule.contains(weekday) {
                        occurrences.push(SessionOccurrence {
                            plan_id: plan.id.clone(),
                            session: SessionRef::Plan,
                            date,
                            weekday,
                            title: plan.title.clone(),
                            duration_minutes: None,
                            goal: None,
                        });
                    }
                    continue;
                }
                occurrences.extend(
                    plan.sessions
                        .iter()
                        .filter(|session| session.schedule.contains(weekday))
                        .map(|session| SessionOccurrence {
                            plan_id: plan.id.clone(),
                            session: SessionRef::Session(session.id.clone()),
                            date,
                            weekday,
                            title: session.title.clone(),
                            duration_minutes: session.duration_minutes,
                            goal: session.goal.clone(),
                        }),
                );
            }
            DayOccurrences { date, occurrences }
        })
        .collect()
}
