use std::collections::BTreeSet;

use crate::model::{CompletionKey, CompletionMap, DayOccurrences};

/// Completion counts for a visible week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeeklyProgress {
    pub completed: usize,
    pub total: usize,
}

impl WeeklyProgress {
    /// Fraction completed in `0.0..=1.0`; an empty week reports `0.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    /// Whole-number percentage, rounded down.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = self.completed.saturating_mul(100) / self.total;
        u8::try_from(pct.min(100)).unwrap_or(100)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// Counts distinct scheduled occurrences and how many of them are completed.
///
/// An occurrence is completed when its exact key is set or when the plan-level
/// key for the same plan and date is set.
#[must_use]
pub fn weekly_progress(days: &[DayOccurrences], completions: &CompletionMap) -> WeeklyProgress {
    let scheduled: BTreeSet<CompletionKey> = days
        .iter()
        .flat_map(|day| day.occurrences.iter().map(|occurrence| occurrence.key()))
        .collect();

    let completed = scheduled
        .iter()
        .filter(|key| completions.is_satisfied(key))
        .count();

    WeeklyProgress {
        completed,
        total: scheduled.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarDate;
    use crate::model::{PlanId, SessionOccurrence, SessionRef};
    use chrono::Datelike;

    fn occurrence(plan: &str, session: Option<&str>, date: &str) -> SessionOccurrence {
        let date: CalendarDate = date.parse().unwrap();
        SessionOccurrence {
            plan_id: PlanId::new(plan).unwrap(),
            session: SessionRef::from_optional(session),
            date,
            weekday: date.naive().weekday(),
            title: "Workout".into(),
            duration_minutes: None,
            goal: None,
        }
    }

    fn day(date: &str, occurrences: Vec<SessionOccurrence>) -> DayOccurrences {
        DayOccurrences {
            date: date.parse().unwrap(),
            occurrences,
        }
    }

    fn completions(raw: &[&str]) -> CompletionMap {
        raw.iter().map(|k| k.parse::<CompletionKey>().unwrap()).collect()
    }

    #[test]
    fn plan_level_completion_covers_every_session_that_day() {
        let days = vec![day(
            "2024-02-02",
            vec![
                occurrence("9", Some("1"), "2024-02-02"),
                occurrence("9", Some("2"), "2024-02-02"),
            ],
        )];
        let progress = weekly_progress(&days, &completions(&["9:plan|2024-02-02"]));
        assert_eq!(progress, WeeklyProgress { completed: 2, total: 2 });
        assert!(progress.is_complete());
    }

    #[test]
    fn nothing_recorded_counts_zero_of_total() {
        let days = vec![
            day("2024-02-05", vec![occurrence("1", Some("1"), "2024-02-05")]),
            day(
                "2024-02-06",
                vec![
                    occurrence("1", Some("2"), "2024-02-06"),
                    occurrence("2", Some("1"), "2024-02-06"),
                ],
            ),
        ];
        let progress = weekly_progress(&days, &CompletionMap::new());
        assert_eq!(progress, WeeklyProgress { completed: 0, total: 3 });
    }

    #[test]
    fn empty_week_reports_zero_percent() {
        let days = vec![day("2024-02-05", Vec::new())];
        let progress = weekly_progress(&days, &completions(&["1:1|2024-02-05"]));
        assert_eq!(progress.total, 0);
        assert_eq!(progress.ratio(), 0.0);
        assert_eq!(progress.percent(), 0);
        assert!(!progress.is_complete());
    }

    #[test]
    fn duplicate_occurrences_count_once() {
        let days = vec![day(
            "2024-02-05",
            vec![
                occurrence("1", Some("1"), "2024-02-05"),
                occurrence("1", Some("1"), "2024-02-05"),
                occurrence("1", Some("2"), "2024-02-05"),
            ],
        )];
        let progress = weekly_progress(&days, &completions(&["1:1|2024-02-05"]));
        assert_eq!(progress, WeeklyProgress { completed: 1, total: 2 });
        assert_eq!(progress.percent(), 50);
    }

    #[test]
    fn completions_on_other_dates_do_not_count() {
        let days = vec![day("2024-02-05", vec![occurrence("1", Some("1"), "2024-02-05")])];
        let progress = weekly_progress(&days, &completions(&["1:1|2024-02-06"]));
        assert_eq!(progress.completed, 0);
    }
}
