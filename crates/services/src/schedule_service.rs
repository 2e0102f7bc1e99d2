use std::sync::Arc;

use storage::LocalCompletionStore;
use tokio::sync::OnceCell;
use tracker_core::model::{
    CompletionKey, CompletionMap, DayOccurrences, SessionOccurrence, WorkoutPlan, expand_week,
};
use tracker_core::{CalendarDate, Clock, WeekWindow, WeeklyProgress, weekly_progress};

use crate::backend::PlanSource;
use crate::error::ScheduleServiceError;
use crate::hydrator::{HydrationReport, ServerCompletionHydrator};

/// One scheduled occurrence with its completion state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceView {
    pub occurrence: SessionOccurrence,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayView {
    pub date: CalendarDate,
    pub entries: Vec<OccurrenceView>,
}

/// Everything the weekly schedule screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekView {
    pub window: WeekWindow,
    pub days: Vec<DayView>,
    pub progress: WeeklyProgress,
    /// `None` when the server could not be reached.
    pub hydration: Option<HydrationReport>,
}

/// Owns the completion store for the weekly schedule and keeps it in sync
/// with the backend as the visible week changes.
pub struct WeeklyScheduleService {
    clock: Clock,
    store: Arc<LocalCompletionStore>,
    hydrator: ServerCompletionHydrator,
    plans: Arc<dyn PlanSource>,
    loaded: OnceCell<()>,
}

impl WeeklyScheduleService {
    #[must_use]
    pub fn new(
        clock: Clock,
        store: Arc<LocalCompletionStore>,
        hydrator: ServerCompletionHydrator,
        plans: Arc<dyn PlanSource>,
    ) -> Self {
        Self {
            clock,
            store,
            hydrator,
            plans,
            loaded: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> Arc<LocalCompletionStore> {
        Arc::clone(&self.store)
    }

    /// Loads persisted completions the first time it is called. Concurrent
    /// callers wait for that one load to finish.
    pub async fn ensure_loaded(&self) {
        self.loaded
            .get_or_init(|| async {
                self.store.load().await;
            })
            .await;
    }

    /// Opens the week containing today.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleServiceError::Date` only at the edges of the calendar.
    pub async fn current_week(&self) -> Result<WeekView, ScheduleServiceError> {
        self.open_week(self.clock.today()).await
    }

    /// Opens the week containing `anchor`: hydrates its date range from the
    /// server, fetches plans, and builds the view.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleServiceError::Date` only at the edges of the calendar.
    pub async fn open_week(&self, anchor: CalendarDate) -> Result<WeekView, ScheduleServiceError> {
        self.ensure_loaded().await;
        let window = WeekWindow::containing(anchor)?;
        let hydration = self.hydrator.hydrate_window(&window).await;

        let plans = match self.plans.workout_plans().await {
            Ok(plans) => plans,
            Err(err) => {
                tracing::warn!(error = %err, "could not load workout plans; showing empty week");
                Vec::new()
            }
        };

        let mut view = self.build_view(window, &plans);
        view.hydration = hydration;
        Ok(view)
    }

    /// Opens the week `weeks` weeks away from `window`.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleServiceError::Date` only at the edges of the calendar.
    pub async fn shift_week(
        &self,
        window: &WeekWindow,
        weeks: i64,
    ) -> Result<WeekView, ScheduleServiceError> {
        self.open_week(window.shift(weeks)?.first()).await
    }

    /// Builds a view from the current store contents without any I/O.
    #[must_use]
    pub fn build_view(&self, window: WeekWindow, plans: &[WorkoutPlan]) -> WeekView {
        let completions = self.store.snapshot();
        let days = expand_week(plans, &window);
        WeekView {
            progress: weekly_progress(&days, &completions),
            days: days
                .into_iter()
                .map(|day| day_view(day, &completions))
                .collect(),
            window,
            hydration: None,
        }
    }

    /// Records a completion locally; the next hydration may confirm it.
    pub async fn mark_completed(&self, key: CompletionKey) -> bool {
        self.ensure_loaded().await;
        self.store.mark(key).await
    }

    /// Removes a locally recorded completion.
    pub async fn mark_incomplete(&self, key: &CompletionKey) -> bool {
        self.ensure_loaded().await;
        self.store.unmark(key).await
    }
}

fn day_view(day: DayOccurrences, completions: &CompletionMap) -> DayView {
    DayView {
        date: day.date,
        entries: day
            .occurrences
            .into_iter()
            .map(|occurrence| OccurrenceView {
                completed: completions.is_satisfied(&occurrence.key()),
                occurrence,
            })
            .collect(),
    }
}
