use std::sync::Arc;

use storage::LocalCompletionStore;
use tracker_core::{CalendarDate, WeekWindow};

use crate::backend::{CompletionQuery, CompletionSource};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::rows::normalize_rows;

/// Counts from one successful hydration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrationReport {
    pub rows: usize,
    pub recognized: usize,
    pub discarded: usize,
    /// Keys that were not already completed locally.
    pub added: usize,
}

/// Pulls authoritative completions for a date range into the local store.
///
/// Merging is an OR, so hydrations may run repeatedly, overlap, or resolve
/// out of order without ever clearing a completion.
#[derive(Clone)]
pub struct ServerCompletionHydrator {
    source: Arc<dyn CompletionSource>,
    store: Arc<LocalCompletionStore>,
    page_size: u32,
}

impl ServerCompletionHydrator {
    #[must_use]
    pub fn new(source: Arc<dyn CompletionSource>, store: Arc<LocalCompletionStore>) -> Self {
        Self {
            source,
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Hydrates the inclusive range covered by `window`.
    pub async fn hydrate_window(&self, window: &WeekWindow) -> Option<HydrationReport> {
        self.hydrate(window.first(), window.last()).await
    }

    /// Fetches and merges completions for `[date_from, date_to]`.
    ///
    /// Returns `None` when the fetch fails; the failure is logged and the
    /// store keeps whatever it held before.
    pub async fn hydrate(
        &self,
        date_from: CalendarDate,
        date_to: CalendarDate,
    ) -> Option<HydrationReport> {
        let (date_from, date_to) = if date_from <= date_to {
            (date_from, date_to)
        } else {
            (date_to, date_from)
        };
        let query = CompletionQuery {
            date_from,
            date_to,
            page_size: self.page_size,
        };

        let rows = match self.source.completed_workouts(&query).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    %date_from,
                    %date_to,
                    "completion hydration failed; keeping local state"
                );
                return None;
            }
        };

        let normalized = normalize_rows(&rows);
        if normalized.discarded > 0 {
            tracing::debug!(
                discarded = normalized.discarded,
                "ignored completion rows without plan id or date"
            );
        }
        let added = self.store.merge(&normalized.completions).await;

        Some(HydrationReport {
            rows: rows.len(),
            recognized: normalized.recognized,
            discarded: normalized.discarded,
            added,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use storage::InMemoryKeyValueStore;
    use tracker_core::model::CompletionKey;

    /// Replays canned responses and records the queries it saw.
    struct ScriptedSource {
        responses: Mutex<Vec<Result<Vec<Value>, BackendError>>>,
        seen: Mutex<Vec<CompletionQuery>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<Value>, BackendError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionSource for ScriptedSource {
        async fn completed_workouts(
            &self,
            query: &CompletionQuery,
        ) -> Result<Vec<Value>, BackendError> {
            self.seen.lock().unwrap().push(*query);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                responses.remove(0)
            }
        }
    }

    fn key(raw: &str) -> CompletionKey {
        raw.parse().unwrap()
    }

    fn date(raw: &str) -> CalendarDate {
        raw.parse().unwrap()
    }

    fn store() -> Arc<LocalCompletionStore> {
        Arc::new(LocalCompletionStore::new(Arc::new(InMemoryKeyValueStore::new())))
    }

    #[tokio::test]
    async fn server_rows_add_to_local_completions() {
        let store = store();
        store.mark(key("7:3|2024-02-01")).await;
        let source = Arc::new(ScriptedSource::new(vec![Ok(vec![json!({
            "workout_plan_id": 7,
            "workout_plan_session_id": 5,
            "performed_on": "2024-02-01"
        })])]));
        let hydrator = ServerCompletionHydrator::new(source, Arc::clone(&store));

        let report = hydrator
            .hydrate(date("2024-01-29"), date("2024-02-04"))
            .await
            .unwrap();
        assert_eq!(report.added, 1);

        let snapshot = store.snapshot();
        assert!(snapshot.contains(&key("7:3|2024-02-01")));
        assert!(snapshot.contains(&key("7:5|2024-02-01")));
    }

    #[tokio::test]
    async fn failed_fetch_leaves_store_untouched() {
        let store = store();
        store.mark(key("1:1|2024-02-01")).await;
        let before = store.snapshot();
        let source = Arc::new(ScriptedSource::new(vec![Err(BackendError::HttpStatus(
            reqwest::StatusCode::BAD_GATEWAY,
        ))]));
        let hydrator = ServerCompletionHydrator::new(source, Arc::clone(&store));

        assert_eq!(
            hydrator.hydrate(date("2024-01-29"), date("2024-02-04")).await,
            None
        );
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn repeated_and_reordered_hydrations_converge() {
        let week_a = vec![json!({"planId": 1, "sessionId": 1, "date": "2024-02-01"})];
        let week_b = vec![json!({"planId": 2, "date": "2024-02-08"})];

        let first = store();
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(week_a.clone()),
            Ok(week_b.clone()),
            Ok(week_a.clone()),
        ]));
        let hydrator = ServerCompletionHydrator::new(source, Arc::clone(&first));
        for _ in 0..3 {
            hydrator.hydrate(date("2024-01-29"), date("2024-02-11")).await;
        }

        let second = store();
        let source = Arc::new(ScriptedSource::new(vec![Ok(week_b), Ok(week_a)]));
        let hydrator = ServerCompletionHydrator::new(source, Arc::clone(&second));
        for _ in 0..2 {
            hydrator.hydrate(date("2024-01-29"), date("2024-02-11")).await;
        }

        assert_eq!(first.snapshot(), second.snapshot());
        assert_eq!(first.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn window_bounds_and_page_size_reach_the_source() {
        let source = Arc::new(ScriptedSource::new(Vec::new()));
        let hydrator = ServerCompletionHydrator::new(
            Arc::clone(&source) as Arc<dyn CompletionSource>,
            store(),
        )
        .with_page_size(25);
        let window = WeekWindow::containing(date("2024-01-17")).unwrap();

        let report = hydrator.hydrate_window(&window).await.unwrap();
        assert_eq!(report, HydrationReport::default());

        let seen = source.seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            [CompletionQuery {
                date_from: date("2024-01-15"),
                date_to: date("2024-01-21"),
                page_size: 25,
            }]
        );
    }

    #[tokio::test]
    async fn unrecognized_rows_are_counted_not_merged() {
        let store = store();
        let source = Arc::new(ScriptedSource::new(vec![Ok(vec![
            json!({"performed_on": "2024-02-01"}),
            json!({"workout_id": 3, "performed_on": "2024-02-02"}),
        ])]));
        let hydrator = ServerCompletionHydrator::new(source, Arc::clone(&store));

        let report = hydrator
            .hydrate(date("2024-02-04"), date("2024-01-29"))
            .await
            .unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.recognized, 1);
        assert_eq!(report.discarded, 1);
        assert!(store.is_completed(&key("3:plan|2024-02-02")));
    }
}
