use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracker_core::CalendarDate;
use tracker_core::model::{PlanId, PlanSession, SessionId, WeeklySchedule, WorkoutPlan};

use crate::config::BackendConfig;
use crate::error::BackendError;

/// Upper bound on followed `next` links for one listing.
const MAX_PAGES: usize = 50;

/// Inclusive date range of completion rows to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionQuery {
    pub date_from: CalendarDate,
    pub date_to: CalendarDate,
    pub page_size: u32,
}

/// Authoritative source of recorded workout completions.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Fetch raw completion rows for the inclusive date range.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request or response decoding fails.
    async fn completed_workouts(&self, query: &CompletionQuery) -> Result<Vec<Value>, BackendError>;
}

/// Source of workout plans and their weekly session schedules.
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Fetch the plans assigned to the current user.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request or response decoding fails.
    async fn workout_plans(&self) -> Result<Vec<WorkoutPlan>, BackendError>;
}

/// REST client for the fitness backend.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Fetches every page of a listing, following `next` links.
    async fn fetch_all(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Value>, BackendError> {
        let mut rows = Vec::new();
        let mut request = self.client.get(self.endpoint(path)).query(query);

        for _ in 0..MAX_PAGES {
            if let Some(token) = &self.config.api_token {
                request = request.bearer_auth(token);
            }
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(BackendError::HttpStatus(response.status()));
            }

            let body: Value = response.json().await?;
            let (page, next) = split_page(body)?;
            rows.extend(page);

            match next {
                Some(url) => request = self.client.get(url),
                None => return Ok(rows),
            }
        }

        Err(BackendError::TooManyPages(MAX_PAGES))
    }
}

/// Accepts a bare array or an envelope with `results`, `data` or `items`,
/// plus an optional absolute `next` URL.
fn split_page(body: Value) -> Result<(Vec<Value>, Option<String>), BackendError> {
    match body {
        Value::Array(rows) => Ok((rows, None)),
        Value::Object(mut object) => {
            let next = object
                .get("next")
                .and_then(Value::as_str)
                .filter(|url| !url.is_empty())
                .map(str::to_string);
            for field in ["results", "data", "items"] {
                if let Some(Value::Array(rows)) = object.remove(field) {
                    return Ok((rows, next));
                }
            }
            Err(BackendError::Shape("object without a row list".into()))
        }
        other => Err(BackendError::Shape(format!("expected a list, got {other}"))),
    }
}

#[async_trait]
impl CompletionSource for HttpBackend {
    async fn completed_workouts(&self, query: &CompletionQuery) -> Result<Vec<Value>, BackendError> {
        self.fetch_all(
            "completed-workouts/",
            &[
                ("date_from", query.date_from.to_string()),
                ("date_to", query.date_to.to_string()),
                ("page_size", query.page_size.to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl PlanSource for HttpBackend {
    async fn workout_plans(&self) -> Result<Vec<WorkoutPlan>, BackendError> {
        let rows = self
            .fetch_all(
                "workout-plans/",
                &[("page_size", self.config.page_size.to_string())],
            )
            .await?;

        let mut plans = Vec::with_capacity(rows.len());
        for row in rows {
            let plan = serde_json::from_value::<PlanDto>(row)
                .map_err(|err| err.to_string())
                .and_then(|dto| dto.into_plan().ok_or_else(|| "no usable id".to_string()));
            match plan {
                Ok(plan) => plans.push(plan),
                Err(reason) => tracing::debug!(%reason, "skipping workout plan"),
            }
        }
        Ok(plans)
    }
}

/// Id or weekday code that may arrive as a number or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Int(value) => value.to_string(),
            Scalar::Text(text) => text,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum ScheduleDto {
    #[default]
    Missing,
    List(Vec<Scalar>),
    Text(String),
}

impl ScheduleDto {
    fn into_schedule(self) -> WeeklySchedule {
        match self {
            ScheduleDto::Missing => WeeklySchedule::empty(),
            ScheduleDto::List(codes) => WeeklySchedule::from_codes(codes.into_iter().map(Scalar::into_text)),
            ScheduleDto::Text(text) => WeeklySchedule::from_codes(text.split(',')),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionDto {
    id: Scalar,
    #[serde(default, alias = "name")]
    title: Option<String>,
    #[serde(default, alias = "duration", alias = "durationMinutes")]
    duration_minutes: Option<Value>,
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    schedule: ScheduleDto,
}

/// Whole minutes from a number or numeric string; anything else is ignored.
fn minutes(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct PlanDto {
    id: Scalar,
    #[serde(default, alias = "name")]
    title: Option<String>,
    #[serde(default)]
    schedule: ScheduleDto,
    #[serde(default, alias = "workout_sessions", alias = "workoutSessions")]
    sessions: Vec<SessionDto>,
}

impl PlanDto {
    fn into_plan(self) -> Option<WorkoutPlan> {
        let id = PlanId::new(self.id.into_text()).ok()?;
        let sessions = self
            .sessions
            .into_iter()
            .filter_map(|session| {
                Some(PlanSession {
                    id: SessionId::new(session.id.into_text()).ok()?,
                    title: session.title.unwrap_or_default(),
                    duration_minutes: session.duration_minutes.as_ref().and_then(minutes),
                    goal: session.goal,
                    schedule: session.schedule.into_schedule(),
                })
            })
            .collect();
        Some(WorkoutPlan {
            title: self.title.unwrap_or_else(|| format!("Plan {id}")),
            id,
            sessions,
            schedule: self.schedule.into_schedule(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use serde_json::json;

    #[test]
    fn split_page_accepts_common_envelopes() {
        let (rows, next) = split_page(json!([{"id": 1}])).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(next, None);

        let (rows, next) =
            split_page(json!({"results": [{"id": 1}, {"id": 2}], "next": "http://x/?page=2"}))
                .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(next.as_deref(), Some("http://x/?page=2"));

        let (rows, next) = split_page(json!({"data": [], "next": null})).unwrap();
        assert!(rows.is_empty());
        assert_eq!(next, None);

        assert!(split_page(json!({"detail": "nope"})).is_err());
        assert!(split_page(json!("nope")).is_err());
    }

    #[test]
    fn plan_dto_tolerates_shapes() {
        let dto: PlanDto = serde_json::from_value(json!({
            "id": 7,
            "name": "Strength",
            "workout_sessions": [
                {"id": 3, "title": "Legs", "duration": 45, "schedule": ["mon", "WED"]},
                {"id": "5", "name": "Arms", "schedule": "fri,sun"},
                {"id": "plan", "schedule": ["tue"]}
            ]
        }))
        .unwrap();
        let plan = dto.into_plan().unwrap();
        assert_eq!(plan.id.as_str(), "7");
        assert_eq!(plan.title, "Strength");
        assert_eq!(plan.sessions.len(), 2);
        assert_eq!(plan.sessions[0].duration_minutes, Some(45));
        assert!(plan.sessions[0].schedule.contains(Weekday::Wed));
        assert!(plan.sessions[1].schedule.contains(Weekday::Sun));
        assert_eq!(plan.sessions[1].title, "Arms");
    }

    #[test]
    fn odd_durations_drop_only_the_field() {
        let dto: PlanDto = serde_json::from_value(json!({
            "id": 4,
            "sessions": [
                {"id": 1, "duration": "45", "schedule": ["mon"]},
                {"id": 2, "duration": -1, "schedule": ["tue"]},
                {"id": 3, "durationMinutes": 30.5, "schedule": ["wed"]},
                {"id": 4, "duration_minutes": null, "schedule": ["thu"]}
            ]
        }))
        .unwrap();
        let plan = dto.into_plan().unwrap();
        let durations: Vec<_> = plan.sessions.iter().map(|s| s.duration_minutes).collect();
        assert_eq!(durations, [Some(45), None, None, None]);
    }

    #[test]
    fn numeric_weekday_codes_are_accepted() {
        let dto: PlanDto =
            serde_json::from_value(json!({"id": "9", "schedule": [0, 6]})).unwrap();
        let plan = dto.into_plan().unwrap();
        assert!(plan.sessions.is_empty());
        assert!(plan.schedule.contains(Weekday::Sun));
        assert!(plan.schedule.contains(Weekday::Sat));
        assert_eq!(plan.title, "Plan 9");
    }
}
