#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod error;
pub mod hydrator;
pub mod rows;
pub mod schedule_service;

pub use tracker_core::Clock;

pub use backend::{CompletionQuery, CompletionSource, HttpBackend, PlanSource};
pub use config::BackendConfig;
pub use error::{BackendError, ConfigError, ScheduleServiceError};
pub use hydrator::{HydrationReport, ServerCompletionHydrator};
pub use schedule_service::{DayView, OccurrenceView, WeekView, WeeklyScheduleService};
