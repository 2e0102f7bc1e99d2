//! Shared error types for the services crate.

use thiserror::Error;

use tracker_core::DateError;

/// Errors emitted by the backend HTTP client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("backend request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    Shape(String),
    #[error("pagination did not terminate after {0} pages")]
    TooManyPages(usize),
}

/// Errors emitted while reading configuration from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid {var} value: {raw:?}")]
    Invalid { var: &'static str, raw: String },
}

/// Errors emitted by `WeeklyScheduleService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScheduleServiceError {
    #[error(transparent)]
    Date(#[from] DateError),
}
