use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Session component meaning "every session of the plan on that date".
pub const PLAN_SENTINEL: &str = "plan";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("session id \"plan\" is reserved for plan-level completions")]
    ReservedSessionId,
}

/// Identifier of a workout plan as the backend reports it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlanId(String);

impl PlanId {
    /// Creates a new `PlanId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` for blank input.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty { kind: "plan id" });
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of one session inside a plan.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new `SessionId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` for blank input and `IdError::ReservedSessionId`
    /// for the plan sentinel.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty { kind: "session id" });
        }
        if trimmed == PLAN_SENTINEL {
            return Err(IdError::ReservedSessionId);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which sessions of a plan a completion refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionRef {
    /// Every session of the plan on the given date.
    Plan,
    Session(SessionId),
}

impl SessionRef {
    /// Maps an optional raw session id, substituting the plan-level sentinel
    /// when it is missing, blank, or literally `"plan"`.
    #[must_use]
    pub fn from_optional(raw: Option<&str>) -> Self {
        raw.and_then(|value| SessionId::new(value).ok())
            .map_or(Self::Plan, Self::Session)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plan => PLAN_SENTINEL,
            Self::Session(id) => id.as_str(),
        }
    }

    #[must_use]
    pub fn is_plan(&self) -> bool {
        matches!(self, Self::Plan)
    }
}

impl From<SessionId> for SessionRef {
    fn from(id: SessionId) -> Self {
        Self::Session(id)
    }
}

impl TryFrom<String> for PlanId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PlanId> for String {
    fn from(id: PlanId) -> Self {
        id.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl fmt::Debug for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlanId({})", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
