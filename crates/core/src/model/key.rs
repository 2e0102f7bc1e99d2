//! String identity of a completion: `planId:sessionId|YYYY-MM-DD`.
//!
//! Two different delimiters separate the three components, and both are
//! percent-escaped inside ids, so decoding is unambiguous for any id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::calendar::{CalendarDate, DateError};
use crate::model::ids::{IdError, PLAN_SENTINEL, PlanId, SessionId, SessionRef};

const SESSION_DELIMITER: char = ':';
const DATE_DELIMITER: char = '|';

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyError {
    #[error("missing '|' before the date in {raw:?}")]
    MissingDate { raw: String },

    #[error("missing ':' between plan and session in {raw:?}")]
    MissingSession { raw: String },

    #[error("malformed escape sequence in {raw:?}")]
    BadEscape { raw: String },

    #[error("unescaped delimiter in {raw:?}")]
    StrayDelimiter { raw: String },

    #[error(transparent)]
    Date(#[from] DateError),

    #[error(transparent)]
    Id(#[from] IdError),
}

/// Identity of one completion record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompletionKey {
    plan_id: PlanId,
    session: SessionRef,
    date: CalendarDate,
}

impl CompletionKey {
    #[must_use]
    pub fn new(plan_id: PlanId, session: SessionRef, date: CalendarDate) -> Self {
        Self {
            plan_id,
            session,
            date,
        }
    }

    /// Key covering every session of the plan on `date`.
    #[must_use]
    pub fn plan_level(plan_id: PlanId, date: CalendarDate) -> Self {
        Self::new(plan_id, SessionRef::Plan, date)
    }

    #[must_use]
    pub fn for_session(plan_id: PlanId, session_id: SessionId, date: CalendarDate) -> Self {
        Self::new(plan_id, SessionRef::Session(session_id), date)
    }

    #[must_use]
    pub fn plan_id(&self) -> &PlanId {
        &self.plan_id
    }

    #[must_use]
    pub fn session(&self) -> &SessionRef {
        &self.session
    }

    #[must_use]
    pub fn date(&self) -> CalendarDate {
        self.date
    }

    /// The plan-level key for the same plan and date.
    #[must_use]
    pub fn plan_fallback(&self) -> Self {
        Self::plan_level(self.plan_id.clone(), self.date)
    }

    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{SESSION_DELIMITER}{}{DATE_DELIMITER}{}",
            escape(self.plan_id.as_str()),
            escape(self.session.as_str()),
            self.date
        )
    }

    /// Decodes a current-schema key.
    ///
    /// # Errors
    ///
    /// Returns `KeyError` if any component is missing or malformed.
    pub fn decode(raw: &str) -> Result<Self, KeyError> {
        let (ids, date) = raw
            .rsplit_once(DATE_DELIMITER)
            .ok_or_else(|| KeyError::MissingDate {
                raw: raw.to_string(),
            })?;
        let (plan, session) =
            ids.split_once(SESSION_DELIMITER)
                .ok_or_else(|| KeyError::MissingSession {
                    raw: raw.to_string(),
                })?;

        let plan_id = PlanId::new(unescape(plan)?)?;
        let session = match unescape(session)?.as_str() {
            PLAN_SENTINEL => SessionRef::Plan,
            other => SessionRef::Session(SessionId::new(other)?),
        };
        Ok(Self::new(plan_id, session, date.parse()?))
    }

    /// Decodes a `planId:sessionId|date` key written before ids were
    /// escaped. The first `:` splits plan from session and nothing is
    /// unescaped, so a bare `%` in an id is taken literally.
    ///
    /// # Errors
    ///
    /// Returns `KeyError` if any component is missing or malformed.
    pub fn decode_unescaped(raw: &str) -> Result<Self, KeyError> {
        let (ids, date) = raw
            .rsplit_once(DATE_DELIMITER)
            .ok_or_else(|| KeyError::MissingDate {
                raw: raw.to_string(),
            })?;
        let (plan, session) =
            ids.split_once(SESSION_DELIMITER)
                .ok_or_else(|| KeyError::MissingSession {
                    raw: raw.to_string(),
                })?;
        let session = match session {
            PLAN_SENTINEL => SessionRef::Plan,
            other => SessionRef::Session(SessionId::new(other)?),
        };
        Ok(Self::new(PlanId::new(plan)?, session, date.parse()?))
    }

    /// Decodes a first-generation key of the form `planId|date`, which had no
    /// session component and always meant a plan-level completion.
    ///
    /// # Errors
    ///
    /// Returns `KeyError` if the key is not in the legacy shape.
    pub fn decode_legacy(raw: &str) -> Result<Self, KeyError> {
        let (plan, date) = raw
            .split_once(DATE_DELIMITER)
            .ok_or_else(|| KeyError::MissingDate {
                raw: raw.to_string(),
            })?;
        if plan.contains(SESSION_DELIMITER) || date.contains(DATE_DELIMITER) {
            return Err(KeyError::StrayDelimiter {
                raw: raw.to_string(),
            });
        }
        Ok(Self::plan_level(PlanId::new(plan)?, date.parse()?))
    }
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for ch in component.chars() {
        match ch {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '|' => out.push_str("%7C"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(component: &str) -> Result<String, KeyError> {
    let bad = || KeyError::BadEscape {
        raw: component.to_string(),
    };
    let mut out = String::with_capacity(component.len());
    let mut chars = component.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => {
                let code: String = chars.by_ref().take(2).collect();
                match code.as_str() {
                    "25" => out.push('%'),
                    "3A" => out.push(':'),
                    "7C" => out.push('|'),
                    _ => return Err(bad()),
                }
            }
            SESSION_DELIMITER | DATE_DELIMITER => {
                return Err(KeyError::StrayDelimiter {
                    raw: component.to_string(),
                });
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

impl fmt::Display for CompletionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CompletionKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for CompletionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for CompletionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::decode(&raw).map_err(serde::de::Error::custom)
    }
}
