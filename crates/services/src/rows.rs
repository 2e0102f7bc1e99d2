//! Normalizes completion rows from the backend.
//!
//! The backend is inconsistent about field naming, so each logical field has
//! an ordered alias table. The first alias holding a usable value wins; add a
//! new spelling by adding a line to the table.

use serde_json::Value;
use tracker_core::CalendarDate;
use tracker_core::model::{CompletionKey, CompletionMap, PlanId, SessionRef};

/// Path of object keys from the row root to a field.
pub type FieldPath = &'static [&'static str];

pub const PLAN_ID_FIELDS: &[FieldPath] = &[
    &["workout_plan_id"],
    &["workoutPlanId"],
    &["workoutId"],
    &["workout_id"],
    &["planId"],
    &["workout", "id"],
];

pub const SESSION_ID_FIELDS: &[FieldPath] = &[
    &["workout_plan_session_id"],
    &["workoutSessionId"],
    &["session_id"],
    &["sessionId"],
    &["workout_session_id"],
    &["id"],
];

pub const PERFORMED_DATE_FIELDS: &[FieldPath] = &[
    &["performed_on"],
    &["performedOn"],
    &["date"],
    &["performedDate"],
    &["performed"],
    &["created_at"],
    &["createdAt"],
];

/// Returns the first alias whose value is a non-empty string or a number,
/// rendered as a string.
#[must_use]
pub fn first_present(row: &Value, fields: &[FieldPath]) -> Option<String> {
    fields.iter().find_map(|path| {
        let value = path.iter().try_fold(row, |node, segment| node.get(segment))?;
        scalar_text(value)
    })
}

pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Maps one row to its completion key, or `None` when the row lacks a usable
/// plan id or performed date. A missing session id means a plan-level entry.
#[must_use]
pub fn normalize_row(row: &Value) -> Option<CompletionKey> {
    let plan_id = PlanId::new(first_present(row, PLAN_ID_FIELDS)?).ok()?;
    let date = CalendarDate::parse_prefix(&first_present(row, PERFORMED_DATE_FIELDS)?).ok()?;
    let session = SessionRef::from_optional(first_present(row, SESSION_ID_FIELDS).as_deref());
    Some(CompletionKey::new(plan_id, session, date))
}

/// Normalized rows plus how many were discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRows {
    pub completions: CompletionMap,
    pub recognized: usize,
    pub discarded: usize,
}

#[must_use]
pub fn normalize_rows(rows: &[Value]) -> NormalizedRows {
    let mut out = NormalizedRows::default();
    for row in rows {
        match normalize_row(row) {
            Some(key) => {
                out.recognized += 1;
                out.completions.mark(key);
            }
            None => out.discarded += 1,
        }
    }
    out
}
