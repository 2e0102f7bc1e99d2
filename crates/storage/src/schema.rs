//! Persisted shape of the completion map and its upgrade path.
//!
//! Current blobs are tagged envelopes:
//!
//! ```json
//! {"version": 2, "completions": {"7:3|2024-02-01": true}}
//! ```
//!
//! Blobs written before versioning existed are bare objects of key to boolean
//! and are read as version 1. Version 1 allowed both `planId|date` keys and
//! `planId:sessionId|date` keys in the same blob.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracker_core::model::{CompletionKey, CompletionMap};

/// Fixed local storage entry name.
pub const STORAGE_KEY: &str = "workout-completions-v2";

pub const CURRENT_VERSION: u32 = 2;

const LEGACY_VERSION: u32 = 1;

/// Raw keys that are completed at a given schema version.
type Entries = BTreeMap<String, bool>;

/// One upgrade step from `from` to `from + 1`.
struct Migration {
    from: u32,
    run: fn(Entries) -> Entries,
}

const MIGRATIONS: &[Migration] = &[Migration {
    from: 1,
    run: migrate_v1_to_v2,
}];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("blob is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("blob is not a JSON object")]
    NotAnObject,

    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u64),

    #[error("no migration registered from version {0}")]
    MissingMigration(u32),
}

/// Result of reading a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub completions: CompletionMap,
    /// Version the blob was stored at.
    pub source_version: u32,
    /// Stored entries that did not survive as distinct completed-or-false keys.
    pub dropped: usize,
}

impl Decoded {
    /// True when the blob should be rewritten in the current format.
    #[must_use]
    pub fn needs_write_back(&self) -> bool {
        self.source_version < CURRENT_VERSION || self.dropped > 0
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    version: u32,
    completions: &'a CompletionMap,
}

/// Serializes the map as a current-version envelope.
///
/// # Errors
///
/// Returns `serde_json::Error` if serialization fails.
pub fn encode(completions: &CompletionMap) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope {
        version: CURRENT_VERSION,
        completions,
    })
}

/// Parses a stored blob of any known version and upgrades it to the current one.
///
/// # Errors
///
/// Returns `SchemaError` for unparsable JSON, non-object blobs, and versions
/// newer than this build understands.
pub fn decode(raw: &str) -> Result<Decoded, SchemaError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(object) = value else {
        return Err(SchemaError::NotAnObject);
    };
    let (version, entries) = split_envelope(object)?;
    migrate(version, entries)
}

/// Runs the migration chain from `version` up to the current version, then
/// interprets the surviving keys.
///
/// # Errors
///
/// Returns `SchemaError` if `version` is outside the supported range.
pub fn migrate(version: u32, raw: Map<String, Value>) -> Result<Decoded, SchemaError> {
    if version == 0 || version > CURRENT_VERSION {
        return Err(SchemaError::UnsupportedVersion(u64::from(version)));
    }

    let total = raw.len();
    let mut entries: Entries = raw
        .into_iter()
        .filter_map(|(key, value)| completed_flag(&value).map(|done| (key, done)))
        .collect();

    let mut at = version;
    while at < CURRENT_VERSION {
        let step = MIGRATIONS
            .iter()
            .find(|m| m.from == at)
            .ok_or(SchemaError::MissingMigration(at))?;
        entries = (step.run)(entries);
        at += 1;
    }

    let completions: CompletionMap = entries
        .iter()
        .filter(|(_, done)| **done)
        .filter_map(|(key, _)| CompletionKey::decode(key).ok())
        .collect();

    let kept_false = entries.values().filter(|done| !**done).count();
    Ok(Decoded {
        dropped: total.saturating_sub(completions.len() + kept_false),
        completions,
        source_version: version,
    })
}

fn split_envelope(object: Map<String, Value>) -> Result<(u32, Map<String, Value>), SchemaError> {
    let tagged = matches!(object.get("version"), Some(Value::Number(_)))
        && matches!(object.get("completions"), Some(Value::Object(_)));
    if !tagged {
        return Ok((LEGACY_VERSION, object));
    }

    let mut object = object;
    let version = object
        .get("version")
        .and_then(Value::as_u64)
        .ok_or(SchemaError::UnsupportedVersion(0))?;
    let version = u32::try_from(version).map_err(|_| SchemaError::UnsupportedVersion(version))?;
    match object.remove("completions") {
        Some(Value::Object(entries)) => Ok((version, entries)),
        _ => Err(SchemaError::NotAnObject),
    }
}

/// Booleans and the strings `"true"`/`"false"` are accepted; anything else
/// is not an entry.
fn completed_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(done) => Some(*done),
        Value::String(text) if text.eq_ignore_ascii_case("true") => Some(true),
        Value::String(text) if text.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Rewrites `planId|date` keys to plan-level `planId:plan|date` keys and
/// drops anything that is neither shape. Completions are OR-ed, so a legacy
/// and a current key for the same plan and date collapse to one `true`.
fn migrate_v1_to_v2(entries: Entries) -> Entries {
    let mut upgraded = Entries::new();
    for (raw, done) in entries {
        let key = CompletionKey::decode(&raw)
            .or_else(|_| CompletionKey::decode_legacy(&raw))
            .or_else(|_| CompletionKey::decode_unescaped(&raw));
        let Ok(key) = key else {
            continue;
        };
        let slot = upgraded.entry(key.encode()).or_insert(false);
        *slot = *slot || done;
    }
    upgraded
}
