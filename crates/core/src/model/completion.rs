use std::collections::BTreeSet;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::model::key::CompletionKey;

/// Set of completed keys. Absence means "not completed"; an explicit `false`
/// is never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionMap {
    completed: BTreeSet<CompletionKey>,
}

impl CompletionMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// Exact-key lookup.
    #[must_use]
    pub fn contains(&self, key: &CompletionKey) -> bool {
        self.completed.contains(key)
    }

    /// True when the exact key or its plan-level fallback is completed.
    #[must_use]
    pub fn is_satisfied(&self, key: &CompletionKey) -> bool {
        self.contains(key) || (!key.session().is_plan() && self.contains(&key.plan_fallback()))
    }

    /// Records a completion. Returns `true` if the key was not already set.
    pub fn mark(&mut self, key: CompletionKey) -> bool {
        self.completed.insert(key)
    }

    /// Clears a completion. Returns `true` if the key was set.
    pub fn unmark(&mut self, key: &CompletionKey) -> bool {
        self.completed.remove(key)
    }

    /// OR-merge: every key completed in `other` becomes completed here.
    /// Nothing is ever cleared. Returns how many keys were newly added.
    pub fn merge(&mut self, other: &CompletionMap) -> usize {
        let before = self.completed.len();
        self.completed.extend(other.completed.iter().cloned());
        self.completed.len() - before
    }

    pub fn keys(&self) -> impl Iterator<Item = &CompletionKey> + '_ {
        self.completed.iter()
    }
}

impl FromIterator<CompletionKey> for CompletionMap {
    fn from_iter<I: IntoIterator<Item = CompletionKey>>(iter: I) -> Self {
        Self {
            completed: iter.into_iter().collect(),
        }
    }
}

impl Extend<CompletionKey> for CompletionMap {
    fn extend<I: IntoIterator<Item = CompletionKey>>(&mut self, iter: I) {
        self.completed.extend(iter);
    }
}

/// Serializes as a JSON object of `"<key>": true` entries.
impl Serialize for CompletionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.completed.len()))?;
        for key in &self.completed {
            map.serialize_entry(&key.encode(), &true)?;
        }
        map.end()
    }
}
