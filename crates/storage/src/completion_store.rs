use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracker_core::model::{CompletionKey, CompletionMap};

use crate::repository::{KeyValueStore, StorageError};
use crate::schema::{self, STORAGE_KEY};

/// Durable record of which sessions were completed on which dates.
///
/// The in-memory map is authoritative for the process. Every mutation is
/// written through to the key-value store; write failures are logged and
/// otherwise ignored so a broken backend never blanks the schedule.
///
/// Nothing is written until the persisted blob has been read at least once,
/// so a failed or still-running read can never be overwritten by a map that
/// lacks it.
pub struct LocalCompletionStore {
    kv: Arc<dyn KeyValueStore>,
    storage_key: String,
    state: Mutex<CompletionMap>,
    // Set once the persisted blob has been merged into `state`.
    synced: AtomicBool,
    // Held across read-merge and snapshot-write so a newer snapshot is never
    // overwritten by an older one.
    write_lock: tokio::sync::Mutex<()>,
}

impl LocalCompletionStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_storage_key(kv, STORAGE_KEY)
    }

    #[must_use]
    pub fn with_storage_key(kv: Arc<dyn KeyValueStore>, storage_key: impl Into<String>) -> Self {
        Self {
            kv,
            storage_key: storage_key.into(),
            state: Mutex::new(CompletionMap::new()),
            synced: AtomicBool::new(false),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Whether the persisted blob has been read and merged.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    /// Reads the persisted blob, upgrades it if it predates the current
    /// schema, and merges it into memory. Returns the resulting map.
    ///
    /// Corrupt state loads as empty. A backend that cannot be read also
    /// yields the in-memory map, but writes stay deferred until a later read
    /// succeeds. This never fails.
    pub async fn load(&self) -> CompletionMap {
        let _guard = self.write_lock.lock().await;
        match self.read_and_merge().await {
            Ok(true) => {
                if let Err(err) = self.write_snapshot().await {
                    tracing::warn!(error = %err, key = %self.storage_key, "failed to write back migrated completions");
                }
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(error = %err, key = %self.storage_key, "completion store unreadable; deferring writes");
            }
        }
        self.snapshot()
    }

    /// Copy of the current in-memory map.
    #[must_use]
    pub fn snapshot(&self) -> CompletionMap {
        self.lock_state().clone()
    }

    #[must_use]
    pub fn is_completed(&self, key: &CompletionKey) -> bool {
        self.lock_state().contains(key)
    }

    /// Exact key or plan-level fallback.
    #[must_use]
    pub fn is_satisfied(&self, key: &CompletionKey) -> bool {
        self.lock_state().is_satisfied(key)
    }

    /// Optimistically records a completion and persists it.
    pub async fn mark(&self, key: CompletionKey) -> bool {
        let added = self.lock_state().mark(key);
        if added {
            self.save().await;
        }
        added
    }

    /// Removes a locally recorded completion and persists the change.
    pub async fn unmark(&self, key: &CompletionKey) -> bool {
        let removed = self.lock_state().unmark(key);
        if removed {
            self.save().await;
        }
        removed
    }

    /// OR-merges `incoming` into the store. Never clears a completion.
    /// Returns the number of keys that were newly added.
    pub async fn merge(&self, incoming: &CompletionMap) -> usize {
        let added = self.lock_state().merge(incoming);
        if added > 0 {
            self.save().await;
        }
        added
    }

    /// Writes the current map to the backing store, swallowing failures.
    pub async fn save(&self) {
        if let Err(err) = self.persist().await {
            tracing::warn!(error = %err, key = %self.storage_key, "failed to persist completions");
        }
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        if !self.is_synced() {
            self.read_and_merge().await?;
        }
        self.write_snapshot().await
    }

    /// Merges the persisted blob into memory and marks the store synced.
    /// Returns whether the blob should be rewritten in the current schema.
    /// Callers hold `write_lock`.
    async fn read_and_merge(&self) -> Result<bool, StorageError> {
        let raw = self.kv.get(&self.storage_key).await?;
        let write_back = match raw.as_deref().map(schema::decode) {
            None => false,
            Some(Err(err)) => {
                tracing::warn!(error = %err, key = %self.storage_key, "discarding corrupt completion blob");
                false
            }
            Some(Ok(decoded)) => {
                if decoded.source_version < schema::CURRENT_VERSION {
                    tracing::debug!(
                        from = decoded.source_version,
                        to = schema::CURRENT_VERSION,
                        entries = decoded.completions.len(),
                        "migrated completion blob"
                    );
                }
                self.lock_state().merge(&decoded.completions);
                decoded.needs_write_back()
            }
        };
        self.synced.store(true, Ordering::SeqCst);
        Ok(write_back)
    }

    async fn write_snapshot(&self) -> Result<(), StorageError> {
        let blob = schema::encode(&self.snapshot())
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.kv.set(&self.storage_key, &blob).await
    }

    fn lock_state(&self) -> MutexGuard<'_, CompletionMap> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
