use std::sync::Arc;

use storage::repository::{KeyValueStore, Storage};
use storage::sqlite::SqliteRepository;
use storage::{LocalCompletionStore, STORAGE_KEY};
use tracker_core::model::CompletionKey;

fn key(raw: &str) -> CompletionKey {
    raw.parse().unwrap()
}

#[tokio::test]
async fn sqlite_kv_roundtrip_and_clear() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    // A second run must be a no-op.
    repo.migrate().await.expect("migrate again");

    assert_eq!(repo.get("missing").await.unwrap(), None);
    repo.set("k", "first").await.unwrap();
    repo.set("k", "second").await.unwrap();
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("second"));

    repo.clear("k").await.unwrap();
    assert_eq!(repo.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn completion_store_survives_reopen_on_sqlite() {
    let url = "sqlite:file:memdb_completion_reopen?mode=memory&cache=shared";
    let storage = Storage::sqlite(url).await.expect("storage");

    let store = LocalCompletionStore::new(Arc::clone(&storage.kv));
    store.load().await;
    store.mark(key("7:3|2024-02-01")).await;
    store.mark(key("9:plan|2024-02-02")).await;

    let reopened = LocalCompletionStore::new(Arc::clone(&storage.kv));
    let loaded = reopened.load().await;
    assert_eq!(loaded.len(), 2);
    assert!(reopened.is_satisfied(&key("9:4|2024-02-02")));
}

#[tokio::test]
async fn legacy_blob_in_sqlite_is_upgraded_in_place() {
    let url = "sqlite:file:memdb_completion_legacy?mode=memory&cache=shared";
    let storage = Storage::sqlite(url).await.expect("storage");
    storage
        .kv
        .set(STORAGE_KEY, r#"{"42|2024-01-15": "true", "7:3|2024-02-01": true}"#)
        .await
        .unwrap();

    let store = LocalCompletionStore::new(Arc::clone(&storage.kv));
    let loaded = store.load().await;
    assert!(loaded.contains(&key("42:plan|2024-01-15")));
    assert!(loaded.contains(&key("7:3|2024-02-01")));

    let raw = storage.kv.get(STORAGE_KEY).await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["version"], 2);
    assert_eq!(value["completions"]["42:plan|2024-01-15"], true);
    assert!(value["completions"].get("42|2024-01-15").is_none());
}
