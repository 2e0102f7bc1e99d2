#![forbid(unsafe_code)]

pub mod completion_store;
pub mod repository;
pub mod schema;
pub mod sqlite;

pub use completion_store::LocalCompletionStore;
pub use repository::{InMemoryKeyValueStore, KeyValueStore, Storage, StorageError};
pub use schema::STORAGE_KEY;
