use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{KeyValueStore, StorageError};

#[async_trait]
impl KeyValueStore for SqliteRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        row.map(|row| {
            row.try_get::<String, _>("value")
                .map_err(|err| StorageError::Serialization(err.to_string()))
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
