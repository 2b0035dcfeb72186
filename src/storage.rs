use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite, sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous}};
use tokio::sync::RwLock;

use crate::error::StorageError;

/// String key/value persistence, the native counterpart of browser local storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;
    /// Stores `value` unless `key` is already set. Returns the value left in the store.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<String, StorageError>;
    /// Replaces the value only while it still equals `expected`; a missing key
    /// is filled with `value`. Returns the value left in the store.
    async fn compare_and_swap(&self, key: &str, expected: &str, value: &str) -> Result<String, StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<String, StorageError> {
        let mut entries = self.entries.write().await;
        Ok(entries.entry(key.to_string()).or_insert_with(|| value.to_string()).clone())
    }

    async fn compare_and_swap(&self, key: &str, expected: &str, value: &str) -> Result<String, StorageError> {
        let mut entries = self.entries.write().await;
        let slot = entries.entry(key.to_string()).or_insert_with(|| value.to_string());
        if slot == expected {
            *slot = value.to_string();
        }
        Ok(slot.clone())
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn initialize(database_url: Option<String>) -> Result<Self, StorageError> {
        let url = match database_url {
            Some(u) => u,
            None => default_db_url(None)?,
        };
        let options = url.parse::<SqliteConnectOptions>()?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);
        let pool = Pool::<Sqlite>::connect_with(options).await?;
        sqlx::query("PRAGMA busy_timeout = 5000;").execute(&pool).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn open_in(data_dir: &Path) -> Result<Self, StorageError> {
        Self::initialize(Some(default_db_url(Some(data_dir))?)).await
    }

    #[cfg(test)]
    pub fn pool(&self) -> &Pool<Sqlite> { &self.pool }
}

/// `sqlite://` url for `storage.db` under `data_dir`, or under
/// `$XDG_DATA_HOME/spiq_widget` when none is given.
pub fn default_db_url(data_dir: Option<&Path>) -> Result<String, StorageError> {
    let dir = match data_dir {
        Some(d) => d.to_path_buf(),
        None => {
            let base = std::env::var("XDG_DATA_HOME").ok().map(PathBuf::from).unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
                PathBuf::from(home).join(".local").join("share")
            });
            base.join("spiq_widget")
        }
    };
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("storage.db");
    Ok(format!("sqlite://{}", path.to_string_lossy()))
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM kv_entries WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<String, StorageError> {
        // the no-op update makes RETURNING yield the existing row on conflict
        let row = sqlx::query(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = kv_entries.value RETURNING value",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<String, _>("value"))
    }

    async fn compare_and_swap(&self, key: &str, expected: &str, value: &str) -> Result<String, StorageError> {
        let swapped = sqlx::query(
            "UPDATE kv_entries SET value = ?3, updated_at = ?4 WHERE key = ?1 AND value = ?2 RETURNING value",
        )
        .bind(key)
        .bind(expected)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = swapped {
            return Ok(row.get::<String, _>("value"));
        }
        self.set_if_absent(key, value).await
    }
}
