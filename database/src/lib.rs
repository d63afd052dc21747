use async_trait::async_trait;
use chrono::Utc;
use redscribe_core::{CoreError, KeyValueStore, StorageError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};


/// SQLite-backed key-value storage.
pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("connection_string", &self.connection_string)
            .field("connected", &self.pool.is_some())
            .finish()
    }
}

impl Database {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            pool: None,
        }
    }

    /// Opens (and creates if needed) the database file.
    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| StorageError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        // Every in-memory connection is its own database
        let max_connections = if self.connection_string.contains(":memory:") {
            1
        } else {
            5
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!(url = %self.connection_string, "Connected to database");
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        let pool = self.pool()?;
        sqlx::migrate!()
            .run(pool)
            .await
            .map_err(|e| StorageError::MigrationFailed {
                migration: e.to_string(),
            })?;
        debug!("Database migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool
            .as_ref()
            .ok_or_else(|| StorageError::NotConnected.into())
    }

    pub async fn save_setting(&self, key: &str, value: &str) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool()?)
        .await
        .map_err(StorageError::Sql)?;

        debug!(key, "Saved setting");
        Ok(())
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, CoreError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool()?)
            .await
            .map_err(StorageError::Sql)?;

        match row {
            Some(row) => Ok(Some(row.try_get("value").map_err(StorageError::Sql)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_setting(&self, key: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(self.pool()?)
            .await
            .map_err(StorageError::Sql)?;
        Ok(())
    }

    pub async fn list_keys(&self) -> Result<Vec<String>, CoreError> {
        let rows = sqlx::query("SELECT key FROM kv_store ORDER BY key")
            .fetch_all(self.pool()?)
            .await
            .map_err(StorageError::Sql)?;

        rows.iter()
            .map(|row| row.try_get("key").map_err(|e| StorageError::Sql(e).into()))
            .collect()
    }
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        self.get_setting(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.save_setting(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), CoreError> {
        self.delete_setting(key).await
    }
}
