//! Key-value persistence port.
//!
//! Every persisted record is a JSON document under one of the keys in
//! [`keys`]. Implementations only move strings; typed access goes through
//! [`load_json`] and [`save_json`].

use crate::error::{CoreError, StorageError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

pub mod keys {
    pub const CREDENTIALS: &str = "reddit_credentials";
    pub const AUTH: &str = "reddit_auth";
    pub const ANALYTICS: &str = "reddit_analytics";
    pub const SETTINGS: &str = "reddit_settings";
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError>;
    async fn put(&self, key: &str, value: &str) -> Result<(), CoreError>;
    async fn delete(&self, key: &str) -> Result<(), CoreError>;
}

/// Volatile store for tests and for running without a database.
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
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

pub async fn save_json<T, S>(store: &S, key: &str, value: &T) -> Result<(), CoreError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let encoded = serde_json::to_string(value)?;
    store.put(key, &encoded).await
}

/// Reads a typed record. A value that no longer deserializes is reported
/// as `CorruptValue` rather than a serialization error.
pub async fn load_json<T, S>(store: &S, key: &str) -> Result<Option<T>, CoreError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key, error = %e, "Stored value failed to deserialize");
            Err(StorageError::CorruptValue {
                key: key.to_string(),
            }
            .into())
        }
    }
}
