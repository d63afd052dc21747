//! Token and credential custody.
//!
//! Holds the current [`TokenPair`] and session [`Credentials`] in memory and
//! mirrors tokens (and the password-free credential subset) into a
//! [`KeyValueStore`]. No network calls happen here.

use chrono::{DateTime, Utc};
use redscribe_core::storage::{keys, load_json, save_json};
use redscribe_core::{
    Clock, CoreError, Credentials, KeyValueStore, SavedCredentials, StorageError, TokenPair,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const DEFAULT_STALENESS_HOURS: i64 = 24;

pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    staleness: chrono::Duration,
    current: RwLock<Option<TokenPair>>,
    credentials: RwLock<Option<Credentials>>,
    saved_credentials: RwLock<Option<SavedCredentials>>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("clock", &self.clock)
            .field("staleness", &self.staleness)
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            staleness: chrono::Duration::hours(DEFAULT_STALENESS_HOURS),
            current: RwLock::new(None),
            credentials: RwLock::new(None),
            saved_credentials: RwLock::new(None),
        }
    }

    /// Maximum age, measured from `obtained_at`, for `load` to return tokens.
    pub fn with_staleness(mut self, staleness: chrono::Duration) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Persists `tokens`, replacing whatever was stored before.
    pub async fn save(&self, tokens: &TokenPair) -> Result<(), CoreError> {
        save_json(self.store.as_ref(), keys::AUTH, tokens).await?;
        *self.current.write().await = Some(tokens.clone());
        debug!(expires_at = %tokens.expires_at(), "Saved token pair");
        Ok(())
    }

    /// Returns stored tokens unless absent or older than the staleness
    /// threshold. A returned pair becomes the current one.
    pub async fn load(&self) -> Result<Option<TokenPair>, CoreError> {
        let stored: Option<TokenPair> = match load_json(self.store.as_ref(), keys::AUTH).await {
            Ok(stored) => stored,
            Err(CoreError::Storage(StorageError::CorruptValue { .. })) => {
                warn!("Discarding unreadable stored tokens");
                None
            }
            Err(e) => return Err(e),
        };

        let Some(tokens) = stored else {
            return Ok(None);
        };

        let age = tokens.age_at(self.clock.now());
        if age >= self.staleness {
            info!(
                age_hours = age.num_hours(),
                "Stored tokens are stale, ignoring them"
            );
            return Ok(None);
        }

        *self.current.write().await = Some(tokens.clone());
        Ok(Some(tokens))
    }

    /// Forgets tokens in memory and in durable storage.
    pub async fn clear(&self) -> Result<(), CoreError> {
        *self.current.write().await = None;
        self.store.delete(keys::AUTH).await?;
        info!("Cleared stored tokens");
        Ok(())
    }

    pub async fn current(&self) -> Option<TokenPair> {
        self.current.read().await.clone()
    }

    pub async fn set_credentials(&self, credentials: Credentials) {
        *self.saved_credentials.write().await = Some(credentials.to_saved());
        *self.credentials.write().await = Some(credentials);
    }

    pub async fn credentials(&self) -> Option<Credentials> {
        self.credentials.read().await.clone()
    }

    pub async fn forget_credentials(&self) {
        *self.credentials.write().await = None;
    }

    /// Client id and secret for token-endpoint calls. Available after
    /// `set_credentials` or `load_saved_credentials`.
    pub async fn client_credentials(&self) -> Option<(String, String)> {
        self.saved_credentials
            .read()
            .await
            .as_ref()
            .map(|saved| (saved.client_id.clone(), saved.client_secret.clone()))
    }

    pub async fn save_credentials(&self) -> Result<(), CoreError> {
        let saved = self.saved_credentials.read().await.clone();
        match saved {
            Some(saved) => save_json(self.store.as_ref(), keys::CREDENTIALS, &saved).await,
            None => Ok(()),
        }
    }

    pub async fn load_saved_credentials(&self) -> Result<Option<SavedCredentials>, CoreError> {
        let saved: Option<SavedCredentials> =
            load_json(self.store.as_ref(), keys::CREDENTIALS).await?;
        if let Some(saved) = &saved {
            *self.saved_credentials.write().await = Some(saved.clone());
        }
        Ok(saved)
    }
}
