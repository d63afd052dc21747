//! Application configuration.
//!
//! Non-secret settings come from a TOML file where every section has
//! defaults; secrets are only ever read from the environment.

use crate::error::{ConfigError, CoreError};
use crate::types::{ActionKind, AutomationPolicy, AutomationTargets, Credentials};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const ENV_REDDIT_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_REDDIT_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_REDDIT_USERNAME: &str = "REDDIT_USERNAME";
pub const ENV_REDDIT_PASSWORD: &str = "REDDIT_PASSWORD";
pub const ENV_GENERATION_API_KEY: &str = "GENERATION_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditSettings,
    pub generation: GenerationSettings,
    pub automation: AutomationPolicy,
    pub targets: AutomationTargets,
    pub daemon: DaemonSettings,
    pub storage: StorageSettings,
    pub relay: RelaySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub user_agent: String,
    pub api_base: String,
    pub token_url: String,
    pub authorize_url: String,
    pub redirect_uri: String,
    pub request_timeout_secs: u64,
    pub requests_per_minute: u32,
    pub token_staleness_hours: u64,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            user_agent: "redscribe:v0.1 (automation client)".to_string(),
            api_base: "https://oauth.reddit.com".to_string(),
            token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            authorize_url: "https://www.reddit.com/api/v1/authorize".to_string(),
            redirect_uri: "http://localhost:8080/callback".to_string(),
            request_timeout_secs: 30,
            requests_per_minute: 60,
            token_staleness_hours: 24,
        }
    }
}

impl RedditSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_staleness(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_staleness_hours as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub app_title: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "deepseek/deepseek-chat-v3.1:free".to_string(),
            max_tokens: 800,
            temperature: 0.7,
            timeout_secs: 60,
            app_title: "Redscribe".to_string(),
        }
    }
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub auto_post: bool,
    pub auto_comment: bool,
    /// Directory for the analytics export written on shutdown.
    pub export_dir: Option<String>,
}

impl DaemonSettings {
    /// Action kinds the daemon should schedule, posts first.
    pub fn enabled_kinds(&self) -> Vec<ActionKind> {
        [
            (self.auto_post, ActionKind::Post),
            (self.auto_comment, ActionKind::Comment),
        ]
        .into_iter()
        .filter_map(|(enabled, kind)| enabled.then_some(kind))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub database_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://redscribe.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub bind_address: String,
    pub upstream: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            upstream: "https://oauth.reddit.com".to_string(),
            user_agent: "redscribe-relay:v0.1".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl RelaySettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, CoreError> {
        let config: AppConfig = toml::from_str(raw).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let fail = |reason: &str| {
            Err(CoreError::Config(ConfigError::ValidationFailed {
                reason: reason.to_string(),
            }))
        };

        if self.automation.post_interval_secs == 0 || self.automation.comment_interval_secs == 0 {
            return fail("automation intervals must be greater than zero");
        }
        if self.automation.natural_delay_min_secs > self.automation.natural_delay_max_secs {
            return fail("natural_delay_min_secs must not exceed natural_delay_max_secs");
        }
        if self.reddit.requests_per_minute == 0 {
            return fail("requests_per_minute must be greater than zero");
        }
        if self.reddit.request_timeout_secs == 0
            || self.generation.timeout_secs == 0
            || self.relay.request_timeout_secs == 0
        {
            return fail("timeouts must be greater than zero");
        }
        if self.reddit.user_agent.trim().is_empty() {
            return Err(CoreError::configuration_missing("reddit.user_agent"));
        }
        Ok(())
    }
}

/// Secrets resolved at runtime; never part of the configuration file.
#[derive(Clone, Default)]
pub struct Secrets {
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub reddit_username: Option<String>,
    pub reddit_password: Option<String>,
    pub generation_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            reddit_client_id: read(ENV_REDDIT_CLIENT_ID),
            reddit_client_secret: read(ENV_REDDIT_CLIENT_SECRET),
            reddit_username: read(ENV_REDDIT_USERNAME),
            reddit_password: read(ENV_REDDIT_PASSWORD),
            generation_api_key: read(ENV_GENERATION_API_KEY),
        }
    }

    pub fn reddit_credentials(&self) -> Result<Credentials, CoreError> {
        let require = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| CoreError::configuration_missing(name))
        };

        Ok(Credentials::password(
            require(&self.reddit_client_id, ENV_REDDIT_CLIENT_ID)?,
            require(&self.reddit_client_secret, ENV_REDDIT_CLIENT_SECRET)?,
            require(&self.reddit_username, ENV_REDDIT_USERNAME)?,
            require(&self.reddit_password, ENV_REDDIT_PASSWORD)?,
        ))
    }

    pub fn generation_api_key(&self) -> Result<String, CoreError> {
        self.generation_api_key
            .clone()
            .ok_or_else(|| CoreError::configuration_missing(ENV_GENERATION_API_KEY))
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let presence = |value: &Option<String>| if value.is_some() { "set" } else { "unset" };
        f.debug_struct("Secrets")
            .field("reddit_client_id", &presence(&self.reddit_client_id))
            .field("reddit_client_secret", &presence(&self.reddit_client_secret))
            .field("reddit_username", &presence(&self.reddit_username))
            .field("reddit_password", &presence(&self.reddit_password))
            .field("generation_api_key", &presence(&self.generation_api_key))
            .finish()
    }
}
