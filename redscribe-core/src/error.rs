use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Rate limited locally. Retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    /// Missing credential fields, generation key, or environment secrets.
    pub fn configuration_missing(field: impl Into<String>) -> Self {
        CoreError::Config(ConfigError::ConfigurationMissing {
            field: field.into(),
        })
    }

    pub fn is_configuration_missing(&self) -> bool {
        matches!(
            self,
            CoreError::Config(ConfigError::ConfigurationMissing { .. })
        )
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, CoreError::RedditApi(RedditApiError::AuthExpired))
    }
}

#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Session expired, re-authentication required")]
    AuthExpired,

    #[error("Reddit returned {status}: {body}")]
    RemoteError { status: u16, body: String },

    #[error("Submission rejected: {reason}")]
    SubmissionRejected { reason: String },

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Corrupt value under key {key}")]
    CorruptValue { key: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation failed for {provider} with status {status}")]
    GenerationFailed { provider: String, status: u16 },

    #[error("Invalid response format from {provider}")]
    InvalidResponseFormat { provider: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {field}")]
    ConfigurationMissing { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
