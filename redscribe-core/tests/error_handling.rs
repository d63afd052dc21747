use redscribe_core::{ConfigError, CoreError, ErrorExt, LlmError, RedditApiError, StorageError};
use std::time::Duration;

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::AuthExpired);
    assert_eq!(reddit_error.error_code(), "REDDIT_AUTH_EXPIRED");

    let remote_error = CoreError::RedditApi(RedditApiError::RemoteError {
        status: 403,
        body: "forbidden".to_string(),
    });
    assert_eq!(remote_error.error_code(), "REDDIT_REMOTE_ERROR");

    let storage_error = CoreError::Storage(StorageError::NotConnected);
    assert_eq!(storage_error.error_code(), "STORAGE");

    let llm_error = CoreError::Llm(LlmError::GenerationFailed {
        provider: "openrouter".to_string(),
        status: 502,
    });
    assert_eq!(llm_error.error_code(), "LLM_GENERATION_FAILED");

    let config_error = CoreError::configuration_missing("client_id");
    assert_eq!(config_error.error_code(), "CONFIG_MISSING");
    assert!(config_error.is_configuration_missing());

    assert_eq!(CoreError::Timeout { seconds: 30 }.error_code(), "TIMEOUT");
}

#[test]
fn test_retryable_errors() {
    let rate_limited = CoreError::RateLimited {
        retry_after: Duration::from_secs(12),
    };
    assert!(rate_limited.is_retryable());

    let server_error = CoreError::RedditApi(RedditApiError::RemoteError {
        status: 503,
        body: String::new(),
    });
    assert!(server_error.is_retryable());

    let client_error = CoreError::RedditApi(RedditApiError::RemoteError {
        status: 400,
        body: String::new(),
    });
    assert!(!client_error.is_retryable());

    assert!(!CoreError::RedditApi(RedditApiError::AuthExpired).is_retryable());
    assert!(!CoreError::Config(ConfigError::ConfigurationMissing {
        field: "api_key".to_string(),
    })
    .is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limited = CoreError::RateLimited {
        retry_after: Duration::from_millis(1500),
    };
    assert_eq!(rate_limited.retry_after(), Some(Duration::from_millis(1500)));

    let timeout_error = CoreError::Timeout { seconds: 30 };
    assert_eq!(timeout_error.retry_after(), Some(Duration::from_secs(30)));

    let auth_expired = CoreError::RedditApi(RedditApiError::AuthExpired);
    assert_eq!(auth_expired.retry_after(), None);
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::AuthExpired);
    let message = reddit_error.user_friendly_message();
    assert!(message.contains("re-authenticate"));

    let config_error = CoreError::configuration_missing("GENERATION_API_KEY");
    let message = config_error.user_friendly_message();
    assert!(message.contains("GENERATION_API_KEY"));

    let rejected = CoreError::RedditApi(RedditApiError::SubmissionRejected {
        reason: "RATELIMIT".to_string(),
    });
    assert!(rejected.user_friendly_message().contains("RATELIMIT"));
}
