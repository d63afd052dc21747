use crate::api::{invalid_response, transport_error};
use crate::RedditClientConfig;
use chrono::{DateTime, Utc};
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use redscribe_core::{ConfigError, CoreError, RedditApiError, TokenPair};
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

const DEFAULT_EXPIRES_IN_SECONDS: u64 = 3600;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    NotAuthenticated,
    PendingAuthorization { csrf_state: String },
    Authenticated { expires_at: DateTime<Utc> },
    TokenExpired { expired_at: DateTime<Utc> },
}

/// An authorize URL waiting for the user, with the state value the callback
/// must echo back.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub url: String,
    pub state: CsrfToken,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
    error: Option<String>,
}

/// Builds the browser authorize URL with a fresh CSRF state.
pub(crate) fn authorize_url(
    config: &RedditClientConfig,
    client_id: &str,
    scopes: &[&str],
) -> Result<PendingAuthorization, CoreError> {
    let auth_url = AuthUrl::new(config.authorize_url.clone()).map_err(|_| {
        ConfigError::InvalidValue {
            field: "reddit.authorize_url".to_string(),
            value: config.authorize_url.clone(),
        }
    })?;
    let redirect_url = RedirectUrl::new(config.redirect_uri.clone()).map_err(|_| {
        ConfigError::InvalidValue {
            field: "reddit.redirect_uri".to_string(),
            value: config.redirect_uri.clone(),
        }
    })?;

    let client = BasicClient::new(ClientId::new(client_id.to_string()), None, auth_url, None)
        .set_redirect_uri(redirect_url);

    let (url, state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(scopes.iter().map(|scope| Scope::new(scope.to_string())))
        .add_extra_param("duration", "permanent")
        .url();

    Ok(PendingAuthorization {
        url: url.to_string(),
        state,
    })
}

/// Posts one grant to the token endpoint and converts the answer into a
/// [`TokenPair`] stamped with `now`.
pub(crate) async fn request_token(
    http: &Client,
    config: &RedditClientConfig,
    client_id: &str,
    client_secret: &str,
    form: &[(&str, &str)],
    now: DateTime<Utc>,
) -> Result<TokenPair, CoreError> {
    let grant_type = form
        .iter()
        .find(|(key, _)| *key == "grant_type")
        .map(|(_, value)| *value)
        .unwrap_or("unknown");
    debug!(grant_type, "Requesting token");

    let response = http
        .post(&config.token_url)
        .basic_auth(client_id, Some(client_secret))
        .header(USER_AGENT, &config.user_agent)
        .form(form)
        .send()
        .await
        .map_err(|e| transport_error(e, config.timeout))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), grant_type, "Token endpoint refused grant");
        return Err(RedditApiError::AuthenticationFailed {
            reason: format!("token endpoint returned {}: {}", status.as_u16(), body.trim()),
        }
        .into());
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| invalid_response(format!("Failed to parse token response: {}", e)))?;

    if let Some(error) = body.error {
        warn!(grant_type, %error, "Token endpoint reported an error");
        return Err(RedditApiError::AuthenticationFailed { reason: error }.into());
    }

    let access_token = body
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| invalid_response("Token response carried no access_token"))?;

    Ok(TokenPair {
        access_token,
        refresh_token: body.refresh_token.filter(|token| !token.is_empty()),
        obtained_at: now,
        expires_in_seconds: body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS),
        scope: body
            .scope
            .map(|scope| scope.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
    })
}

#[derive(Debug)]
pub(crate) struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub(crate) fn parse_callback(callback_url: &str) -> Result<CallbackParams, CoreError> {
    let url = url::Url::parse(callback_url).map_err(|_| RedditApiError::AuthenticationFailed {
        reason: "Invalid callback URL".to_string(),
    })?;

    let mut params = CallbackParams {
        code: None,
        state: None,
        error: None,
    };
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(params)
}
