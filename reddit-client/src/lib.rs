pub mod api;
pub mod auth;
pub mod rate_limiter;
pub mod token_store;


use api::{
    invalid_response, normalize_subreddit, parent_fullname, transport_error, ApiRequest,
    CommentData, JsonEnvelope, RedditListing, RedditPostData, RedditUserData, SubmitData,
};
use redscribe_core::config::RedditSettings;
use redscribe_core::{
    CommentId, CoreError, Credentials, Grant, ListingSort, Page, PostId, RedditApiError,
    RedditPost, TokenPair, UserInfo,
};
use reqwest::header::USER_AGENT;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub use auth::{AuthState, PendingAuthorization};
pub use rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter, Reservation};
pub use token_store::TokenStore;

#[derive(Debug, Clone)]
pub struct RedditClientConfig {
    pub user_agent: String,
    pub api_base: String,
    pub token_url: String,
    pub authorize_url: String,
    pub redirect_uri: String,
    pub timeout: Duration,
}

impl RedditClientConfig {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            api_base: api::REDDIT_API_BASE.to_string(),
            token_url: api::REDDIT_TOKEN_URL.to_string(),
            authorize_url: api::REDDIT_AUTHORIZE_URL.to_string(),
            redirect_uri: "http://localhost:8080/callback".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_settings(settings: &RedditSettings) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            api_base: settings.api_base.clone(),
            token_url: settings.token_url.clone(),
            authorize_url: settings.authorize_url.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            timeout: settings.request_timeout(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_authorize_url(mut self, authorize_url: impl Into<String>) -> Self {
        self.authorize_url = authorize_url.into();
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Authenticated access to the Reddit API.
///
/// Every API call goes through the same pipeline: the shared request budget
/// is checked, an access token is obtained (refreshing it first when it has
/// expired), and a 401 answer triggers exactly one refresh and one retry. A
/// request only counts against the budget once it has succeeded.
pub struct RedditClient {
    http: Client,
    config: RedditClientConfig,
    rate_limiter: Arc<RateLimiter>,
    tokens: Arc<TokenStore>,
    pending_authorization: Mutex<Option<PendingAuthorization>>,
}

impl std::fmt::Debug for RedditClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditClient")
            .field("config", &self.config)
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

impl RedditClient {
    pub fn new(
        config: RedditClientConfig,
        rate_limiter: Arc<RateLimiter>,
        tokens: Arc<TokenStore>,
    ) -> Result<Self, CoreError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            config,
            rate_limiter,
            tokens,
            pending_authorization: Mutex::new(None),
        })
    }

    pub fn required_scopes() -> Vec<&'static str> {
        vec!["identity", "read", "submit", "mysubreddits"]
    }

    pub fn config(&self) -> &RedditClientConfig {
        &self.config
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub async fn rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.status()
    }

    /// True while a token pair is held that is either unexpired or can be
    /// refreshed.
    pub async fn is_authenticated(&self) -> bool {
        match self.tokens.current().await {
            Some(tokens) => {
                !tokens.is_expired_at(self.tokens.now()) || tokens.refresh_token.is_some()
            }
            None => false,
        }
    }

    pub async fn auth_state(&self) -> AuthState {
        if let Some(tokens) = self.tokens.current().await {
            let expires_at = tokens.expires_at();
            return if tokens.is_expired_at(self.tokens.now()) {
                AuthState::TokenExpired {
                    expired_at: expires_at,
                }
            } else {
                AuthState::Authenticated { expires_at }
            };
        }

        match self.pending_authorization.lock().await.as_ref() {
            Some(pending) => AuthState::PendingAuthorization {
                csrf_state: pending.state.secret().clone(),
            },
            None => AuthState::NotAuthenticated,
        }
    }

    /// Exchanges `credentials` for a token pair and makes them the session
    /// credentials.
    pub async fn authenticate(&self, credentials: Credentials) -> Result<TokenPair, CoreError> {
        if let Some(field) = credentials.first_missing_field() {
            return Err(CoreError::configuration_missing(field));
        }

        let tokens = {
            let form: Vec<(&str, &str)> = match &credentials.grant {
                Grant::Password { username, password } => vec![
                    ("grant_type", "password"),
                    ("username", username.as_str()),
                    ("password", password.as_str()),
                ],
                Grant::AuthorizationCode { code, redirect_uri } => vec![
                    ("grant_type", "authorization_code"),
                    ("code", code.as_str()),
                    ("redirect_uri", redirect_uri.as_str()),
                ],
            };
            auth::request_token(
                &self.http,
                &self.config,
                &credentials.client_id,
                &credentials.client_secret,
                &form,
                self.tokens.now(),
            )
            .await?
        };

        let username = credentials.username().map(str::to_string);
        self.tokens.set_credentials(credentials).await;
        self.tokens.save(&tokens).await?;
        self.tokens.save_credentials().await?;

        info!(username = ?username, expires_at = %tokens.expires_at(), "Authenticated with Reddit");
        Ok(tokens)
    }

    /// Trades the refresh token of `tokens` for a new pair and stores it. The
    /// old refresh token is kept when the endpoint does not issue a new one.
    pub async fn refresh(&self, tokens: &TokenPair) -> Result<TokenPair, CoreError> {
        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            warn!("No refresh token available");
            return Err(RedditApiError::AuthExpired.into());
        };

        let (client_id, client_secret) = self
            .tokens
            .client_credentials()
            .await
            .ok_or_else(|| CoreError::configuration_missing("client_id"))?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let mut refreshed = auth::request_token(
            &self.http,
            &self.config,
            &client_id,
            &client_secret,
            &form,
            self.tokens.now(),
        )
        .await
        .map_err(|e| match e {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason }) => {
                warn!(%reason, "Refresh token was refused");
                CoreError::RedditApi(RedditApiError::AuthExpired)
            }
            other => other,
        })?;

        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = tokens.refresh_token.clone();
        }
        self.tokens.save(&refreshed).await?;

        debug!(expires_at = %refreshed.expires_at(), "Refreshed access token");
        Ok(refreshed)
    }

    /// Returns the authorize URL for the browser flow. A new CSRF state is
    /// generated on every call and replaces any earlier one.
    pub async fn begin_authorization(
        &self,
        client_id: &str,
        scopes: &[&str],
    ) -> Result<String, CoreError> {
        let pending = auth::authorize_url(&self.config, client_id, scopes)?;
        let url = pending.url.clone();
        *self.pending_authorization.lock().await = Some(pending);
        info!("Authorization URL generated");
        Ok(url)
    }

    /// Validates the redirect the browser landed on and exchanges its code
    /// for tokens.
    pub async fn complete_authorization(
        &self,
        callback_url: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenPair, CoreError> {
        let params = auth::parse_callback(callback_url)?;

        if let Some(error) = params.error {
            return Err(RedditApiError::AuthenticationFailed { reason: error }.into());
        }

        let Some(state) = params.state else {
            return Err(RedditApiError::AuthenticationFailed {
                reason: "Missing state parameter".to_string(),
            }
            .into());
        };

        {
            let mut pending = self.pending_authorization.lock().await;
            let matches = pending
                .as_ref()
                .is_some_and(|pending| pending.state.secret() == &state);
            if !matches {
                warn!("Authorization callback state did not match");
                return Err(RedditApiError::AuthenticationFailed {
                    reason: "CSRF token mismatch".to_string(),
                }
                .into());
            }
            pending.take();
        }

        let code = params.code.ok_or_else(|| RedditApiError::AuthenticationFailed {
            reason: "Missing authorization code".to_string(),
        })?;

        self.authenticate(Credentials::authorization_code(
            client_id,
            client_secret,
            code,
            self.config.redirect_uri.clone(),
        ))
        .await
    }

    /// Reloads persisted credentials and tokens. Returns whether a usable
    /// session came back.
    pub async fn restore_session(&self) -> Result<bool, CoreError> {
        self.tokens.load_saved_credentials().await?;
        let restored = self.tokens.load().await?.is_some();
        if restored {
            info!("Restored stored Reddit session");
        }
        Ok(restored)
    }

    pub async fn logout(&self) -> Result<(), CoreError> {
        self.tokens.clear().await?;
        self.tokens.forget_credentials().await;
        *self.pending_authorization.lock().await = None;
        info!("Logged out of Reddit");
        Ok(())
    }

    pub async fn get_self(&self) -> Result<UserInfo, CoreError> {
        let response = self.execute(&ApiRequest::get("/api/v1/me")).await?;
        let user: RedditUserData = parse_json(response).await?;
        Ok(user.into())
    }

    pub async fn list_posts(
        &self,
        subreddit: &str,
        sort: ListingSort,
        limit: u32,
        after: Option<&str>,
    ) -> Result<Page<RedditPost>, CoreError> {
        let subreddit = normalize_subreddit(subreddit)?;
        let mut request = ApiRequest::get(format!("/r/{}/{}", subreddit, sort))
            .query("limit", limit.clamp(1, 100).to_string())
            .query("raw_json", "1");
        if let Some(after) = after {
            request = request.query("after", after);
        }

        let response = self.execute(&request).await?;
        let listing: RedditListing<RedditPostData> = parse_json(response).await?;
        let page: Page<RedditPost> = listing.into();
        debug!(subreddit, count = page.items.len(), "Fetched listing");
        Ok(page)
    }

    pub async fn submit_post(
        &self,
        subreddit: &str,
        title: &str,
        body: &str,
    ) -> Result<PostId, CoreError> {
        let subreddit = normalize_subreddit(subreddit)?;
        if title.trim().is_empty() {
            return Err(CoreError::InvalidInput {
                message: "post title is empty".to_string(),
            });
        }

        let form = vec![
            ("sr".to_string(), subreddit.to_string()),
            ("kind".to_string(), "self".to_string()),
            ("title".to_string(), title.to_string()),
            ("text".to_string(), body.to_string()),
            ("api_type".to_string(), "json".to_string()),
        ];
        let response = self
            .execute(&ApiRequest::post_form("/api/submit", form))
            .await?;
        let envelope: JsonEnvelope<SubmitData> = parse_json(response).await?;
        let post: PostId = envelope.into_data("submit")?.into();

        info!(subreddit, post = %post.name, "Submitted post");
        Ok(post)
    }

    pub async fn submit_comment(&self, parent_id: &str, body: &str) -> Result<CommentId, CoreError> {
        if body.trim().is_empty() {
            return Err(CoreError::InvalidInput {
                message: "comment body is empty".to_string(),
            });
        }

        let parent = parent_fullname(parent_id);
        let form = vec![
            ("thing_id".to_string(), parent.clone()),
            ("text".to_string(), body.to_string()),
            ("api_type".to_string(), "json".to_string()),
        ];
        let response = self
            .execute(&ApiRequest::post_form("/api/comment", form))
            .await?;
        let envelope: JsonEnvelope<CommentData> = parse_json(response).await?;
        let comment = envelope
            .into_data("comment")?
            .things
            .into_iter()
            .next()
            .map(|thing| CommentId::from(thing.data))
            .ok_or_else(|| invalid_response("comment response listed no things"))?;

        info!(parent = %parent, comment = %comment.name, "Submitted comment");
        Ok(comment)
    }

    async fn execute(&self, request: &ApiRequest) -> Result<Response, CoreError> {
        // Held until the request settles; early returns release the slot
        let reservation = match self.rate_limiter.reserve() {
            Ok(reservation) => reservation,
            Err(retry_after) => {
                warn!(
                    path = %request.path,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Request budget exhausted"
                );
                return Err(CoreError::RateLimited { retry_after });
            }
        };

        let tokens = self.usable_tokens().await?;
        let mut response = self.dispatch(request, &tokens.access_token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %request.path, "Access token rejected, refreshing once");
            let refreshed = match self.refresh(&tokens).await {
                Ok(refreshed) => refreshed,
                Err(e) => return Err(self.expire_session(&e).await),
            };

            response = self.dispatch(request, &refreshed.access_token).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(self.expire_session(&"rejected after refresh").await);
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                "Reddit API request failed"
            );
            return Err(RedditApiError::RemoteError {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        reservation.record();
        Ok(response)
    }

    async fn usable_tokens(&self) -> Result<TokenPair, CoreError> {
        let tokens = self.tokens.current().await.ok_or_else(|| {
            CoreError::from(RedditApiError::AuthenticationFailed {
                reason: "Not authenticated".to_string(),
            })
        })?;

        if !tokens.is_expired_at(self.tokens.now()) {
            return Ok(tokens);
        }

        debug!("Access token expired, refreshing before request");
        match self.refresh(&tokens).await {
            Ok(refreshed) => Ok(refreshed),
            Err(e) => Err(self.expire_session(&e).await),
        }
    }

    async fn dispatch(&self, request: &ApiRequest, access_token: &str) -> Result<Response, CoreError> {
        let url = format!(
            "{}{}",
            self.config.api_base.trim_end_matches('/'),
            request.path
        );

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .bearer_auth(access_token)
            .header(USER_AGENT, &self.config.user_agent);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        debug!(method = %request.method, path = %request.path, "Dispatching request");
        builder
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.timeout))
    }

    /// Drops the session's tokens and reports `AuthExpired`.
    async fn expire_session(&self, cause: &(dyn std::fmt::Display + Sync)) -> CoreError {
        warn!(%cause, "Reddit session expired, clearing tokens");
        if let Err(e) = self.tokens.clear().await {
            error!(error = %e, "Failed to clear stored tokens");
        }
        RedditApiError::AuthExpired.into()
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, CoreError> {
    response
        .json()
        .await
        .map_err(|e| invalid_response(format!("Failed to parse response: {}", e)))
}
