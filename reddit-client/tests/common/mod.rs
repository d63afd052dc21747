//! A local stand-in for the Reddit token endpoint and OAuth API.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use reddit_client::{RateLimitConfig, RateLimiter, RedditClient, RedditClientConfig, TokenStore};
use redscribe_core::{Credentials, MemoryStore, SystemClock, TokenPair};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const USER_AGENT: &str = "redscribe-tests/1.0 by test_user";

#[derive(Default)]
pub struct MockState {
    pub token_calls: AtomicUsize,
    pub api_calls: AtomicUsize,
    /// Number of upcoming API calls answered with 401.
    pub unauthorized_remaining: AtomicUsize,
    pub refresh_fails: AtomicBool,
    pub grant_types: Mutex<Vec<String>>,
    pub basic_auth: Mutex<Option<String>>,
    pub bearer_tokens: Mutex<Vec<String>>,
    pub user_agents: Mutex<Vec<String>>,
    pub last_query: Mutex<HashMap<String, String>>,
    pub last_form: Mutex<HashMap<String, String>>,
}

impl MockState {
    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::SeqCst)
    }

    pub fn reject_next(&self, count: usize) {
        self.unauthorized_remaining.store(count, Ordering::SeqCst);
    }

    fn observe_api_call(&self, headers: &HeaderMap) -> Option<Response> {
        self.api_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(agent) = headers.get("user-agent").and_then(|v| v.to_str().ok()) {
            self.user_agents.lock().unwrap().push(agent.to_string());
        }
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.bearer_tokens
                .lock()
                .unwrap()
                .push(auth.trim_start_matches("Bearer ").to_string());
        }

        let remaining = self.unauthorized_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.unauthorized_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Some((StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"}))).into_response());
        }
        None
    }
}

pub struct MockReddit {
    pub base: String,
    pub state: Arc<MockState>,
}

impl MockReddit {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/api/v1/access_token", post(token))
            .route("/api/v1/me", get(me))
            .route("/r/{subreddit}/{sort}", get(listing))
            .route("/api/submit", post(submit))
            .route("/api/comment", post(comment))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            state,
        }
    }

    pub fn client_config(&self) -> RedditClientConfig {
        RedditClientConfig::new(USER_AGENT)
            .with_api_base(self.base.clone())
            .with_token_url(format!("{}/api/v1/access_token", self.base))
            .with_timeout(Duration::from_millis(500))
    }

    pub fn client(&self, limits: RateLimitConfig) -> RedditClient {
        let tokens = Arc::new(TokenStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
        ));
        RedditClient::new(
            self.client_config(),
            Arc::new(RateLimiter::new(limits)),
            tokens,
        )
        .unwrap()
    }

    /// A client already holding `tokens` and the test credentials.
    pub async fn client_with_tokens(&self, tokens: TokenPair) -> RedditClient {
        self.client_with_limits_and_tokens(RateLimitConfig::reddit_oauth(), tokens)
            .await
    }

    pub async fn client_with_limits_and_tokens(
        &self,
        limits: RateLimitConfig,
        tokens: TokenPair,
    ) -> RedditClient {
        let client = self.client(limits);
        client
            .token_store()
            .set_credentials(test_credentials())
            .await;
        client.token_store().save(&tokens).await.unwrap();
        client
    }
}

pub fn test_credentials() -> Credentials {
    Credentials::password("test_client_id", "test_client_secret", "test_user", "hunter2")
}

pub fn fresh_tokens() -> TokenPair {
    TokenPair {
        access_token: "access-initial".to_string(),
        refresh_token: Some("refresh-initial".to_string()),
        obtained_at: chrono::Utc::now(),
        expires_in_seconds: 3600,
        scope: vec!["identity".to_string(), "submit".to_string()],
    }
}

async fn token(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let call = state.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    *state.basic_auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let grant_type = form.get("grant_type").cloned().unwrap_or_default();
    state.grant_types.lock().unwrap().push(grant_type.clone());

    match grant_type.as_str() {
        "password" if form.get("password").map(String::as_str) == Some("wrong") => {
            Json(json!({"error": "invalid_grant"})).into_response()
        }
        "password" | "authorization_code" => Json(json!({
            "access_token": format!("access-{}", call),
            "refresh_token": "refresh-issued",
            "token_type": "bearer",
            "expires_in": 3600,
            "scope": "identity read submit"
        }))
        .into_response(),
        "refresh_token" if state.refresh_fails.load(Ordering::SeqCst) => {
            (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))).into_response()
        }
        // Reddit usually omits the refresh token on refresh
        "refresh_token" => Json(json!({
            "access_token": format!("access-refreshed-{}", call),
            "token_type": "bearer",
            "expires_in": 3600,
            "scope": "identity read submit"
        }))
        .into_response(),
        _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "unsupported_grant_type"})))
            .into_response(),
    }
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Some(rejection) = state.observe_api_call(&headers) {
        return rejection;
    }
    Json(json!({
        "name": "test_user",
        "link_karma": 120,
        "comment_karma": 345,
        "created_utc": 1600000000.0,
        "is_gold": false
    }))
    .into_response()
}

async fn listing(
    State(state): State<Arc<MockState>>,
    Path((subreddit, sort)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = state.observe_api_call(&headers) {
        return rejection;
    }
    *state.last_query.lock().unwrap() = query;

    match subreddit.as_str() {
        "private" => (StatusCode::FORBIDDEN, "forbidden").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"kind": "Listing", "data": {"children": [], "after": null, "before": null}}))
                .into_response()
        }
        _ => Json(json!({
            "kind": "Listing",
            "data": {
                "after": "t3_next",
                "before": null,
                "dist": 2,
                "children": [
                    {"kind": "t3", "data": {
                        "id": "abc", "name": "t3_abc", "title": format!("{} post in {}", sort, subreddit),
                        "selftext": "body", "author": "someone", "subreddit": subreddit,
                        "permalink": "/r/x/comments/abc", "created_utc": 1700000000.0,
                        "ups": 42, "num_comments": 3, "stickied": false, "locked": false
                    }},
                    {"kind": "t3", "data": {
                        "id": "def", "name": "t3_def", "title": "Pinned",
                        "subreddit": subreddit, "created_utc": 1700000100.0,
                        "ups": 7, "stickied": true
                    }}
                ]
            }
        }))
        .into_response(),
    }
}

async fn submit(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = state.observe_api_call(&headers) {
        return rejection;
    }
    let rejected = form.get("title").map(String::as_str) == Some("reject me");
    *state.last_form.lock().unwrap() = form;

    if rejected {
        return Json(json!({"json": {"errors": [["SUBREDDIT_NOTALLOWED", "you aren't allowed to post there.", "sr"]]}}))
            .into_response();
    }
    Json(json!({
        "json": {
            "errors": [],
            "data": {"id": "p1", "name": "t3_p1", "url": "https://www.reddit.com/r/test/comments/p1/"}
        }
    }))
    .into_response()
}

async fn comment(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = state.observe_api_call(&headers) {
        return rejection;
    }
    *state.last_form.lock().unwrap() = form;

    Json(json!({
        "json": {
            "errors": [],
            "data": {"things": [{"kind": "t1", "data": {"id": "c1", "name": "t1_c1", "body": "hi"}}]}
        }
    }))
    .into_response()
}
