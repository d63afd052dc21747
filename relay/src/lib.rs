//! Token-forwarding HTTP relay for browser clients.
//!
//! Each route takes the caller's bearer token and replays the request
//! against the Reddit OAuth API, handing back the upstream status and body
//! untouched. CORS is wide open so a page on any origin can call it.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use redscribe_core::config::RelaySettings;
use redscribe_core::CoreError;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

const DEFAULT_CONTENT_TYPE: &str = "application/json";

struct RelayState {
    http: reqwest::Client,
    settings: RelaySettings,
}

/// Outbound request body with its content type.
struct Payload {
    content_type: Option<String>,
    body: Bytes,
}

pub fn create_router(settings: RelaySettings) -> Result<Router, CoreError> {
    let http = reqwest::Client::builder()
        .timeout(settings.request_timeout())
        .build()?;
    let state = Arc::new(RelayState { http, settings });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Ok(Router::new()
        .route("/api/me", get(me))
        .route("/api/submit", post(submit))
        .route("/api/comment", post(comment))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

async fn me(State(state): State<Arc<RelayState>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return missing_token();
    };
    forward(&state, reqwest::Method::GET, "/api/v1/me", token, None).await
}

async fn submit(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return missing_token();
    };
    let payload = payload(&headers, body);
    forward(&state, reqwest::Method::POST, "/api/submit", token, Some(payload)).await
}

async fn comment(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return missing_token();
    };
    let payload = payload(&headers, body);
    forward(&state, reqwest::Method::POST, "/api/comment", token, Some(payload)).await
}

/// The credential after the scheme in `Authorization`, if non-empty.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .split_whitespace()
        .nth(1)
        .filter(|token| !token.is_empty())
}

fn payload(headers: &HeaderMap, body: Bytes) -> Payload {
    Payload {
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    }
}

fn missing_token() -> Response {
    debug!("Rejecting relay request without a token");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Missing token" })),
    )
        .into_response()
}

fn relay_failure(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

async fn forward(
    state: &RelayState,
    method: reqwest::Method,
    path: &str,
    token: &str,
    payload: Option<Payload>,
) -> Response {
    let url = format!("{}{}", state.settings.upstream.trim_end_matches('/'), path);
    let mut request = state
        .http
        .request(method, &url)
        .bearer_auth(token)
        .header(reqwest::header::USER_AGENT, &state.settings.user_agent);
    if let Some(payload) = payload {
        if let Some(content_type) = payload.content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        request = request.body(payload.body.to_vec());
    }

    let upstream = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(path, error = %e, "Upstream request failed");
            return relay_failure(e.to_string());
        }
    };

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or(HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(e) => {
            warn!(path, error = %e, "Failed to read upstream body");
            return relay_failure(e.to_string());
        }
    };

    debug!(path, status = status.as_u16(), "Relayed upstream response");
    (status, [(header::CONTENT_TYPE, content_type)], body.to_vec()).into_response()
}
