use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use llm_interface::{ContentGenerator, LlmProvider, OpenRouterProvider};
use redscribe_core::config::GenerationSettings;
use redscribe_core::{CoreError, LlmError};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Seen {
    authorization: Option<String>,
    title: Option<String>,
    body: Option<Value>,
}

async fn start(reply: Response) -> (String, Arc<Mutex<Seen>>) {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let reply = Arc::new(Mutex::new(Some(reply)));

    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(
                |State((seen, reply)): State<(Arc<Mutex<Seen>>, Arc<Mutex<Option<Response>>>)>,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    {
                        let mut seen = seen.lock().unwrap();
                        seen.authorization = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        seen.title = headers
                            .get("x-title")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        seen.body = Some(body);
                    }
                    let canned = reply.lock().unwrap().take();
                    match canned {
                        Some(response) => response,
                        None => StatusCode::GONE.into_response(),
                    }
                },
            ),
        )
        .route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({"choices": []}))
            }),
        )
        .with_state((seen.clone(), reply));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), seen)
}

fn settings(base: &str, path: &str) -> GenerationSettings {
    GenerationSettings {
        endpoint: format!("{}{}", base, path),
        model: "test/model".to_string(),
        timeout_secs: 1,
        ..GenerationSettings::default()
    }
}

fn completion(content: &str) -> Response {
    Json(json!({
        "id": "gen-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
    .into_response()
}

#[tokio::test]
async fn test_generate_sends_chat_envelope() {
    let (base, seen) = start(completion("  TITLE: Hello\nCONTENT: World  ")).await;
    let provider =
        OpenRouterProvider::new(settings(&base, "/v1/chat/completions"), "sk-test").unwrap();

    let reply = provider.generate("Write something").await.unwrap();
    assert_eq!(reply, "TITLE: Hello\nCONTENT: World");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.authorization.as_deref(), Some("Bearer sk-test"));
    assert_eq!(seen.title.as_deref(), Some("Redscribe"));
    let body = seen.body.as_ref().unwrap();
    assert_eq!(body["model"], "test/model");
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "Write something");
    assert_eq!(body["max_tokens"], 800);
}

#[tokio::test]
async fn test_error_status_is_generation_failed() {
    let (base, _) = start((StatusCode::TOO_MANY_REQUESTS, "slow down").into_response()).await;
    let provider =
        OpenRouterProvider::new(settings(&base, "/v1/chat/completions"), "sk-test").unwrap();

    match provider.generate("prompt").await {
        Err(CoreError::Llm(LlmError::GenerationFailed { provider, status })) => {
            assert_eq!(provider, "openrouter");
            assert_eq!(status, 429);
        }
        other => panic!("Expected GenerationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_choices_is_invalid_format() {
    let (base, _) = start(Json(json!({"choices": []})).into_response()).await;
    let provider =
        OpenRouterProvider::new(settings(&base, "/v1/chat/completions"), "sk-test").unwrap();

    assert!(matches!(
        provider.generate("prompt").await,
        Err(CoreError::Llm(LlmError::InvalidResponseFormat { .. }))
    ));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let (base, _) = start(completion("unused")).await;
    let provider = OpenRouterProvider::new(settings(&base, "/slow"), "sk-test").unwrap();

    assert!(matches!(
        provider.generate("prompt").await,
        Err(CoreError::Timeout { seconds: 1 })
    ));
}

#[tokio::test]
async fn test_generator_over_http_falls_back_without_markers() {
    let (base, _) = start(completion("A reply with no structure at all.")).await;
    let provider =
        OpenRouterProvider::new(settings(&base, "/v1/chat/completions"), "sk-test").unwrap();
    let generator = ContentGenerator::new(Arc::new(provider));

    let post = generator
        .generate_post("rust", "error handling", "discussion")
        .await
        .unwrap();
    assert_eq!(post.title, "Interesting discussion about error handling");
    assert_eq!(post.body, "A reply with no structure at all.");
}
