use async_trait::async_trait;
use redscribe_core::config::{GenerationSettings, ENV_GENERATION_API_KEY};
use redscribe_core::{ConfigError, CoreError, LlmError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// A text generation backend. One prompt in, one reply out, no retries.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, CoreError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions provider for OpenRouter and compatible endpoints.
pub struct OpenRouterProvider {
    http: Client,
    api_key: String,
    settings: GenerationSettings,
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("endpoint", &self.settings.endpoint)
            .field("model", &self.settings.model)
            .finish_non_exhaustive()
    }
}

impl OpenRouterProvider {
    pub fn new(settings: GenerationSettings, api_key: impl Into<String>) -> Result<Self, CoreError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::ConfigurationMissing {
                field: ENV_GENERATION_API_KEY.to_string(),
            }
            .into());
        }

        let http = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            http,
            api_key,
            settings,
        })
    }

    fn timeout(&self) -> Duration {
        self.settings.timeout()
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn generate(&self, prompt: &str) -> Result<String, CoreError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        debug!(model = %self.settings.model, prompt_chars = prompt.len(), "Requesting generation");
        let response = self
            .http
            .post(&self.settings.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Title", &self.settings.app_title)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Timeout {
                        seconds: self.timeout().as_secs().max(1),
                    }
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), "Generation endpoint returned an error");
            return Err(LlmError::GenerationFailed {
                provider: self.name().to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body: ChatResponse = response.json().await.map_err(|_| LlmError::InvalidResponseFormat {
            provider: self.name().to_string(),
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::InvalidResponseFormat {
                provider: self.name().to_string(),
            }
            .into());
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_configuration_missing() {
        let result = OpenRouterProvider::new(GenerationSettings::default(), "  ");
        match result {
            Err(e) => {
                assert!(e.is_configuration_missing());
                assert!(e.to_string().contains("GENERATION_API_KEY"));
            }
            Ok(_) => panic!("Expected ConfigurationMissing"),
        }
    }

    #[test]
    fn test_request_envelope_shape() {
        let request = ChatRequest {
            model: "some/model",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            max_tokens: 800,
            temperature: 0.7,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "some/model");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hello");
        assert_eq!(value["max_tokens"], 800);
    }

    #[test]
    fn test_debug_hides_key() {
        let provider = OpenRouterProvider::new(GenerationSettings::default(), "sk-secret").unwrap();
        assert!(!format!("{:?}", provider).contains("sk-secret"));
    }
}
