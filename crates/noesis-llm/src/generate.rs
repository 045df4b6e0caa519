//! Free-text generation.
//!
//! The engine only uses generation to phrase relationship explanations, so
//! the contract is deliberately narrow: a prompt goes in and a string comes
//! out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};
use crate::retry::{RetryPolicy, with_retry};

/// A single generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    /// Overrides the generator's configured model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_message: None,
            model: None,
            max_tokens: 256,
            temperature: 0.3,
        }
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// String-in, string-out text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String>;

    fn name(&self) -> &str;
}

pub type SharedGenerator = Arc<dyn TextGenerator>;

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Generator
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiGeneratorConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl OpenAiGeneratorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Generator backed by `/chat/completions`.
pub struct OpenAiGenerator {
    client: Client,
    config: OpenAiGeneratorConfig,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiGeneratorConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("OpenAI API key is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::from_response(response).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| LlmError::Backend("Response contained no text".to_string()))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system_message {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: request.model.as_deref().unwrap_or(&self.config.model),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        with_retry(self.config.retry, self.name(), || self.send(&body)).await
    }

    fn name(&self) -> &str {
        "openai"
    }
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
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Generator
// ─────────────────────────────────────────────────────────────────────────────

/// Generator returning a canned reply and recording every request.
#[derive(Debug, Default)]
pub struct MockGenerator {
    reply: Option<String>,
    fail: bool,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    /// Echo the prompt back.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::default()
        }
    }

    /// Always fail with a backend error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let reply = self.reply.clone().unwrap_or_else(|| request.prompt.clone());
        self.requests.lock().push(request);
        if self.fail {
            return Err(LlmError::Backend("mock generator failure".to_string()));
        }
        Ok(reply)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generator Factory
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GeneratorSpec {
    /// Provider name: "openai" or "mock".
    pub provider: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for GeneratorSpec {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: None,
            model: None,
            base_url: None,
            timeout: Duration::from_secs(60),
        }
    }
}

pub fn build_generator(spec: &GeneratorSpec) -> Result<SharedGenerator> {
    match spec.provider.as_str() {
        "openai" => {
            let api_key = spec.api_key.as_deref().ok_or_else(|| {
                LlmError::Config(
                    "OpenAI generation provider requires an API key. \
                     Set OPENAI_API_KEY or configure [generation] api_key."
                        .to_string(),
                )
            })?;
            let mut config = OpenAiGeneratorConfig::new(api_key).with_timeout(spec.timeout);
            if let Some(ref model) = spec.model {
                config = config.with_model(model);
            }
            if let Some(ref base_url) = spec.base_url {
                config = config.with_base_url(base_url);
            }
            Ok(Arc::new(OpenAiGenerator::new(config)?))
        }
        "mock" => Ok(Arc::new(MockGenerator::new())),
        other => Err(LlmError::Config(format!(
            "Unknown generation provider '{}'. Valid: openai, mock",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_mock_generator_records_requests() {
        let generator = MockGenerator::with_reply("because reasons");
        let out = generator
            .generate(GenerationRequest::new("why?").with_max_tokens(10))
            .await
            .unwrap();

        assert_eq!(out, "because reasons");
        let seen = generator.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prompt, "why?");
        assert_eq!(seen[0].max_tokens, 10);
    }

    #[tokio::test]
    async fn test_mock_generator_echo_and_failure() {
        assert_eq!(
            MockGenerator::new()
                .generate(GenerationRequest::new("echo"))
                .await
                .unwrap(),
            "echo"
        );
        assert!(
            MockGenerator::failing()
                .generate(GenerationRequest::new("x"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_openai_generator_sends_chat_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-test",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "explain"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  It follows.  "}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new(
            OpenAiGeneratorConfig::new("k")
                .with_base_url(server.uri())
                .with_model("gpt-test"),
        )
        .unwrap();

        let text = generator
            .generate(GenerationRequest::new("explain").with_system_message("be brief"))
            .await
            .unwrap();
        assert_eq!(text, "It follows.");
    }

    #[tokio::test]
    async fn test_openai_generator_maps_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let generator =
            OpenAiGenerator::new(OpenAiGeneratorConfig::new("k").with_base_url(server.uri()))
                .unwrap();
        let err = generator
            .generate(GenerationRequest::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Backend(_)));
    }

    #[test]
    fn test_build_generator() {
        let mock = build_generator(&GeneratorSpec {
            provider: "mock".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(mock.name(), "mock");

        assert!(matches!(
            build_generator(&GeneratorSpec::default()),
            Err(LlmError::Config(_))
        ));
    }
}
