//! Embedding providers.
//!
//! This module provides the [`Embedder`] trait and the implementations the
//! engine can be configured with:
//!
//! - [`OpenAiEmbedder`]: the OpenAI-compatible `/embeddings` API, chunked and
//!   throttled for bulk use
//! - [`MockEmbedder`]: deterministic vectors for tests and offline use

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::error::{LlmError, Result};
use crate::text::{DEFAULT_MAX_CHARS, prepare_text};

/// Items per provider request.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Pause inserted between consecutive provider requests of one batch.
pub const DEFAULT_CHUNK_PAUSE: Duration = Duration::from_secs(1);

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for generating text embeddings.
///
/// Vectors come back in input order and always have [`Embedder::dimensions`]
/// elements.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, preserving order.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimensionality of the vectors this embedder produces.
    fn dimensions(&self) -> usize;

    /// Provider name, used in logs and recorded alongside stored vectors.
    fn name(&self) -> &str;
}

/// A shared embedder that can be used across tasks.
pub type SharedEmbedder = Arc<dyn Embedder>;

/// Embed `text`, giving up early if `cancel` fires first.
pub async fn embed_with_cancel(
    embedder: &dyn Embedder,
    text: &str,
    cancel: &CancellationToken,
) -> Result<Vec<f32>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LlmError::Cancelled),
        result = embedder.embed(text) => result,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// A deterministic embedder for tests and offline use.
///
/// Each lowercase word seeds a pseudo-random vector and the text's embedding
/// is their normalized sum, so texts sharing words land close together.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase);

        for word in words {
            let mut state = simple_hash(&word);
            for value in embedding.iter_mut() {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                *value += ((state >> 16) & 0xffff) as f32 / 32768.0 - 1.0;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn simple_hash(s: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    hash
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for OpenAI embeddings.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Model to use for embeddings.
    pub model: String,
    /// Requested output dimensions. Sent to the provider when set.
    pub dimensions: Option<usize>,
    /// Request timeout.
    pub timeout: Duration,
    /// Inputs per request.
    pub batch_size: usize,
    /// Pause between consecutive requests.
    pub chunk_pause: Duration,
    /// Character budget per input.
    pub max_chars: usize,
}

impl OpenAiEmbedderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: None,
            timeout: Duration::from_secs(60),
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_pause: DEFAULT_CHUNK_PAUSE,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    /// Create config from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LlmError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the chunk size. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_chunk_pause(mut self, pause: Duration) -> Self {
        self.chunk_pause = pause;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

/// Native output size of the known OpenAI embedding models.
fn model_dimensions(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
        _ => 1536,
    }
}

/// OpenAI embeddings API client.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbedderConfig,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("OpenAI API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let dimensions = config
            .dimensions
            .unwrap_or_else(|| model_dimensions(&config.model));

        Ok(Self {
            client,
            config,
            dimensions,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiEmbedderConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAiEmbedderConfig {
        &self.config
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.config.base_url)
    }

    /// Send one chunk. Inputs are already prepared.
    async fn request_chunk(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input,
            dimensions: self.config.dimensions,
        };

        let response = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::from_response(response).await);
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(format!("Failed to parse response: {}", e)))?;

        if let Some(usage) = &result.usage {
            tracing::debug!(
                model = %self.config.model,
                inputs = input.len(),
                total_tokens = usage.total_tokens,
                "Embedding request complete"
            );
        }

        if result.data.len() != input.len() {
            return Err(LlmError::Backend(format!(
                "Provider returned {} embeddings for {} inputs",
                result.data.len(),
                input.len()
            )));
        }

        let mut data = result.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Internal("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let prepared: Vec<String> = texts
            .iter()
            .map(|t| prepare_text(t, self.config.max_chars))
            .collect();

        let mut results = Vec::with_capacity(prepared.len());
        for (i, chunk) in prepared.chunks(self.config.batch_size).enumerate() {
            if i > 0 && !self.config.chunk_pause.is_zero() {
                tokio::time::sleep(self.config.chunk_pause).await;
            }
            let vectors = self.request_chunk(chunk).await?;
            results.extend(vectors);
        }

        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, serde::Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingUsage {
    total_tokens: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Provider-agnostic description of an embedder.
///
/// The binary fills this from its configuration so that this crate does not
/// depend on `noesis-config`.
#[derive(Debug, Clone)]
pub struct EmbedderSpec {
    /// Provider name: "openai" or "mock".
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    /// Deployment-wide vector size.
    pub dimensions: Option<usize>,
    pub batch_size: usize,
    pub chunk_pause: Duration,
    pub max_chars: usize,
    pub timeout: Duration,
}

impl Default for EmbedderSpec {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            openai_api_key: None,
            openai_model: None,
            openai_base_url: None,
            dimensions: None,
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_pause: DEFAULT_CHUNK_PAUSE,
            max_chars: DEFAULT_MAX_CHARS,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Build a [`SharedEmbedder`] from a spec.
pub fn build_embedder(spec: &EmbedderSpec) -> Result<SharedEmbedder> {
    match spec.provider.as_str() {
        "openai" => {
            let api_key = spec.openai_api_key.as_deref().ok_or_else(|| {
                LlmError::Config(
                    "OpenAI embedding provider requires an API key. \
                     Set OPENAI_API_KEY or configure [embedding.openai] api_key."
                        .to_string(),
                )
            })?;
            let mut config = OpenAiEmbedderConfig::new(api_key)
                .with_timeout(spec.timeout)
                .with_batch_size(spec.batch_size)
                .with_chunk_pause(spec.chunk_pause)
                .with_max_chars(spec.max_chars);
            if let Some(ref model) = spec.openai_model {
                config = config.with_model(model);
            }
            if let Some(ref base_url) = spec.openai_base_url {
                config = config.with_base_url(base_url);
            }
            if let Some(dims) = spec.dimensions {
                config = config.with_dimensions(dims);
            }
            Ok(Arc::new(OpenAiEmbedder::new(config)?))
        }
        "mock" => Ok(Arc::new(MockEmbedder::new(spec.dimensions.unwrap_or(384)))),
        other => Err(LlmError::Config(format!(
            "Unknown embedding provider '{}'. Valid: openai, mock",
            other
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_mock_embedder() {
        let embedder = MockEmbedder::default();
        assert_eq!(embedder.dimensions(), 384);
        assert_eq!(embedder.name(), "mock");

        let embedding = embedder.embed("hello world").await.unwrap();
        assert_eq!(embedding.len(), 384);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_mock_embedder_deterministic() {
        let embedder = MockEmbedder::new(64);
        let e1 = embedder.embed("test text").await.unwrap();
        let e2 = embedder.embed("test text").await.unwrap();
        assert_eq!(e1, e2);
    }

    #[tokio::test]
    async fn test_mock_embedder_shared_words_are_closer() {
        let embedder = MockEmbedder::new(256);
        let a = embedder.embed("rust ownership borrowing").await.unwrap();
        let b = embedder.embed("rust ownership lifetimes").await.unwrap();
        let c = embedder.embed("banana smoothie recipe").await.unwrap();

        assert_ne!(a, b);
        assert!(dot(&a, &b) > dot(&a, &c));
    }

    #[tokio::test]
    async fn test_mock_embedder_empty_text_is_zero_vector() {
        let embedder = MockEmbedder::new(8);
        let e = embedder.embed("   ").await.unwrap();
        assert!(e.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let embedder = MockEmbedder::new(16);
        let texts = ["one", "two", "three"];
        let batch = embedder.embed_batch(&texts).await.unwrap();

        assert_eq!(batch.len(), 3);
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(vector, &embedder.embed(text).await.unwrap());
        }
    }

    struct StallingEmbedder;

    #[async_trait]
    impl Embedder for StallingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            std::future::pending().await
        }

        fn dimensions(&self) -> usize {
            1
        }

        fn name(&self) -> &str {
            "stalling"
        }
    }

    #[tokio::test]
    async fn test_embed_with_cancel_aborts_stalled_call() {
        let token = CancellationToken::new();
        token.cancel();
        let err = embed_with_cancel(&StallingEmbedder, "x", &token)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
    }

    #[tokio::test]
    async fn test_embed_with_cancel_passes_result_through() {
        let token = CancellationToken::new();
        let v = embed_with_cancel(&MockEmbedder::new(4), "hi", &token)
            .await
            .unwrap();
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn test_openai_embedder_config_builder() {
        let config = OpenAiEmbedderConfig::new("key")
            .with_base_url("http://custom.api/")
            .with_model("text-embedding-ada-002")
            .with_batch_size(0);

        assert_eq!(config.api_key, "key");
        assert_eq!(config.base_url, "http://custom.api");
        assert_eq!(config.model, "text-embedding-ada-002");
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_chars, DEFAULT_MAX_CHARS);
    }

    #[test]
    fn test_openai_dimensions_from_model_or_override() {
        let large =
            OpenAiEmbedder::new(OpenAiEmbedderConfig::new("k").with_model("text-embedding-3-large"))
                .unwrap();
        assert_eq!(large.dimensions(), 3072);

        let small = OpenAiEmbedder::new(OpenAiEmbedderConfig::new("k").with_dimensions(256))
            .unwrap();
        assert_eq!(small.dimensions(), 256);
    }

    #[test]
    fn test_openai_rejects_empty_key() {
        assert!(matches!(
            OpenAiEmbedder::new(OpenAiEmbedderConfig::new("  ")),
            Err(LlmError::Config(_))
        ));
    }

    fn test_embedder(server: &MockServer, batch_size: usize) -> OpenAiEmbedder {
        let config = OpenAiEmbedderConfig::new("test-key")
            .with_base_url(server.uri())
            .with_dimensions(2)
            .with_batch_size(batch_size)
            .with_chunk_pause(Duration::ZERO);
        OpenAiEmbedder::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_openai_sorts_by_index_and_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ],
                "usage": {"total_tokens": 4}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let embedder = test_embedder(&server, 2);
        let vectors = embedder
            .embed_batch(&["a", "b", "c", "d"])
            .await
            .unwrap();

        assert_eq!(vectors.len(), 4);
        assert_eq!(vectors[0], vec![1.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
        assert_eq!(vectors[2], vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_openai_maps_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .mount(&server)
            .await;

        let err = test_embedder(&server, 10).embed("x").await.unwrap_err();
        match err {
            LlmError::Auth(msg) => assert!(msg.contains("Incorrect API key")),
            other => panic!("expected auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_openai_maps_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "2")
                    .set_body_json(serde_json::json!({"error": {"message": "slow down"}})),
            )
            .mount(&server)
            .await;

        let err = test_embedder(&server, 10).embed("x").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_openai_surfaces_errors_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({"error": {"message": "slow down"}})),
            )
            .mount(&server)
            .await;

        let embedder = build_embedder(&EmbedderSpec {
            provider: "openai".to_string(),
            openai_api_key: Some("test-key".to_string()),
            openai_base_url: Some(server.uri()),
            dimensions: Some(2),
            chunk_pause: Duration::ZERO,
            ..Default::default()
        })
        .unwrap();

        let err = embedder.embed("x").await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimit(_)));
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_openai_rejects_short_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [1.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        let err = test_embedder(&server, 10)
            .embed_batch(&["a", "b"])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Backend(_)));
    }

    #[test]
    fn test_build_embedder() {
        let mock = build_embedder(&EmbedderSpec {
            dimensions: Some(32),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(mock.name(), "mock");
        assert_eq!(mock.dimensions(), 32);

        let missing_key = build_embedder(&EmbedderSpec {
            provider: "openai".to_string(),
            ..Default::default()
        });
        assert!(matches!(missing_key, Err(LlmError::Config(_))));

        let unknown = build_embedder(&EmbedderSpec {
            provider: "local".to_string(),
            ..Default::default()
        });
        assert!(matches!(unknown, Err(LlmError::Config(_))));
    }
}
