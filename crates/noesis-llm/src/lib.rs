//! Provider clients for noesis.
//!
//! The knowledge engine depends on two external services, both reached
//! through traits defined here:
//!
//! ```text
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │  Embedder                    │      │  TextGenerator               │
//! │  - embed() -> Vec<f32>       │      │  - generate() -> String      │
//! │  - embed_batch()             │      │                              │
//! └──────────────────────────────┘      └──────────────────────────────┘
//!        │              │                      │              │
//!        ▼              ▼                      ▼              ▼
//!   ┌────────┐    ┌──────────┐            ┌────────┐    ┌──────────┐
//!   │ OpenAI │    │   Mock   │            │ OpenAI │    │   Mock   │
//!   └────────┘    └──────────┘            └────────┘    └──────────┘
//! ```
//!
//! Text bound for a provider is sanitized and truncated by [`prepare_text`]
//! first. Providers report failures as-is; callers that want retries (the
//! bulk embedding job) wrap calls in [`with_retry`].

pub mod embeddings;
pub mod error;
pub mod generate;
pub mod retry;
pub mod text;

pub use embeddings::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_PAUSE, Embedder, EmbedderSpec, MockEmbedder,
    OpenAiEmbedder, OpenAiEmbedderConfig, SharedEmbedder, build_embedder, embed_with_cancel,
};
pub use error::{LlmError, RateLimitInfo, Result, is_retryable};
pub use generate::{
    GenerationRequest, GeneratorSpec, MockGenerator, OpenAiGenerator, OpenAiGeneratorConfig,
    SharedGenerator, TextGenerator, build_generator,
};
pub use retry::{RetryPolicy, with_retry};
pub use text::{DEFAULT_MAX_CHARS, TRUNCATION_MARKER, prepare_text, strip_html};
