//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [store]                  # database location
//! [embedding]              # embedding provider and throttling
//! [embedding.openai]       # OpenAI embedding settings
//! [generation]             # optional explanation generator
//! [search]                 # similarity thresholds
//! [graph]                  # influence weights, traversal defaults
//! [recommend]              # link recommendation
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Environment variable consulted before any configured OpenAI key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged. Use the `*_or_default` accessors to
/// read a section with defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoesisConfig {
    pub store: Option<StoreConfig>,
    pub embedding: Option<EmbeddingConfig>,
    pub generation: Option<GenerationConfig>,
    pub search: Option<SearchConfig>,
    pub graph: Option<GraphConfig>,
    pub recommend: Option<RecommendConfig>,
}

impl NoesisConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, not field by field.
    pub fn merge(&mut self, other: NoesisConfig) {
        if other.store.is_some() {
            self.store = other.store;
        }
        if other.embedding.is_some() {
            self.embedding = other.embedding;
        }
        if other.generation.is_some() {
            self.generation = other.generation;
        }
        if other.search.is_some() {
            self.search = other.search;
        }
        if other.graph.is_some() {
            self.graph = other.graph;
        }
        if other.recommend.is_some() {
            self.recommend = other.recommend;
        }
    }

    pub fn store_or_default(&self) -> StoreConfig {
        self.store.clone().unwrap_or_default()
    }

    pub fn embedding_or_default(&self) -> EmbeddingConfig {
        self.embedding.clone().unwrap_or_default()
    }

    pub fn generation_or_default(&self) -> GenerationConfig {
        self.generation.clone().unwrap_or_default()
    }

    pub fn search_or_default(&self) -> SearchConfig {
        self.search.unwrap_or_default()
    }

    pub fn graph_or_default(&self) -> GraphConfig {
        self.graph.unwrap_or_default()
    }

    pub fn recommend_or_default(&self) -> RecommendConfig {
        self.recommend.unwrap_or_default()
    }

    /// Check value ranges across all sections.
    pub fn validate(&self) -> crate::Result<()> {
        self.embedding_or_default().validate()?;
        self.generation_or_default().validate()?;
        self.search_or_default().validate()?;
        self.graph_or_default().validate()?;
        self.recommend_or_default().validate()?;
        Ok(())
    }

    /// Whether any section carries an API key in plain text.
    pub fn plaintext_api_key_sections(&self) -> Vec<&'static str> {
        let mut sections = Vec::new();
        if self
            .embedding
            .as_ref()
            .and_then(|e| e.openai.as_ref())
            .is_some_and(|o| o.api_key.is_some())
        {
            sections.push("embedding.openai");
        }
        if self
            .generation
            .as_ref()
            .is_some_and(|g| g.api_key.is_some())
        {
            sections.push("generation");
        }
        sections
    }
}

fn check_unit_interval(field: &str, value: f64) -> crate::Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid(
            field,
            format!("{} is outside [0, 1]", value),
        ));
    }
    Ok(())
}

fn check_positive(field: &str, value: usize) -> crate::Result<()> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Store Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Knowledge store location.
///
/// ```toml
/// [store]
/// database = "noesis.db"   # relative paths resolve from the data directory
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("noesis.db"),
        }
    }
}

impl StoreConfig {
    /// Absolute database path, resolving relative paths against `data_dir`.
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        if self.database.is_absolute() {
            self.database.clone()
        } else {
            data_dir.join(&self.database)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding provider configuration.
///
/// ```toml
/// [embedding]
/// provider = "openai"       # "openai" or "mock"
/// dimensions = 1536
/// batch_size = 100
/// chunk_pause_ms = 1000
///
/// [embedding.openai]
/// model = "text-embedding-3-small"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// Output embedding dimensions. Default depends on provider and model.
    pub dimensions: Option<usize>,
    /// Items per chunk of a bulk job.
    pub batch_size: usize,
    /// Pause between chunks of a bulk job.
    pub chunk_pause_ms: u64,
    /// Longest text sent to the provider, in characters.
    pub max_chars: usize,
    /// Retries per item of a bulk job. Interactive calls never retry.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
    pub openai: Option<EmbeddingOpenAiConfig>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAi,
            dimensions: None,
            batch_size: 100,
            chunk_pause_ms: 1000,
            max_chars: 6000,
            max_retries: 3,
            retry_backoff_ms: 500,
            timeout_secs: 60,
            openai: None,
        }
    }
}

impl EmbeddingConfig {
    /// Effective dimensions for the configured provider.
    pub fn effective_dimensions(&self) -> usize {
        if let Some(d) = self.dimensions {
            return d;
        }
        match self.provider {
            EmbeddingProvider::OpenAi => {
                let model = self.openai_or_default().model;
                if model == "text-embedding-3-large" {
                    3072
                } else {
                    1536
                }
            }
            EmbeddingProvider::Mock => 384,
        }
    }

    pub fn openai_or_default(&self) -> EmbeddingOpenAiConfig {
        self.openai.clone().unwrap_or_default()
    }

    fn validate(&self) -> crate::Result<()> {
        if let Some(d) = self.dimensions {
            check_positive("embedding.dimensions", d)?;
        }
        check_positive("embedding.batch_size", self.batch_size)?;
        check_positive("embedding.max_chars", self.max_chars)?;
        Ok(())
    }
}

/// Supported embedding providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI embeddings API.
    #[default]
    OpenAi,
    /// Deterministic offline embedder.
    Mock,
}

impl EmbeddingProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OpenAI embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingOpenAiConfig {
    /// Model name. Default: "text-embedding-3-small".
    pub model: String,
    /// Custom base URL (for proxies).
    pub base_url: Option<String>,
    /// API key (prefer the `OPENAI_API_KEY` env var).
    pub api_key: Option<String>,
}

impl Default for EmbeddingOpenAiConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

impl EmbeddingOpenAiConfig {
    /// Env var first, then the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref())
    }
}

fn resolve_api_key(configured: Option<&str>) -> Option<String> {
    std::env::var(OPENAI_API_KEY_ENV)
        .ok()
        .filter(|k| !k.is_empty())
        .or_else(|| configured.map(str::to_string))
}

// ─────────────────────────────────────────────────────────────────────────────
// Generation Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Text generation used to phrase recommendation explanations.
///
/// ```toml
/// [generation]
/// enabled = true
/// model = "gpt-4o-mini"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub enabled: bool,
    /// "openai" or "mock".
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            max_tokens: 256,
            temperature: 0.3,
            timeout_secs: 60,
        }
    }
}

impl GenerationConfig {
    /// Env var first, then the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref())
    }

    fn validate(&self) -> crate::Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::invalid(
                "generation.temperature",
                format!("{} is outside [0, 2]", self.temperature),
            ));
        }
        check_positive("generation.max_tokens", self.max_tokens as usize)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Search / Graph / Recommend Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Similarity thresholds.
///
/// ```toml
/// [search]
/// threshold = 0.3            # semantic_search
/// similar_threshold = 0.7    # node-to-node
/// lexical_threshold = 0.15   # keyword fallback
/// limit = 10
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub threshold: f64,
    pub similar_threshold: f64,
    pub lexical_threshold: f64,
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            similar_threshold: 0.7,
            lexical_threshold: 0.15,
            limit: 10,
        }
    }
}

impl SearchConfig {
    fn validate(&self) -> crate::Result<()> {
        check_unit_interval("search.threshold", self.threshold)?;
        check_unit_interval("search.similar_threshold", self.similar_threshold)?;
        check_unit_interval("search.lexical_threshold", self.lexical_threshold)?;
        check_positive("search.limit", self.limit)
    }
}

/// Graph analysis settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Weight of each backlink in the influence score.
    pub inbound_weight: f64,
    /// Weight of each outlink in the influence score.
    pub outbound_weight: f64,
    pub neighborhood_depth: usize,
    pub min_cluster_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            inbound_weight: 2.0,
            outbound_weight: 1.0,
            neighborhood_depth: 2,
            min_cluster_size: 2,
        }
    }
}

impl GraphConfig {
    fn validate(&self) -> crate::Result<()> {
        for (field, value) in [
            ("graph.inbound_weight", self.inbound_weight),
            ("graph.outbound_weight", self.outbound_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field, "must be a non-negative number"));
            }
        }
        Ok(())
    }
}

/// Relationship recommendation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    pub similarity_threshold: f64,
    pub max_suggestions: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            max_suggestions: 5,
        }
    }
}

impl RecommendConfig {
    fn validate(&self) -> crate::Result<()> {
        check_unit_interval("recommend.similarity_threshold", self.similarity_threshold)?;
        check_positive("recommend.max_suggestions", self.max_suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = NoesisConfig::from_toml("").unwrap();
        assert_eq!(config, NoesisConfig::new());
        assert_eq!(config.search_or_default().threshold, 0.3);
        assert_eq!(config.search_or_default().similar_threshold, 0.7);
        assert_eq!(config.graph_or_default().inbound_weight, 2.0);
        assert_eq!(config.recommend_or_default().max_suggestions, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = NoesisConfig::from_toml(
            r#"
[store]
database = "/var/lib/noesis/kb.db"

[embedding]
provider = "mock"
dimensions = 64
batch_size = 10

[embedding.openai]
model = "text-embedding-3-large"

[generation]
enabled = true
model = "gpt-4o"

[search]
threshold = 0.4

[graph]
inbound_weight = 3.0

[recommend]
max_suggestions = 3
"#,
        )
        .unwrap();

        let embedding = config.embedding_or_default();
        assert_eq!(embedding.provider, EmbeddingProvider::Mock);
        assert_eq!(embedding.effective_dimensions(), 64);
        assert_eq!(embedding.batch_size, 10);
        assert_eq!(embedding.chunk_pause_ms, 1000);
        assert_eq!(embedding.openai_or_default().model, "text-embedding-3-large");

        assert!(config.generation_or_default().enabled);
        assert_eq!(config.search_or_default().threshold, 0.4);
        assert_eq!(config.search_or_default().limit, 10);
        assert_eq!(config.graph_or_default().inbound_weight, 3.0);
        assert_eq!(config.graph_or_default().outbound_weight, 1.0);
        assert_eq!(config.recommend_or_default().max_suggestions, 3);
        assert_eq!(
            config.store_or_default().database_path(Path::new("/data")),
            PathBuf::from("/var/lib/noesis/kb.db")
        );
    }

    #[test]
    fn test_effective_dimensions() {
        let mut embedding = EmbeddingConfig::default();
        assert_eq!(embedding.effective_dimensions(), 1536);

        embedding.openai = Some(EmbeddingOpenAiConfig {
            model: "text-embedding-3-large".to_string(),
            ..Default::default()
        });
        assert_eq!(embedding.effective_dimensions(), 3072);

        embedding.provider = EmbeddingProvider::Mock;
        assert_eq!(embedding.effective_dimensions(), 384);
    }

    #[test]
    fn test_relative_database_resolves_from_data_dir() {
        let store = StoreConfig::default();
        assert_eq!(
            store.database_path(Path::new("/data/noesis")),
            PathBuf::from("/data/noesis/noesis.db")
        );
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = NoesisConfig::from_toml("[search]\nthreshold = 0.2\n[graph]\nmin_cluster_size = 3").unwrap();
        let overlay = NoesisConfig::from_toml("[search]\nlimit = 50").unwrap();
        base.merge(overlay);

        let search = base.search_or_default();
        assert_eq!(search.limit, 50);
        assert_eq!(search.threshold, 0.3);
        assert_eq!(base.graph_or_default().min_cluster_size, 3);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let bad = [
            "[search]\nthreshold = 1.5",
            "[recommend]\nsimilarity_threshold = -0.1",
            "[embedding]\nbatch_size = 0",
            "[embedding]\ndimensions = 0",
            "[graph]\noutbound_weight = -1.0",
            "[generation]\ntemperature = 3.0",
        ];
        for toml in bad {
            let config = NoesisConfig::from_toml(toml).unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid { .. })),
                "accepted: {}",
                toml
            );
        }
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut config = NoesisConfig::new();
        config.search = Some(SearchConfig {
            threshold: 0.25,
            ..Default::default()
        });
        let text = config.to_toml().unwrap();
        assert!(text.contains("[search]"));
        assert_eq!(NoesisConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_plaintext_key_sections() {
        let config = NoesisConfig::from_toml(
            "[embedding.openai]\napi_key = \"sk-1\"\n[generation]\napi_key = \"sk-2\"",
        )
        .unwrap();
        assert_eq!(
            config.plaintext_api_key_sections(),
            ["embedding.openai", "generation"]
        );
    }

    #[test]
    fn test_unknown_provider_is_a_parse_error() {
        let err = NoesisConfig::from_toml("[embedding]\nprovider = \"local\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
