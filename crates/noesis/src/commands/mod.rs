//! CLI command handlers.

pub mod config;
pub mod embed;
pub mod graph;
pub mod link;
pub mod node;
pub mod recommend;
pub mod search;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use console::Style;
use noesis_config::{EmbeddingProvider, LoadedConfig, NoesisConfig};
use noesis_graph::{
    BulkSettings, EngineConfig, GraphSettings, InfluenceWeights, KnowledgeEngine,
    RecommendSettings, SearchSettings,
};
use noesis_llm::{EmbedderSpec, GeneratorSpec, RetryPolicy, build_embedder, build_generator};
use noesis_store::{SharedStore, SqliteStore};
use serde::Serialize;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Merged configuration and where it came from.
    pub loaded: LoadedConfig,
    /// Config directory override from the command line.
    pub config_dir: Option<PathBuf>,
    /// Resolved database path.
    pub database: PathBuf,
}

impl Context {
    /// Load configuration and resolve the database path.
    pub fn load(
        json_output: bool,
        verbose: bool,
        database: Option<PathBuf>,
        config_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let loaded = noesis_config::load_config_with_options(None, config_dir.as_deref())
            .context("Failed to load configuration")?;

        if !json_output {
            let yellow = Style::new().yellow();
            for warning in &loaded.warnings {
                eprintln!("{} {}", yellow.apply_to("Warning:"), warning);
            }
        }

        let database = match database {
            Some(path) => path,
            None => {
                let data_dir = noesis_config::data_dir()
                    .context("Could not determine a data directory; pass --database")?;
                loaded.config.store_or_default().database_path(&data_dir)
            }
        };

        Ok(Self {
            json_output,
            verbose,
            loaded,
            config_dir,
            database,
        })
    }

    pub fn config(&self) -> &NoesisConfig {
        &self.loaded.config
    }

    /// Open the knowledge store with the configured dimensions.
    pub fn open_store(&self) -> Result<SharedStore> {
        let dimensions = self.config().embedding_or_default().effective_dimensions();
        let store = SqliteStore::open(&self.database, dimensions)
            .with_context(|| format!("Failed to open {}", self.database.display()))?;
        Ok(Arc::new(store))
    }

    /// Build the engine: store, embedder and, when enabled, generator.
    pub fn engine(&self) -> Result<KnowledgeEngine> {
        let config = self.config();
        let store = self.open_store()?;
        let embedder = build_embedder(&embedder_spec(config))?;
        let mut engine = KnowledgeEngine::new(store, embedder, engine_config(config))?;

        let generation = config.generation_or_default();
        if generation.enabled {
            engine = engine.with_generator(build_generator(&generator_spec(config))?);
        }
        Ok(engine)
    }

    /// Print a value as pretty JSON.
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Map the `[search]`, `[graph]`, `[recommend]`, `[generation]` and
/// `[embedding]` sections onto engine settings.
pub fn engine_config(config: &NoesisConfig) -> EngineConfig {
    let search = config.search_or_default();
    let graph = config.graph_or_default();
    let recommend = config.recommend_or_default();
    let generation = config.generation_or_default();
    let embedding = config.embedding_or_default();

    EngineConfig {
        search: SearchSettings {
            threshold: search.threshold,
            similar_threshold: search.similar_threshold,
            lexical_threshold: search.lexical_threshold,
            limit: search.limit,
        },
        graph: GraphSettings {
            influence: InfluenceWeights {
                inbound: graph.inbound_weight,
                outbound: graph.outbound_weight,
            },
            neighborhood_depth: graph.neighborhood_depth,
            min_cluster_size: graph.min_cluster_size,
        },
        recommend: RecommendSettings {
            similarity_threshold: recommend.similarity_threshold,
            max_suggestions: recommend.max_suggestions,
            use_generator: generation.enabled,
            generator_model: Some(generation.model),
            generator_max_tokens: generation.max_tokens,
            generator_temperature: generation.temperature,
        },
        bulk: BulkSettings {
            batch_size: embedding.batch_size,
            chunk_pause: Duration::from_millis(embedding.chunk_pause_ms),
            retry: RetryPolicy::new(
                embedding.max_retries,
                Duration::from_millis(embedding.retry_backoff_ms),
            ),
        },
    }
}

pub fn embedder_spec(config: &NoesisConfig) -> EmbedderSpec {
    let embedding = config.embedding_or_default();
    let openai = embedding.openai_or_default();

    // The mock embedder has no model to infer a size from.
    let dimensions = match embedding.provider {
        EmbeddingProvider::Mock => Some(embedding.effective_dimensions()),
        EmbeddingProvider::OpenAi => embedding.dimensions,
    };

    EmbedderSpec {
        provider: embedding.provider.as_str().to_string(),
        openai_api_key: openai.resolve_api_key(),
        openai_model: Some(openai.model),
        openai_base_url: openai.base_url,
        dimensions,
        batch_size: embedding.batch_size,
        chunk_pause: Duration::from_millis(embedding.chunk_pause_ms),
        max_chars: embedding.max_chars,
        timeout: Duration::from_secs(embedding.timeout_secs),
    }
}

pub fn generator_spec(config: &NoesisConfig) -> GeneratorSpec {
    let generation = config.generation_or_default();
    GeneratorSpec {
        api_key: generation.resolve_api_key(),
        provider: generation.provider,
        model: Some(generation.model),
        base_url: generation.base_url,
        timeout: Duration::from_secs(generation.timeout_secs),
    }
}

/// Shorten `s` to `max_len` characters on one line.
pub fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ");
    if s.chars().count() <= max_len {
        s
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Print a bold heading with a rule under it.
pub fn heading(title: &str) {
    let dim = Style::new().dim();
    println!("{}", console::style(title).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("line one\nline two", 40), "line one line two");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate("ééééééééé", 5), "éé...");
    }

    #[test]
    fn test_engine_config_follows_sections() {
        let config = NoesisConfig::from_toml(
            "[search]\nthreshold = 0.45\n[graph]\ninbound_weight = 3.0\n[embedding]\nchunk_pause_ms = 0\n",
        )
        .unwrap();
        let engine = engine_config(&config);
        assert_eq!(engine.search.threshold, 0.45);
        assert_eq!(engine.search.similar_threshold, 0.7);
        assert_eq!(engine.graph.influence.inbound, 3.0);
        assert!(engine.bulk.chunk_pause.is_zero());
        assert!(!engine.recommend.use_generator);
    }

    #[test]
    fn test_mock_embedder_spec_carries_dimensions() {
        let config =
            NoesisConfig::from_toml("[embedding]\nprovider = \"mock\"\ndimensions = 32\n").unwrap();
        let spec = embedder_spec(&config);
        assert_eq!(spec.provider, "mock");
        assert_eq!(spec.dimensions, Some(32));
    }
}
