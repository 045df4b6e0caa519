//! Tunable engine parameters.
//!
//! Mirrors the `[search]`, `[graph]`, `[recommend]` and `[embedding]`
//! configuration sections without depending on `noesis-config`.

use std::time::Duration;

use noesis_llm::{DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_PAUSE, RetryPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub search: SearchSettings,
    pub graph: GraphSettings,
    pub recommend: RecommendSettings,
    pub bulk: BulkSettings,
}

/// Similarity thresholds and result limits.
///
/// Corpus search is deliberately more permissive than node-to-node
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Minimum similarity for `semantic_search`.
    pub threshold: f64,
    /// Minimum similarity for `find_similar`.
    pub similar_threshold: f64,
    /// Minimum keyword overlap when falling back to lexical matching.
    pub lexical_threshold: f64,
    /// Default result count.
    pub limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            similar_threshold: 0.7,
            lexical_threshold: 0.15,
            limit: 10,
        }
    }
}

/// Influence score coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfluenceWeights {
    pub inbound: f64,
    pub outbound: f64,
}

impl Default for InfluenceWeights {
    fn default() -> Self {
        Self {
            inbound: 2.0,
            outbound: 1.0,
        }
    }
}

impl InfluenceWeights {
    pub fn score(&self, inbound: usize, outbound: usize) -> f64 {
        self.inbound * inbound as f64 + self.outbound * outbound as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphSettings {
    pub influence: InfluenceWeights,
    pub neighborhood_depth: usize,
    pub min_cluster_size: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            influence: InfluenceWeights::default(),
            neighborhood_depth: 2,
            min_cluster_size: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendSettings {
    pub similarity_threshold: f64,
    pub max_suggestions: usize,
    /// Ask the attached generator to phrase explanations.
    pub use_generator: bool,
    pub generator_model: Option<String>,
    pub generator_max_tokens: u32,
    pub generator_temperature: f32,
}

impl Default for RecommendSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            max_suggestions: 5,
            use_generator: false,
            generator_model: None,
            generator_max_tokens: 256,
            generator_temperature: 0.3,
        }
    }
}

/// Throttling for bulk embedding jobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulkSettings {
    pub batch_size: usize,
    pub chunk_pause: Duration,
    pub retry: RetryPolicy,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_pause: DEFAULT_CHUNK_PAUSE,
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.search.threshold, 0.3);
        assert_eq!(config.search.similar_threshold, 0.7);
        assert_eq!(config.recommend.similarity_threshold, 0.6);
        assert_eq!(config.recommend.max_suggestions, 5);
        assert_eq!(config.bulk.batch_size, 100);
        assert_eq!(config.bulk.chunk_pause, Duration::from_secs(1));
    }

    #[test]
    fn test_influence_favors_inbound() {
        let weights = InfluenceWeights::default();
        assert_eq!(weights.score(0, 0), 0.0);
        assert_eq!(weights.score(3, 1), 7.0);
        assert!(weights.score(1, 0) > weights.score(0, 1));
    }
}
