//! The noesis knowledge engine.
//!
//! [`KnowledgeEngine`] ties a [`noesis_store::KnowledgeStore`] to an
//! [`noesis_llm::Embedder`] and exposes the operations callers use:
//!
//! - semantic search and "find similar", with a keyword fallback for nodes
//!   that have no embedding yet
//! - graph analysis: influence, neighborhoods, clusters, bridge nodes
//! - relationship recommendation and acceptance
//! - throttled, cancellable bulk embedding
//!
//! Every operation reads current state from the store; nothing is cached
//! between calls.

pub mod analysis;
pub mod bulk;
pub mod config;
pub mod engine;
pub mod error;
pub mod infer;
pub mod lexical;
pub mod recommend;
pub mod similarity;

pub use analysis::{BridgeNode, Cluster, GraphSnapshot, Influence, NeighborhoodEntry};
pub use bulk::{BulkOptions, BulkProgress, BulkReport, ProgressFn};
pub use config::{
    BulkSettings, EngineConfig, GraphSettings, InfluenceWeights, RecommendSettings,
    SearchSettings,
};
pub use engine::KnowledgeEngine;
pub use error::{GraphError, Result};
pub use infer::{INFERENCE_RULES, InferenceRule, infer_relationship_type};
pub use lexical::{extract_keywords, jaccard_similarity};
pub use recommend::{RecommendOptions, Suggestion};
pub use similarity::{
    RankedResult, SearchOptions, SimilarOptions, SimilarityMethod, cosine_similarity,
};
