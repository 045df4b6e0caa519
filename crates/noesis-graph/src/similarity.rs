//! Vector similarity and ranked retrieval.

use std::cmp::Ordering;

use noesis_types::{KnowledgeNode, NodeType};
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// How a result's similarity was computed.
///
/// Lexical scores are keyword-set overlaps, not cosine similarities, and are
/// not directly comparable with embedding scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMethod {
    Embedding,
    Lexical,
}

impl SimilarityMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMethod::Embedding => "embedding",
            SimilarityMethod::Lexical => "lexical",
        }
    }
}

/// A node paired with its similarity to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub node: KnowledgeNode,
    pub similarity: f64,
    pub method: SimilarityMethod,
}

/// Options for `semantic_search`. Unset fields take the engine defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
    /// Keep nodes of any of these types.
    pub node_types: Vec<NodeType>,
    /// Keep nodes carrying all of these tags.
    pub tags: Vec<String>,
    pub owner: Option<String>,
    /// Match on keywords instead of failing when the embedder is unavailable.
    pub lexical_fallback: bool,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = NodeType>) -> Self {
        self.node_types.extend(types);
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_lexical_fallback(mut self) -> Self {
        self.lexical_fallback = true;
        self
    }
}

/// Options for `find_similar`. Unset fields take the engine defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarOptions {
    /// `None` returns every match above the threshold.
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
    pub exclude_self: bool,
}

impl Default for SimilarOptions {
    fn default() -> Self {
        Self {
            limit: None,
            threshold: None,
            exclude_self: true,
        }
    }
}

impl SimilarOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn including_self(mut self) -> Self {
        self.exclude_self = false;
        self
    }
}

/// Cosine similarity of two equal-length vectors.
///
/// Accumulates in `f64`, so the result is exactly symmetric and a non-zero
/// vector compared with itself scores exactly `1.0`. Returns `0.0` when
/// either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(GraphError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0))
}

/// Sort by similarity descending, then most recently updated, then id.
pub(crate) fn compare_ranked(a: &RankedResult, b: &RankedResult) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| b.node.updated_at.cmp(&a.node.updated_at))
        .then_with(|| a.node.id.cmp(&b.node.id))
}

/// Apply the threshold, order, and truncate.
///
/// A threshold of zero or below disables filtering.
pub(crate) fn rank(
    mut results: Vec<RankedResult>,
    threshold: f64,
    limit: Option<usize>,
) -> Vec<RankedResult> {
    if threshold > 0.0 {
        results.retain(|r| r.similarity >= threshold);
    }
    results.sort_by(compare_ranked);
    if let Some(limit) = limit {
        results.truncate(limit);
    }
    results
}
