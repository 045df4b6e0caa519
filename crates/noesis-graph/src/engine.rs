//! The engine facade.

use std::collections::BTreeSet;

use noesis_llm::{SharedEmbedder, SharedGenerator, embed_with_cancel};
use noesis_store::{EmbeddingFilter, NodeFilter, SharedStore};
use noesis_types::{EdgeId, KnowledgeNode, NodeId, Relationship, RelationshipType};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::analysis::{BridgeNode, Cluster, GraphSnapshot, Influence, NeighborhoodEntry};
use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::lexical::{extract_keywords, jaccard_similarity, node_keywords};
use crate::similarity::{
    RankedResult, SearchOptions, SimilarOptions, SimilarityMethod, cosine_similarity, rank,
};

/// Semantic search, graph analysis and recommendation over one store.
///
/// The store is the only source of truth: every call reads fresh state and
/// nothing is cached between calls. No lock is held while waiting on the
/// embedding provider.
pub struct KnowledgeEngine {
    pub(crate) store: SharedStore,
    pub(crate) embedder: SharedEmbedder,
    pub(crate) generator: Option<SharedGenerator>,
    pub(crate) config: EngineConfig,
}

impl std::fmt::Debug for KnowledgeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeEngine")
            .field("embedder", &self.embedder.name())
            .field("dimensions", &self.store.dimensions())
            .field("has_generator", &self.generator.is_some())
            .finish_non_exhaustive()
    }
}

impl KnowledgeEngine {
    /// Create an engine.
    ///
    /// Fails with `DimensionMismatch` when the embedder and the store
    /// disagree on vector size.
    pub fn new(store: SharedStore, embedder: SharedEmbedder, config: EngineConfig) -> Result<Self> {
        if embedder.dimensions() != store.dimensions() {
            return Err(GraphError::DimensionMismatch {
                expected: store.dimensions(),
                actual: embedder.dimensions(),
            });
        }
        Ok(Self {
            store,
            embedder,
            generator: None,
            config,
        })
    }

    /// Attach a generator for natural-language explanations.
    pub fn with_generator(mut self, generator: SharedGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn embedder(&self) -> &SharedEmbedder {
        &self.embedder
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get a node or fail with `NodeNotFound`.
    pub fn get_node(&self, id: &NodeId) -> Result<KnowledgeNode> {
        self.store
            .get_node(id)?
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))
    }

    pub(crate) fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        let expected = self.store.dimensions();
        if vector.len() != expected {
            return Err(GraphError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding
// ─────────────────────────────────────────────────────────────────────────────

impl KnowledgeEngine {
    /// Embed and store one node. Interactive path: provider errors are
    /// returned immediately, without retry.
    pub async fn embed_node(&self, id: &NodeId) -> Result<KnowledgeNode> {
        self.embed_node_cancellable(id, &CancellationToken::new())
            .await
    }

    pub async fn embed_node_cancellable(
        &self,
        id: &NodeId,
        cancel: &CancellationToken,
    ) -> Result<KnowledgeNode> {
        let mut node = self.get_node(id)?;
        let vector = embed_with_cancel(self.embedder.as_ref(), &node.embedding_text(), cancel).await?;
        self.check_dimensions(&vector)?;

        self.store.update_node_embedding(id, &vector)?;
        debug!(node_id = %id, "Embedded node");

        node.embedding = Some(vector);
        Ok(node)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Similarity
// ─────────────────────────────────────────────────────────────────────────────

impl KnowledgeEngine {
    /// Rank embedded nodes by similarity to `query`.
    pub async fn semantic_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RankedResult>> {
        self.semantic_search_cancellable(query, options, &CancellationToken::new())
            .await
    }

    pub async fn semantic_search_cancellable(
        &self,
        query: &str,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<RankedResult>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let limit = Some(options.limit.unwrap_or(self.config.search.limit));
        let mut filter = NodeFilter::new()
            .with_types(options.node_types.iter().copied())
            .with_tags(options.tags.iter().cloned());
        filter.owner = options.owner.clone();

        let vector = match embed_with_cancel(self.embedder.as_ref(), query, cancel).await {
            Ok(vector) => vector,
            Err(e) => {
                let err = GraphError::from(e);
                if options.lexical_fallback && matches!(err, GraphError::Embedding(_)) {
                    warn!(error = %err, "Embedding provider unavailable, using keyword search");
                    let keywords = extract_keywords(query);
                    return self.lexical_rank(&keywords, &filter, None, limit);
                }
                return Err(err);
            }
        };
        self.check_dimensions(&vector)?;

        let threshold = options.threshold.unwrap_or(self.config.search.threshold);
        let results = self.vector_rank(&vector, &filter, None, threshold, limit)?;
        debug!(results = results.len(), threshold, "Semantic search complete");
        Ok(results)
    }

    /// Rank nodes by similarity to the node `id`.
    ///
    /// Uses the node's stored embedding. A node without one is compared by
    /// keyword overlap instead, and those results are marked
    /// [`SimilarityMethod::Lexical`] and filtered by the lexical threshold.
    pub fn find_similar(&self, id: &NodeId, options: &SimilarOptions) -> Result<Vec<RankedResult>> {
        let node = self.get_node(id)?;
        let exclude = options.exclude_self.then_some(id);

        match node.embedding {
            Some(ref vector) => {
                let threshold = options
                    .threshold
                    .unwrap_or(self.config.search.similar_threshold);
                self.vector_rank(vector, &NodeFilter::new(), exclude, threshold, options.limit)
            }
            None => {
                debug!(node_id = %id, "Node has no embedding, falling back to keyword similarity");
                let keywords = node_keywords(&node);
                self.lexical_rank(&keywords, &NodeFilter::new(), exclude, options.limit)
            }
        }
    }

    fn vector_rank(
        &self,
        query: &[f32],
        filter: &NodeFilter,
        exclude: Option<&NodeId>,
        threshold: f64,
        limit: Option<usize>,
    ) -> Result<Vec<RankedResult>> {
        let filter = filter
            .clone()
            .with_embedding(EmbeddingFilter::Present);

        let mut results = Vec::new();
        for node in self.store.list_nodes(&filter)? {
            if exclude == Some(&node.id) {
                continue;
            }
            let Some(ref embedding) = node.embedding else {
                continue;
            };
            let similarity = cosine_similarity(query, embedding)?;
            results.push(RankedResult {
                node,
                similarity,
                method: SimilarityMethod::Embedding,
            });
        }

        Ok(rank(results, threshold, limit))
    }

    fn lexical_rank(
        &self,
        keywords: &BTreeSet<String>,
        filter: &NodeFilter,
        exclude: Option<&NodeId>,
        limit: Option<usize>,
    ) -> Result<Vec<RankedResult>> {
        let mut results = Vec::new();
        for node in self.store.list_nodes(filter)? {
            if exclude == Some(&node.id) {
                continue;
            }
            let similarity = jaccard_similarity(keywords, &node_keywords(&node));
            results.push(RankedResult {
                node,
                similarity,
                method: SimilarityMethod::Lexical,
            });
        }

        Ok(rank(results, self.config.search.lexical_threshold, limit))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Graph Analysis
// ─────────────────────────────────────────────────────────────────────────────

impl KnowledgeEngine {
    /// Read active nodes and the edges between them.
    pub fn snapshot(&self) -> Result<GraphSnapshot> {
        let nodes = self.store.list_nodes(&NodeFilter::new())?;
        let edges = self.store.list_edges()?;
        Ok(GraphSnapshot::new(nodes, &edges))
    }

    /// Backlink and outlink counts of a node and its weighted score.
    ///
    /// Counts come from the same active-node snapshot as
    /// [`Self::influence_ranking`], so edges to inactive nodes are ignored
    /// and an inactive node scores zero.
    pub fn get_node_influence(&self, id: &NodeId) -> Result<Influence> {
        self.get_node(id)?;
        let weights = &self.config.graph.influence;
        Ok(self
            .snapshot()?
            .influence(id, weights)
            .unwrap_or_else(|| Influence::from_counts(id.clone(), 0, 0, weights)))
    }

    /// The most influential active nodes.
    pub fn influence_ranking(&self, limit: usize) -> Result<Vec<Influence>> {
        let mut ranking = self
            .snapshot()?
            .influence_ranking(&self.config.graph.influence);
        ranking.truncate(limit);
        Ok(ranking)
    }

    /// Nodes within `depth` hops of `id`, ignoring edge direction.
    /// The origin itself is not included.
    pub fn get_node_neighborhood(
        &self,
        id: &NodeId,
        depth: usize,
    ) -> Result<Vec<NeighborhoodEntry>> {
        self.neighborhood(id, depth, false)
    }

    /// Like [`Self::get_node_neighborhood`] but reports the origin at
    /// distance 0.
    pub fn get_node_neighborhood_with_origin(
        &self,
        id: &NodeId,
        depth: usize,
    ) -> Result<Vec<NeighborhoodEntry>> {
        self.neighborhood(id, depth, true)
    }

    fn neighborhood(
        &self,
        id: &NodeId,
        depth: usize,
        include_origin: bool,
    ) -> Result<Vec<NeighborhoodEntry>> {
        self.get_node(id)?;
        Ok(self.snapshot()?.neighborhood(id, depth, include_origin))
    }

    /// Connected components with at least `min_size` members.
    pub fn find_clusters(&self, min_size: usize) -> Result<Vec<Cluster>> {
        Ok(self.snapshot()?.clusters(min_size))
    }

    /// Nodes whose removal would split their cluster.
    pub fn get_bridge_nodes(&self) -> Result<Vec<BridgeNode>> {
        Ok(self.snapshot()?.bridge_nodes())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Relationships
// ─────────────────────────────────────────────────────────────────────────────

impl KnowledgeEngine {
    /// Create a manual edge.
    ///
    /// # Errors
    ///
    /// `SelfLoop`, `NodeNotFound`, `InvalidInput` for an out-of-range
    /// weight, or `DuplicateEdge`.
    pub fn create_relationship(
        &self,
        source: &NodeId,
        target: &NodeId,
        relationship_type: RelationshipType,
        comment: Option<&str>,
        weight: Option<f32>,
    ) -> Result<EdgeId> {
        let mut edge = Relationship::new(source.clone(), target.clone(), relationship_type);
        if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
            edge = edge.with_comment(comment);
        }
        if let Some(weight) = weight {
            edge = edge.with_weight(weight);
        }

        let id = self.store.create_edge(&edge)?;
        debug!(edge_id = %id, %source, %target, relationship = %relationship_type, "Created relationship");
        Ok(id)
    }
}
