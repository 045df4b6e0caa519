//! The storage contract the engine depends on.

use std::sync::Arc;

use noesis_types::{EdgeId, KnowledgeNode, NodeId, Relationship, RelationshipType};

use crate::error::Result;
use crate::filter::NodeFilter;
use crate::types::{NodeEdges, StoreStats, SuggestionFeedback};

/// Trait for node and relationship storage backends.
///
/// Every call reads current state; implementations must not hand out cached
/// copies that can go stale between calls.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow sharing across tasks.
pub trait KnowledgeStore: Send + Sync {
    /// The embedding dimension every stored vector must have.
    fn dimensions(&self) -> usize;

    /// Insert a new node.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the node carries an embedding of the wrong size.
    fn insert_node(&self, node: &KnowledgeNode) -> Result<()>;

    /// Replace a node's fields, including its embedding.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` if the node does not exist.
    fn update_node(&self, node: &KnowledgeNode) -> Result<()>;

    /// Get a node by id. Returns `Ok(None)` if it does not exist.
    fn get_node(&self, id: &NodeId) -> Result<Option<KnowledgeNode>>;

    /// List nodes matching `filter`, most recently updated first.
    fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<KnowledgeNode>>;

    /// Delete a node and every edge touching it.
    ///
    /// Returns `true` if the node existed.
    fn delete_node(&self, id: &NodeId) -> Result<bool>;

    /// Attach an embedding to a node.
    fn update_node_embedding(&self, id: &NodeId, embedding: &[f32]) -> Result<()>;

    /// Remove a node's embedding.
    fn clear_node_embedding(&self, id: &NodeId) -> Result<()>;

    /// Create an edge, returning its id.
    ///
    /// # Errors
    ///
    /// Checked in order: `SelfLoop`, `NodeNotFound` for either endpoint,
    /// `InvalidData` for out-of-range weight or confidence, `DuplicateEdge`.
    fn create_edge(&self, edge: &Relationship) -> Result<EdgeId>;

    fn get_edge(&self, id: &EdgeId) -> Result<Option<Relationship>>;

    /// Returns `true` if the edge existed.
    fn delete_edge(&self, id: &EdgeId) -> Result<bool>;

    /// Backlinks and outlinks of a node.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` if the node does not exist.
    fn list_edges_for_node(&self, id: &NodeId) -> Result<NodeEdges>;

    /// Every edge in the graph.
    fn list_edges(&self) -> Result<Vec<Relationship>>;

    /// Whether an edge of this exact type and direction exists.
    fn edge_exists(
        &self,
        source: &NodeId,
        target: &NodeId,
        relationship_type: RelationshipType,
    ) -> Result<bool>;

    /// Whether any edge connects the two nodes, in either direction.
    fn has_any_edge_between(&self, a: &NodeId, b: &NodeId) -> Result<bool>;

    /// Log a response to a relationship suggestion.
    fn record_suggestion_feedback(&self, feedback: &SuggestionFeedback) -> Result<()>;

    /// Record which provider produced the stored embeddings.
    fn set_embedding_provider(&self, provider: &str) -> Result<()>;

    fn stats(&self) -> Result<StoreStats>;
}

/// A shared store that can be used across tasks.
pub type SharedStore = Arc<dyn KnowledgeStore>;
