//! Error types for the engine.

use noesis_llm::LlmError;
use noesis_store::StoreError;
use noesis_types::{EdgeId, NodeId, RelationshipType};
use thiserror::Error;

/// Errors surfaced by [`crate::KnowledgeEngine`].
///
/// Store failures are flattened so that callers match on one taxonomy
/// regardless of which layer detected the problem.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Relationship not found: {0}")]
    EdgeNotFound(EdgeId),

    /// An edge may not connect a node to itself.
    #[error("Relationship would connect node {0} to itself")]
    SelfLoop(NodeId),

    #[error("A {relationship_type} relationship from {source_id} to {target_id} already exists")]
    DuplicateEdge {
        source_id: NodeId,
        target_id: NodeId,
        relationship_type: RelationshipType,
    },

    /// Vectors of different sizes met. This indicates a model or deployment
    /// change and is never coerced.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding or generation provider failed.
    #[error("Embedding provider error: {0}")]
    Embedding(LlmError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl GraphError {
    /// Whether the caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, GraphError::Embedding(e) if e.is_retryable())
    }
}

impl From<StoreError> for GraphError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NodeNotFound(id) => GraphError::NodeNotFound(id),
            StoreError::EdgeNotFound(id) => GraphError::EdgeNotFound(id),
            StoreError::SelfLoop(id) => GraphError::SelfLoop(id),
            StoreError::DuplicateEdge {
                source_id,
                target_id,
                relationship_type,
            } => GraphError::DuplicateEdge {
                source_id,
                target_id,
                relationship_type,
            },
            StoreError::DimensionMismatch { expected, actual } => {
                GraphError::DimensionMismatch { expected, actual }
            }
            StoreError::InvalidData(msg) => GraphError::InvalidInput(msg),
            other => GraphError::Store(other),
        }
    }
}

impl From<LlmError> for GraphError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Cancelled => GraphError::Cancelled,
            other => GraphError::Embedding(other),
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, GraphError>;
