//! Error types for the store crate.

use noesis_types::{EdgeId, NodeId, RelationshipType};
use thiserror::Error;

/// Errors that can occur in the store crate.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection or operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Relationship not found: {0}")]
    EdgeNotFound(EdgeId),

    /// An edge may not connect a node to itself.
    #[error("Relationship would connect node {0} to itself")]
    SelfLoop(NodeId),

    /// An edge of this type already exists in this direction.
    #[error("A {relationship_type} relationship from {source_id} to {target_id} already exists")]
    DuplicateEdge {
        source_id: NodeId,
        target_id: NodeId,
        relationship_type: RelationshipType,
    },

    /// A vector does not match the deployment's embedding dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid data or state.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
