//! Shared domain types for the noesis knowledge graph.
//!
//! Every other crate in the workspace speaks in terms of these types:
//! knowledge nodes, the typed relationships between them, and the opaque
//! identifiers used to address both.

pub mod id;
pub mod node;
pub mod relationship;

pub use id::{EdgeId, NodeId};
pub use node::{Attachment, KnowledgeNode, NodeMetadata, NodeType};
pub use relationship::{Relationship, RelationshipType, WEIGHT_RANGE};

/// Timestamp type used across the workspace.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current UTC time.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

/// Error returned when a wire string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    /// Which enumeration was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
