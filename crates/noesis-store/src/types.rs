//! Result and record types returned by the store.

use std::fmt;
use std::str::FromStr;

use noesis_types::{EdgeId, NodeId, Relationship, RelationshipType, Timestamp, now};
use serde::{Deserialize, Serialize};

/// Every edge touching one node, split by direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeEdges {
    /// Backlinks: edges whose target is the node.
    pub inbound: Vec<Relationship>,
    /// Outlinks: edges whose source is the node.
    pub outbound: Vec<Relationship>,
}

impl NodeEdges {
    pub fn len(&self) -> usize {
        self.inbound.len() + self.outbound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inbound.is_empty() && self.outbound.is_empty()
    }

    /// Ids of every node on the other end of an edge, in either direction.
    pub fn neighbor_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.inbound
            .iter()
            .map(|e| &e.source_id)
            .chain(self.outbound.iter().map(|e| &e.target_id))
    }
}

/// Database statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub node_count: usize,
    pub active_node_count: usize,
    pub embedded_node_count: usize,
    pub edge_count: usize,
    pub feedback_count: usize,
    pub embedding_dimensions: usize,
    pub embedding_provider: Option<String>,
}

/// What the user did with a relationship suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionOutcome {
    Accepted,
    Rejected,
    Ignored,
}

impl SuggestionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionOutcome::Accepted => "accepted",
            SuggestionOutcome::Rejected => "rejected",
            SuggestionOutcome::Ignored => "ignored",
        }
    }
}

impl fmt::Display for SuggestionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuggestionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(SuggestionOutcome::Accepted),
            "rejected" => Ok(SuggestionOutcome::Rejected),
            "ignored" => Ok(SuggestionOutcome::Ignored),
            other => Err(format!("unknown suggestion outcome '{}'", other)),
        }
    }
}

/// A logged response to a relationship suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionFeedback {
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub relationship_type: RelationshipType,
    pub confidence: f32,
    pub outcome: SuggestionOutcome,
    /// The edge created when the suggestion was accepted.
    pub edge_id: Option<EdgeId>,
    pub created_at: Timestamp,
}

impl SuggestionFeedback {
    pub fn new(
        source_id: NodeId,
        target_id: NodeId,
        relationship_type: RelationshipType,
        confidence: f32,
        outcome: SuggestionOutcome,
    ) -> Self {
        Self {
            source_id,
            target_id,
            relationship_type,
            confidence,
            outcome,
            edge_id: None,
            created_at: now(),
        }
    }

    pub fn with_edge(mut self, edge_id: EdgeId) -> Self {
        self.edge_id = Some(edge_id);
        self
    }
}
