//! Knowledge nodes.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{NodeId, ParseEnumError, Timestamp, now};

// ─────────────────────────────────────────────────────────────────────────────
// Node Type
// ─────────────────────────────────────────────────────────────────────────────

/// Closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Knowledge,
    Concept,
    Fact,
    Question,
    Idea,
    Project,
    Resource,
    Note,
    Document,
    Image,
    WebClip,
}

impl NodeType {
    /// Every node type, in declaration order.
    pub const ALL: [NodeType; 11] = [
        Self::Knowledge,
        Self::Concept,
        Self::Fact,
        Self::Question,
        Self::Idea,
        Self::Project,
        Self::Resource,
        Self::Note,
        Self::Document,
        Self::Image,
        Self::WebClip,
    ];

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::Concept => "concept",
            Self::Fact => "fact",
            Self::Question => "question",
            Self::Idea => "idea",
            Self::Project => "project",
            Self::Resource => "resource",
            Self::Note => "note",
            Self::Document => "document",
            Self::Image => "image",
            Self::WebClip => "web_clip",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized || (normalized == "webclip" && *t == Self::WebClip))
            .ok_or_else(|| ParseEnumError::new("node type", s))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// A file or link attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mime_type: Option<String>,
}

/// Typed optional node metadata.
///
/// `extensions` is the only untyped part and is never read by search or
/// graph logic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Knowledge Node
// ─────────────────────────────────────────────────────────────────────────────

/// A short unit of knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: NodeId,
    pub title: String,
    pub content: String,
    pub node_type: NodeType,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Semantic vector, absent until generated.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: NodeMetadata,
    /// Owning user, if the deployment is multi-user.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub owner: Option<String>,
    /// Archived nodes are hidden from search and analysis.
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl KnowledgeNode {
    /// Create an active `Knowledge` node with a fresh id.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = now();
        Self {
            id: NodeId::new(),
            title: title.into(),
            content: content.into(),
            node_type: NodeType::Knowledge,
            tags: BTreeSet::new(),
            embedding: None,
            metadata: NodeMetadata::default(),
            owner: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Use a caller-supplied id.
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_type(mut self, node_type: NodeType) -> Self {
        self.node_type = node_type;
        self
    }

    /// Add a tag. Tags are trimmed; empty tags are ignored.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let tag = tag.trim();
        if !tag.is_empty() {
            self.tags.insert(tag.to_string());
        }
        self
    }

    pub fn with_tags<I, T>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        tags.into_iter().fold(self, |node, tag| node.with_tag(tag))
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.metadata.summary = Some(summary.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.metadata.attachments.push(attachment);
        self
    }

    /// Whether an embedding has been generated.
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    /// Whether the node carries every tag in `tags`.
    pub fn has_all_tags<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().all(|t| self.tags.contains(t.as_ref()))
    }

    /// Text submitted to the embedding provider: title, summary, then content.
    pub fn embedding_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if !self.title.trim().is_empty() {
            parts.push(self.title.trim());
        }
        if let Some(summary) = self.metadata.summary.as_deref()
            && !summary.trim().is_empty()
        {
            parts.push(summary.trim());
        }
        if !self.content.trim().is_empty() {
            parts.push(self.content.trim());
        }
        parts.join("\n\n")
    }
}
