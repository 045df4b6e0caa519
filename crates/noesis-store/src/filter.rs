//! Node listing filters.

use noesis_types::{KnowledgeNode, NodeType};

/// Which nodes to return based on whether they carry an embedding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmbeddingFilter {
    #[default]
    Any,
    Present,
    Missing,
}

impl EmbeddingFilter {
    pub(crate) fn as_code(self) -> i64 {
        match self {
            EmbeddingFilter::Any => 0,
            EmbeddingFilter::Present => 1,
            EmbeddingFilter::Missing => 2,
        }
    }
}

/// Criteria for [`crate::KnowledgeStore::list_nodes`].
///
/// An empty filter returns every active node, most recently updated first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFilter {
    /// Keep nodes of any of these types. Empty keeps all types.
    pub node_types: Vec<NodeType>,
    /// Keep nodes carrying every one of these tags.
    pub tags: Vec<String>,
    pub owner: Option<String>,
    /// Include archived nodes.
    pub include_inactive: bool,
    pub embedding: EmbeddingFilter,
    pub limit: Option<usize>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active nodes that have an embedding.
    pub fn embedded() -> Self {
        Self::default().with_embedding(EmbeddingFilter::Present)
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

    pub fn including_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    pub fn with_embedding(mut self, embedding: EmbeddingFilter) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `node` satisfies the type and tag criteria.
    ///
    /// The remaining criteria are evaluated by the backend's query.
    pub fn matches_content(&self, node: &KnowledgeNode) -> bool {
        (self.node_types.is_empty() || self.node_types.contains(&node.node_type))
            && node.has_all_tags(&self.tags)
    }

    /// Whether `node` satisfies every criterion.
    pub fn matches(&self, node: &KnowledgeNode) -> bool {
        let embedding_ok = match self.embedding {
            EmbeddingFilter::Any => true,
            EmbeddingFilter::Present => node.has_embedding(),
            EmbeddingFilter::Missing => !node.has_embedding(),
        };
        (self.include_inactive || node.is_active)
            && self.owner.as_ref().is_none_or(|o| node.owner.as_ref() == Some(o))
            && embedding_ok
            && self.matches_content(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_active_only() {
        let filter = NodeFilter::new();
        let mut node = KnowledgeNode::new("t", "c");
        assert!(filter.matches(&node));

        node.is_active = false;
        assert!(!filter.matches(&node));
        assert!(filter.clone().including_inactive().matches(&node));
    }

    #[test]
    fn test_tags_require_all() {
        let node = KnowledgeNode::new("t", "c").with_tags(["rust", "async"]);
        assert!(NodeFilter::new().with_tags(["rust"]).matches(&node));
        assert!(NodeFilter::new().with_tags(["rust", "async"]).matches(&node));
        assert!(!NodeFilter::new().with_tags(["rust", "python"]).matches(&node));
    }

    #[test]
    fn test_types_are_any_of() {
        let node = KnowledgeNode::new("t", "c").with_type(NodeType::Idea);
        assert!(
            NodeFilter::new()
                .with_types([NodeType::Fact, NodeType::Idea])
                .matches(&node)
        );
        assert!(!NodeFilter::new().with_types([NodeType::Fact]).matches(&node));
    }

    #[test]
    fn test_embedding_and_owner() {
        let node = KnowledgeNode::new("t", "c")
            .with_owner("alice")
            .with_embedding(vec![1.0]);
        assert!(NodeFilter::embedded().matches(&node));
        assert!(
            !NodeFilter::new()
                .with_embedding(EmbeddingFilter::Missing)
                .matches(&node)
        );
        assert!(NodeFilter::new().with_owner("alice").matches(&node));
        assert!(!NodeFilter::new().with_owner("bob").matches(&node));
    }
}
