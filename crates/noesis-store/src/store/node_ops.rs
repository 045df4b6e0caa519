//! Node CRUD and embedding operations.

use std::collections::BTreeSet;

use noesis_types::{KnowledgeNode, NodeId, NodeMetadata, NodeType};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::filter::NodeFilter;
use crate::validation::validate_embedding;

use super::{SqliteStore, format_timestamp, parse_timestamp};

const NODE_COLUMNS: &str = "id, title, content, node_type, tags, embedding, metadata, owner, \
                            is_active, created_at, updated_at";

impl SqliteStore {
    /// Insert a new node.
    pub fn insert_node(&self, node: &KnowledgeNode) -> Result<()> {
        let embedding = self.encode_embedding(node.embedding.as_deref())?;
        let tags_json = serde_json::to_string(&node.tags)?;
        let metadata_json = serde_json::to_string(&node.metadata)?;

        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO nodes (id, title, content, node_type, tags, embedding, metadata,
                               owner, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                node.id.as_str(),
                node.title,
                node.content,
                node.node_type.as_str(),
                tags_json,
                embedding,
                metadata_json,
                node.owner,
                node.is_active,
                format_timestamp(&node.created_at),
                format_timestamp(&node.updated_at),
            ],
        )?;

        debug!(node_id = %node.id, "Inserted node");
        Ok(())
    }

    /// Replace every field of an existing node.
    pub fn update_node(&self, node: &KnowledgeNode) -> Result<()> {
        let embedding = self.encode_embedding(node.embedding.as_deref())?;
        let tags_json = serde_json::to_string(&node.tags)?;
        let metadata_json = serde_json::to_string(&node.metadata)?;

        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            r#"
            UPDATE nodes
            SET title = ?2, content = ?3, node_type = ?4, tags = ?5, embedding = ?6,
                metadata = ?7, owner = ?8, is_active = ?9, updated_at = ?10
            WHERE id = ?1
            "#,
            params![
                node.id.as_str(),
                node.title,
                node.content,
                node.node_type.as_str(),
                tags_json,
                embedding,
                metadata_json,
                node.owner,
                node.is_active,
                format_timestamp(&node.updated_at),
            ],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NodeNotFound(node.id.clone()));
        }

        debug!(node_id = %node.id, "Updated node");
        Ok(())
    }

    pub fn get_node(&self, id: &NodeId) -> Result<Option<KnowledgeNode>> {
        let conn = self.conn.lock();

        let sql = format!("SELECT {} FROM nodes WHERE id = ?1", NODE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id.as_str()])?;

        match rows.next()? {
            Some(row) => Ok(Some(self.row_to_node(row)?)),
            None => Ok(None),
        }
    }

    /// List nodes matching `filter`, most recently updated first, id as
    /// tie-break.
    pub fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<KnowledgeNode>> {
        let conn = self.conn.lock();

        let sql = format!(
            r#"
            SELECT {}
            FROM nodes
            WHERE (?1 OR is_active = 1)
              AND (?2 IS NULL OR owner = ?2)
              AND (?3 = 0
                   OR (?3 = 1 AND embedding IS NOT NULL)
                   OR (?3 = 2 AND embedding IS NULL))
            ORDER BY updated_at DESC, id ASC
            "#,
            NODE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            filter.include_inactive,
            filter.owner,
            filter.embedding.as_code(),
        ])?;

        let limit = filter.limit.unwrap_or(usize::MAX);
        let mut nodes = Vec::new();
        while let Some(row) = rows.next()? {
            if nodes.len() >= limit {
                break;
            }
            let node = self.row_to_node(row)?;
            if filter.matches_content(&node) {
                nodes.push(node);
            }
        }

        debug!(count = nodes.len(), "Listed nodes");
        Ok(nodes)
    }

    /// Delete a node; its edges go with it.
    pub fn delete_node(&self, id: &NodeId) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute("DELETE FROM nodes WHERE id = ?1", params![id.as_str()])?;

        if rows_affected > 0 {
            debug!(node_id = %id, "Deleted node and its relationships");
        }
        Ok(rows_affected > 0)
    }

    /// Attach an embedding to a node without touching `updated_at`.
    pub fn update_node_embedding(&self, id: &NodeId, embedding: &[f32]) -> Result<()> {
        let blob = self.encode_embedding(Some(embedding))?;

        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            "UPDATE nodes SET embedding = ?2 WHERE id = ?1",
            params![id.as_str(), blob],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NodeNotFound(id.clone()));
        }

        debug!(node_id = %id, dims = embedding.len(), "Stored embedding");
        Ok(())
    }

    pub fn clear_node_embedding(&self, id: &NodeId) -> Result<()> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            "UPDATE nodes SET embedding = NULL WHERE id = ?1",
            params![id.as_str()],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NodeNotFound(id.clone()));
        }
        Ok(())
    }

    pub(crate) fn node_exists(conn: &rusqlite::Connection, id: &NodeId) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM nodes WHERE id = ?1",
                params![id.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Validate and serialize an embedding as little-endian `f32`s.
    fn encode_embedding(&self, embedding: Option<&[f32]>) -> Result<Option<Vec<u8>>> {
        let Some(embedding) = embedding else {
            return Ok(None);
        };
        validate_embedding(embedding, self.dimensions)?;
        Ok(Some(
            embedding.iter().flat_map(|v| v.to_le_bytes()).collect(),
        ))
    }

    fn decode_embedding(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return Err(StoreError::InvalidData(format!(
                "embedding blob of {} bytes is not a whole number of f32 values",
                bytes.len()
            )));
        }

        let actual = bytes.len() / 4;
        if actual != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual,
            });
        }

        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn row_to_node(&self, row: &rusqlite::Row) -> Result<KnowledgeNode> {
        let id: String = row.get(0)?;
        let title: String = row.get(1)?;
        let content: String = row.get(2)?;
        let node_type_str: String = row.get(3)?;
        let tags_json: String = row.get(4)?;
        let embedding_blob: Option<Vec<u8>> = row.get(5)?;
        let metadata_json: String = row.get(6)?;
        let owner: Option<String> = row.get(7)?;
        let is_active: bool = row.get(8)?;
        let created_at_str: String = row.get(9)?;
        let updated_at_str: String = row.get(10)?;

        let node_type: NodeType = node_type_str
            .parse()
            .map_err(|e: noesis_types::ParseEnumError| StoreError::InvalidData(e.to_string()))?;
        let tags: BTreeSet<String> = serde_json::from_str(&tags_json)?;
        let metadata: NodeMetadata = serde_json::from_str(&metadata_json)?;
        let embedding = embedding_blob
            .map(|bytes| self.decode_embedding(&bytes))
            .transpose()?;

        Ok(KnowledgeNode {
            id: NodeId::from(id),
            title,
            content,
            node_type,
            tags,
            embedding,
            metadata,
            owner,
            is_active,
            created_at: parse_timestamp(&created_at_str)?,
            updated_at: parse_timestamp(&updated_at_str)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::EmbeddingFilter;
    use noesis_types::Attachment;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory(3).unwrap()
    }

    #[test]
    fn test_insert_and_get_node() {
        let store = store();
        let node = KnowledgeNode::new("Ownership", "Every value has one owner")
            .with_type(NodeType::Concept)
            .with_tags(["rust", "memory"])
            .with_owner("alice")
            .with_summary("Rust ownership")
            .with_attachment(Attachment {
                name: "book".to_string(),
                url: "https://doc.rust-lang.org/book/".to_string(),
                mime_type: None,
            })
            .with_embedding(vec![0.5, -0.25, 1.0]);

        store.insert_node(&node).unwrap();
        let loaded = store.get_node(&node.id).unwrap().unwrap();

        assert_eq!(loaded.title, node.title);
        assert_eq!(loaded.node_type, NodeType::Concept);
        assert_eq!(loaded.tags, node.tags);
        assert_eq!(loaded.embedding, Some(vec![0.5, -0.25, 1.0]));
        assert_eq!(loaded.metadata, node.metadata);
        assert_eq!(loaded.owner.as_deref(), Some("alice"));
        assert!(loaded.is_active);
    }

    #[test]
    fn test_get_missing_node() {
        assert!(store().get_node(&NodeId::from("nope")).unwrap().is_none());
    }

    #[test]
    fn test_insert_rejects_wrong_dimension() {
        let node = KnowledgeNode::new("t", "c").with_embedding(vec![1.0, 2.0]);
        assert!(matches!(
            store().insert_node(&node),
            Err(StoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_update_node() {
        let store = store();
        let mut node = KnowledgeNode::new("Draft", "first");
        store.insert_node(&node).unwrap();

        node.title = "Final".to_string();
        node.is_active = false;
        store.update_node(&node).unwrap();

        let loaded = store.get_node(&node.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Final");
        assert!(!loaded.is_active);
    }

    #[test]
    fn test_update_missing_node() {
        let node = KnowledgeNode::new("ghost", "");
        assert!(matches!(
            store().update_node(&node),
            Err(StoreError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_update_and_clear_embedding() {
        let store = store();
        let node = KnowledgeNode::new("t", "c");
        store.insert_node(&node).unwrap();

        store.update_node_embedding(&node.id, &[1.0, 0.0, 0.0]).unwrap();
        assert!(store.get_node(&node.id).unwrap().unwrap().has_embedding());

        assert!(matches!(
            store.update_node_embedding(&node.id, &[1.0]),
            Err(StoreError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            store.update_node_embedding(&node.id, &[f32::NAN, 0.0, 0.0]),
            Err(StoreError::InvalidData(_))
        ));

        store.clear_node_embedding(&node.id).unwrap();
        assert!(!store.get_node(&node.id).unwrap().unwrap().has_embedding());

        assert!(matches!(
            store.update_node_embedding(&NodeId::from("missing"), &[0.0, 0.0, 0.0]),
            Err(StoreError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_list_nodes_filters() {
        let store = store();
        let a = KnowledgeNode::new("a", "")
            .with_type(NodeType::Fact)
            .with_tags(["x", "y"])
            .with_embedding(vec![1.0, 0.0, 0.0]);
        let b = KnowledgeNode::new("b", "")
            .with_type(NodeType::Idea)
            .with_tags(["x"])
            .with_owner("bob");
        let mut c = KnowledgeNode::new("c", "").with_tags(["x", "y"]);
        c.is_active = false;

        for n in [&a, &b, &c] {
            store.insert_node(n).unwrap();
        }

        assert_eq!(store.list_nodes(&NodeFilter::new()).unwrap().len(), 2);
        assert_eq!(
            store
                .list_nodes(&NodeFilter::new().including_inactive())
                .unwrap()
                .len(),
            3
        );

        let tagged = store.list_nodes(&NodeFilter::new().with_tags(["x", "y"])).unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, a.id);

        let embedded = store.list_nodes(&NodeFilter::embedded()).unwrap();
        assert_eq!(embedded.len(), 1);
        assert_eq!(embedded[0].id, a.id);

        let missing = store
            .list_nodes(&NodeFilter::new().with_embedding(EmbeddingFilter::Missing))
            .unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, b.id);

        let owned = store.list_nodes(&NodeFilter::new().with_owner("bob")).unwrap();
        assert_eq!(owned.len(), 1);

        let ideas = store
            .list_nodes(&NodeFilter::new().with_types([NodeType::Idea]))
            .unwrap();
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].id, b.id);

        assert_eq!(
            store
                .list_nodes(&NodeFilter::new().with_limit(1))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_list_nodes_ordered_by_updated_at() {
        let store = store();
        let older = KnowledgeNode::new("older", "");
        let mut newer = KnowledgeNode::new("newer", "");
        newer.updated_at = older.updated_at + chrono::Duration::seconds(5);

        store.insert_node(&older).unwrap();
        store.insert_node(&newer).unwrap();

        let nodes = store.list_nodes(&NodeFilter::new()).unwrap();
        assert_eq!(nodes[0].id, newer.id);
        assert_eq!(nodes[1].id, older.id);
    }

    #[test]
    fn test_delete_node() {
        let store = store();
        let node = KnowledgeNode::new("t", "c");
        store.insert_node(&node).unwrap();

        assert!(store.delete_node(&node.id).unwrap());
        assert!(!store.delete_node(&node.id).unwrap());
        assert!(store.get_node(&node.id).unwrap().is_none());
    }
}
