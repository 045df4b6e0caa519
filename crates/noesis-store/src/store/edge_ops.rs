//! Relationship operations.

use noesis_types::{EdgeId, NodeId, Relationship, RelationshipType};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::types::NodeEdges;
use crate::validation::validate_relationship;

use super::{SqliteStore, format_timestamp, parse_timestamp};

const EDGE_COLUMNS: &str =
    "id, source_id, target_id, relationship_type, weight, confidence, comment, created_at";

impl SqliteStore {
    /// Create an edge after checking every structural invariant.
    pub fn create_edge(&self, edge: &Relationship) -> Result<EdgeId> {
        if edge.source_id == edge.target_id {
            return Err(StoreError::SelfLoop(edge.source_id.clone()));
        }

        let conn = self.conn.lock();

        for endpoint in [&edge.source_id, &edge.target_id] {
            if !Self::node_exists(&conn, endpoint)? {
                return Err(StoreError::NodeNotFound(endpoint.clone()));
            }
        }

        validate_relationship(edge)?;

        if Self::edge_exists_in(
            &conn,
            &edge.source_id,
            &edge.target_id,
            edge.relationship_type,
        )? {
            return Err(duplicate(edge));
        }

        let inserted = conn.execute(
            r#"
            INSERT INTO edges (id, source_id, target_id, relationship_type, weight,
                               confidence, comment, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                edge.id.as_str(),
                edge.source_id.as_str(),
                edge.target_id.as_str(),
                edge.relationship_type.as_str(),
                edge.weight as f64,
                edge.confidence.map(f64::from),
                edge.comment,
                format_timestamp(&edge.created_at),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(duplicate(edge));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(
            edge_id = %edge.id,
            source = %edge.source_id,
            target = %edge.target_id,
            relationship = %edge.relationship_type,
            "Created relationship"
        );
        Ok(edge.id.clone())
    }

    pub fn get_edge(&self, id: &EdgeId) -> Result<Option<Relationship>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM edges WHERE id = ?1", EDGE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id.as_str()])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_edge(row)?)),
            None => Ok(None),
        }
    }

    pub fn delete_edge(&self, id: &EdgeId) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute("DELETE FROM edges WHERE id = ?1", params![id.as_str()])?;
        Ok(rows_affected > 0)
    }

    /// Backlinks and outlinks of a node, oldest first.
    pub fn list_edges_for_node(&self, id: &NodeId) -> Result<NodeEdges> {
        let conn = self.conn.lock();

        if !Self::node_exists(&conn, id)? {
            return Err(StoreError::NodeNotFound(id.clone()));
        }

        let inbound = Self::query_edges(
            &conn,
            "WHERE target_id = ?1 ORDER BY created_at ASC, id ASC",
            id,
        )?;
        let outbound = Self::query_edges(
            &conn,
            "WHERE source_id = ?1 ORDER BY created_at ASC, id ASC",
            id,
        )?;

        Ok(NodeEdges { inbound, outbound })
    }

    pub fn list_edges(&self) -> Result<Vec<Relationship>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM edges ORDER BY created_at ASC, id ASC",
            EDGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(Self::row_to_edge(row)?);
        }
        Ok(edges)
    }

    pub fn edge_exists(
        &self,
        source: &NodeId,
        target: &NodeId,
        relationship_type: RelationshipType,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        Self::edge_exists_in(&conn, source, target, relationship_type)
    }

    pub fn has_any_edge_between(&self, a: &NodeId, b: &NodeId) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                r#"
                SELECT 1 FROM edges
                WHERE (source_id = ?1 AND target_id = ?2)
                   OR (source_id = ?2 AND target_id = ?1)
                LIMIT 1
                "#,
                params![a.as_str(), b.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn edge_exists_in(
        conn: &Connection,
        source: &NodeId,
        target: &NodeId,
        relationship_type: RelationshipType,
    ) -> Result<bool> {
        let found = conn
            .query_row(
                r#"
                SELECT 1 FROM edges
                WHERE source_id = ?1 AND target_id = ?2 AND relationship_type = ?3
                "#,
                params![source.as_str(), target.as_str(), relationship_type.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn query_edges(conn: &Connection, clause: &str, id: &NodeId) -> Result<Vec<Relationship>> {
        let sql = format!("SELECT {} FROM edges {}", EDGE_COLUMNS, clause);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id.as_str()])?;

        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(Self::row_to_edge(row)?);
        }
        Ok(edges)
    }

    fn row_to_edge(row: &rusqlite::Row) -> Result<Relationship> {
        let id: String = row.get(0)?;
        let source_id: String = row.get(1)?;
        let target_id: String = row.get(2)?;
        let type_str: String = row.get(3)?;
        let weight: f64 = row.get(4)?;
        let confidence: Option<f64> = row.get(5)?;
        let comment: Option<String> = row.get(6)?;
        let created_at_str: String = row.get(7)?;

        let relationship_type: RelationshipType = type_str
            .parse()
            .map_err(|e: noesis_types::ParseEnumError| StoreError::InvalidData(e.to_string()))?;

        Ok(Relationship {
            id: EdgeId::from(id),
            source_id: NodeId::from(source_id),
            target_id: NodeId::from(target_id),
            relationship_type,
            weight: weight as f32,
            confidence: confidence.map(|c| c as f32),
            comment,
            created_at: parse_timestamp(&created_at_str)?,
        })
    }
}

fn duplicate(edge: &Relationship) -> StoreError {
    StoreError::DuplicateEdge {
        source_id: edge.source_id.clone(),
        target_id: edge.target_id.clone(),
        relationship_type: edge.relationship_type,
    }
}
