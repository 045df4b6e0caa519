//! Suggestion feedback log.

use rusqlite::params;
use tracing::debug;

use crate::error::Result;
use crate::types::SuggestionFeedback;

use super::{SqliteStore, format_timestamp};

impl SqliteStore {
    pub fn record_suggestion_feedback(&self, feedback: &SuggestionFeedback) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO suggestion_feedback (source_id, target_id, relationship_type,
                                             confidence, outcome, edge_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                feedback.source_id.as_str(),
                feedback.target_id.as_str(),
                feedback.relationship_type.as_str(),
                feedback.confidence as f64,
                feedback.outcome.as_str(),
                feedback.edge_id.as_ref().map(|id| id.as_str()),
                format_timestamp(&feedback.created_at),
            ],
        )?;

        debug!(
            source = %feedback.source_id,
            target = %feedback.target_id,
            outcome = %feedback.outcome,
            "Recorded suggestion feedback"
        );
        Ok(())
    }

    /// Count logged outcomes of one kind.
    pub fn count_feedback(&self, outcome: crate::types::SuggestionOutcome) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM suggestion_feedback WHERE outcome = ?1",
            params![outcome.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}
