//! Bulk embedding job.

use noesis_llm::with_retry;
use noesis_store::{EmbeddingFilter, NodeFilter};
use noesis_types::NodeId;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::KnowledgeEngine;
use crate::error::{GraphError, Result};

/// Which nodes a bulk job covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOptions {
    /// Skip nodes that already have an embedding.
    pub only_missing: bool,
    pub include_inactive: bool,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            only_missing: true,
            include_inactive: false,
        }
    }
}

impl BulkOptions {
    /// Re-embed every node, replacing existing vectors.
    pub fn all() -> Self {
        Self {
            only_missing: false,
            ..Self::default()
        }
    }
}

/// Progress reported after each item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkProgress {
    pub processed: usize,
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
}

/// Outcome of a bulk job. A cancelled job reports what it finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub cancelled: bool,
    pub failed_ids: Vec<NodeId>,
}

impl BulkReport {
    pub fn processed(&self) -> usize {
        self.success_count + self.failed_count
    }
}

/// Callback invoked after every item.
pub type ProgressFn<'a> = &'a (dyn Fn(&BulkProgress) + Send + Sync);

impl KnowledgeEngine {
    /// Embed many nodes, throttled and cancellable.
    ///
    /// Nodes are handled one at a time in chunks of the configured batch
    /// size with a pause between chunks. Transient provider errors are
    /// retried with backoff; an item that still fails is counted and
    /// skipped. A vector of the wrong size aborts the whole job.
    pub async fn generate_embeddings(
        &self,
        options: &BulkOptions,
        cancel: &CancellationToken,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<BulkReport> {
        let settings = &self.config.bulk;
        let mut filter = NodeFilter::new();
        if options.only_missing {
            filter = filter.with_embedding(EmbeddingFilter::Missing);
        }
        if options.include_inactive {
            filter = filter.including_inactive();
        }

        let nodes = self.store.list_nodes(&filter)?;
        let provider = self.embedder.name().to_string();
        let batch_size = settings.batch_size.max(1);

        let mut report = BulkReport {
            total: nodes.len(),
            ..BulkReport::default()
        };
        info!(total = report.total, batch_size, provider = %provider, "Starting bulk embedding");

        'chunks: for (index, chunk) in nodes.chunks(batch_size).enumerate() {
            if index > 0 && !settings.chunk_pause.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break 'chunks;
                    }
                    _ = tokio::time::sleep(settings.chunk_pause) => {}
                }
            }

            for node in chunk {
                let text = node.embedding_text();
                let embedder = self.embedder.as_ref();
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = with_retry(settings.retry, &provider, || embedder.embed(&text)) => Some(result),
                };

                let Some(result) = outcome else {
                    report.cancelled = true;
                    break 'chunks;
                };

                match result.map_err(GraphError::from).and_then(|vector| {
                    self.check_dimensions(&vector)?;
                    Ok(vector)
                }) {
                    Ok(vector) => match self.store.update_node_embedding(&node.id, &vector) {
                        Ok(()) => {
                            report.success_count += 1;
                            debug!(node_id = %node.id, "Embedded node");
                        }
                        Err(e) => {
                            warn!(node_id = %node.id, error = %e, "Failed to store embedding");
                            report.failed_count += 1;
                            report.failed_ids.push(node.id.clone());
                        }
                    },
                    Err(e @ GraphError::DimensionMismatch { .. }) => return Err(e),
                    Err(e) => {
                        warn!(node_id = %node.id, error = %e, "Failed to embed node");
                        report.failed_count += 1;
                        report.failed_ids.push(node.id.clone());
                    }
                }

                if let Some(progress) = progress {
                    progress(&BulkProgress {
                        processed: report.processed(),
                        total: report.total,
                        success_count: report.success_count,
                        failed_count: report.failed_count,
                    });
                }
            }
        }

        if report.success_count > 0 {
            self.store.set_embedding_provider(&provider)?;
        }

        info!(
            total = report.total,
            success = report.success_count,
            failed = report.failed_count,
            cancelled = report.cancelled,
            "Bulk embedding finished"
        );
        Ok(report)
    }
}
