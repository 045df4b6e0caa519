//! Persistent storage for knowledge nodes and their relationships.
//!
//! [`SqliteStore`] is the system of record every other component reads
//! from. Callers depend on the [`KnowledgeStore`] trait so that tests and
//! alternative backends can stand in for SQLite.
//!
//! The store enforces the graph's structural invariants itself:
//!
//! - no self-loops
//! - at most one edge per (source, target, type)
//! - edges never outlive either endpoint
//! - every stored embedding has the deployment-wide dimension

pub mod backend;
pub mod error;
pub mod filter;
pub mod store;
pub mod types;
pub mod validation;

pub use backend::{KnowledgeStore, SharedStore};
pub use error::{Result, StoreError};
pub use filter::{EmbeddingFilter, NodeFilter};
pub use store::SqliteStore;
pub use types::{NodeEdges, StoreStats, SuggestionFeedback, SuggestionOutcome};
pub use validation::{ValidationError, validate_embedding, validate_relationship};
