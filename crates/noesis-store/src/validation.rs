//! Validation for data entering the store.

use noesis_types::{Relationship, WEIGHT_RANGE};

use crate::error::StoreError;

/// Specific validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding contains {count} invalid values (NaN or Inf)")]
    InvalidEmbeddingValues { count: usize },

    #[error("weight {0} is out of range [0.1, 2.0]")]
    InvalidWeight(f32),

    #[error("confidence {0} is out of range [0.0, 1.0]")]
    InvalidConfidence(f32),
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::DimensionMismatch { expected, actual } => {
                StoreError::DimensionMismatch { expected, actual }
            }
            other => StoreError::InvalidData(other.to_string()),
        }
    }
}

/// Check an embedding's length and values.
pub fn validate_embedding(embedding: &[f32], expected_dim: usize) -> Result<(), ValidationError> {
    if embedding.len() != expected_dim {
        return Err(ValidationError::DimensionMismatch {
            expected: expected_dim,
            actual: embedding.len(),
        });
    }

    let count = embedding.iter().filter(|v| !v.is_finite()).count();
    if count > 0 {
        return Err(ValidationError::InvalidEmbeddingValues { count });
    }

    Ok(())
}

/// Check an edge's weight and confidence ranges.
pub fn validate_relationship(edge: &Relationship) -> Result<(), ValidationError> {
    if !edge.weight.is_finite() || !WEIGHT_RANGE.contains(&edge.weight) {
        return Err(ValidationError::InvalidWeight(edge.weight));
    }
    if let Some(confidence) = edge.confidence
        && !(0.0..=1.0).contains(&confidence)
    {
        return Err(ValidationError::InvalidConfidence(confidence));
    }
    Ok(())
}
