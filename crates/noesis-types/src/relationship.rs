//! Typed, directional relationships between nodes.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{EdgeId, NodeId, ParseEnumError, Timestamp, now};

/// Conventional range for caller-assigned edge weights.
pub const WEIGHT_RANGE: RangeInclusive<f32> = 0.1..=2.0;

// ─────────────────────────────────────────────────────────────────────────────
// Relationship Type
// ─────────────────────────────────────────────────────────────────────────────

/// Relationship types.
///
/// The upper-case set is the current vocabulary; the lower-case set is kept
/// for links created by older clients and by the recommender. `SUPPORTS` and
/// `supports` (likewise `CONTRADICTS` / `contradicts`) are distinct types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    #[serde(rename = "REFERENCES")]
    References,
    #[serde(rename = "EXPANDS_ON")]
    ExpandsOn,
    #[serde(rename = "CONTRADICTS")]
    Contradicts,
    #[serde(rename = "SUPPORTS")]
    Supports,
    #[serde(rename = "IS_A")]
    IsA,
    #[serde(rename = "related_to")]
    RelatedTo,
    #[serde(rename = "depends_on")]
    DependsOn,
    #[serde(rename = "supports")]
    LegacySupports,
    #[serde(rename = "contradicts")]
    LegacyContradicts,
    #[serde(rename = "similar_to")]
    SimilarTo,
    #[serde(rename = "part_of")]
    PartOf,
    #[serde(rename = "example_of")]
    ExampleOf,
    #[serde(rename = "causes")]
    Causes,
    #[serde(rename = "result_of")]
    ResultOf,
}

impl RelationshipType {
    /// Every relationship type, current vocabulary first.
    pub const ALL: [RelationshipType; 14] = [
        Self::References,
        Self::ExpandsOn,
        Self::Contradicts,
        Self::Supports,
        Self::IsA,
        Self::RelatedTo,
        Self::DependsOn,
        Self::LegacySupports,
        Self::LegacyContradicts,
        Self::SimilarTo,
        Self::PartOf,
        Self::ExampleOf,
        Self::Causes,
        Self::ResultOf,
    ];

    /// Exact wire/storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::References => "REFERENCES",
            Self::ExpandsOn => "EXPANDS_ON",
            Self::Contradicts => "CONTRADICTS",
            Self::Supports => "SUPPORTS",
            Self::IsA => "IS_A",
            Self::RelatedTo => "related_to",
            Self::DependsOn => "depends_on",
            Self::LegacySupports => "supports",
            Self::LegacyContradicts => "contradicts",
            Self::SimilarTo => "similar_to",
            Self::PartOf => "part_of",
            Self::ExampleOf => "example_of",
            Self::Causes => "causes",
            Self::ResultOf => "result_of",
        }
    }

    /// Verb phrase used when describing an edge in prose.
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::References => "references",
            Self::ExpandsOn => "expands on",
            Self::Contradicts | Self::LegacyContradicts => "contradicts",
            Self::Supports | Self::LegacySupports => "supports",
            Self::IsA => "is a kind of",
            Self::RelatedTo => "is related to",
            Self::DependsOn => "depends on",
            Self::SimilarTo => "is similar to",
            Self::PartOf => "is part of",
            Self::ExampleOf => "is an example of",
            Self::Causes => "causes",
            Self::ResultOf => "is a result of",
        }
    }

    /// Whether this type belongs to the lower-case legacy vocabulary.
    pub fn is_legacy(&self) -> bool {
        self.as_str().chars().all(|c| !c.is_ascii_uppercase())
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = ParseEnumError;

    /// Parses the exact wire string; case is significant.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("relationship type", s))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Relationship
// ─────────────────────────────────────────────────────────────────────────────

/// A directional edge from `source_id` to `target_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: EdgeId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub relationship_type: RelationshipType,
    /// Caller-assigned strength, conventionally within [`WEIGHT_RANGE`].
    pub weight: f32,
    /// Set by the recommender; absent for manually created edges.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,
    pub created_at: Timestamp,
}

impl Relationship {
    /// Create a manual edge with the default weight of 1.0.
    pub fn new(
        source_id: impl Into<NodeId>,
        target_id: impl Into<NodeId>,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            id: EdgeId::new(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            relationship_type,
            weight: 1.0,
            confidence: None,
            comment: None,
            created_at: now(),
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Whether the edge touches `node` at either end.
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source_id == node || &self.target_id == node
    }

    /// The endpoint opposite `node`, if the edge touches it.
    pub fn other_end(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.source_id == node {
            Some(&self.target_id)
        } else if &self.target_id == node {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_type_round_trip() {
        for t in RelationshipType::ALL {
            assert_eq!(t.as_str().parse::<RelationshipType>().unwrap(), t);
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_case_is_significant() {
        assert_eq!(
            "SUPPORTS".parse::<RelationshipType>().unwrap(),
            RelationshipType::Supports
        );
        assert_eq!(
            "supports".parse::<RelationshipType>().unwrap(),
            RelationshipType::LegacySupports
        );
        assert!("Supports".parse::<RelationshipType>().is_err());
    }

    #[test]
    fn test_is_legacy() {
        assert!(!RelationshipType::IsA.is_legacy());
        assert!(!RelationshipType::ExpandsOn.is_legacy());
        assert!(RelationshipType::RelatedTo.is_legacy());
        assert!(RelationshipType::LegacyContradicts.is_legacy());
    }

    #[test]
    fn test_other_end() {
        let edge = Relationship::new("a", "b", RelationshipType::References);
        assert_eq!(edge.weight, 1.0);
        assert_eq!(edge.other_end(&"a".into()), Some(&NodeId::from("b")));
        assert_eq!(edge.other_end(&"b".into()), Some(&NodeId::from("a")));
        assert_eq!(edge.other_end(&"c".into()), None);
        assert!(edge.touches(&"a".into()));
    }
}
