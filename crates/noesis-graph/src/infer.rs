//! Relationship type inference.
//!
//! An ordered list of `(predicate, type)` rules evaluated against a
//! candidate. The first rule that matches decides the type; when none
//! matches the result is [`RelationshipType::RelatedTo`].

use noesis_types::{KnowledgeNode, RelationshipType};

/// One inference rule.
#[derive(Clone, Copy)]
pub struct InferenceRule {
    pub name: &'static str,
    pub relationship_type: RelationshipType,
    predicate: fn(&RuleInput<'_>) -> bool,
}

impl std::fmt::Debug for InferenceRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceRule")
            .field("name", &self.name)
            .field("relationship_type", &self.relationship_type)
            .finish_non_exhaustive()
    }
}

impl InferenceRule {
    fn matches(&self, input: &RuleInput<'_>) -> bool {
        (self.predicate)(input)
    }
}

/// Lowercased text the rules look at.
struct RuleInput<'a> {
    source: &'a KnowledgeNode,
    candidate: &'a KnowledgeNode,
    candidate_content: String,
}

impl RuleInput<'_> {
    fn content_has_any(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.candidate_content.contains(w))
    }

    /// One node's title appears in the other's title or content.
    fn shares_concept(&self) -> bool {
        contains_title(self.candidate, &self.source.title)
            || contains_title(self.source, &self.candidate.title)
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whole-word match: the title's words appear as a contiguous run.
fn contains_title(node: &KnowledgeNode, title: &str) -> bool {
    let needle = words(title);
    if needle.is_empty() {
        return false;
    }
    [&node.title, &node.content].into_iter().any(|text| {
        words(text)
            .windows(needle.len())
            .any(|run| run == needle.as_slice())
    })
}

/// Evaluated top to bottom; order is part of the contract.
pub const INFERENCE_RULES: &[InferenceRule] = &[
    InferenceRule {
        name: "example",
        relationship_type: RelationshipType::ExampleOf,
        predicate: |i| i.content_has_any(&["example"]),
    },
    InferenceRule {
        name: "cause",
        relationship_type: RelationshipType::Causes,
        predicate: |i| i.content_has_any(&["cause", "because"]),
    },
    InferenceRule {
        name: "result",
        relationship_type: RelationshipType::ResultOf,
        predicate: |i| i.content_has_any(&["result", "therefore"]),
    },
    InferenceRule {
        name: "contrast",
        relationship_type: RelationshipType::LegacyContradicts,
        predicate: |i| i.content_has_any(&["contrast", "however"]),
    },
    InferenceRule {
        name: "support",
        relationship_type: RelationshipType::LegacySupports,
        predicate: |i| i.content_has_any(&["support", "agree"]),
    },
    InferenceRule {
        name: "shared-concept",
        relationship_type: RelationshipType::PartOf,
        predicate: |i| i.shares_concept(),
    },
    InferenceRule {
        name: "expand",
        relationship_type: RelationshipType::ExpandsOn,
        predicate: |i| i.content_has_any(&["expand", "develop"]),
    },
];

/// Pick the relationship type for a suggested edge from `source` to
/// `candidate`, returning the name of the rule that fired.
pub fn infer_relationship_type(
    source: &KnowledgeNode,
    candidate: &KnowledgeNode,
) -> (RelationshipType, Option<&'static str>) {
    let input = RuleInput {
        source,
        candidate,
        candidate_content: candidate.content.to_lowercase(),
    };

    INFERENCE_RULES
        .iter()
        .find(|rule| rule.matches(&input))
        .map_or((RelationshipType::RelatedTo, None), |rule| {
            (rule.relationship_type, Some(rule.name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(content: &str) -> RelationshipType {
        let source = KnowledgeNode::new("Source", "origin text");
        let candidate = KnowledgeNode::new("Candidate", content);
        infer_relationship_type(&source, &candidate).0
    }

    #[test]
    fn test_each_rule() {
        assert_eq!(infer("For Example, a dog"), RelationshipType::ExampleOf);
        assert_eq!(infer("It happens because of heat"), RelationshipType::Causes);
        assert_eq!(infer("The result is clear"), RelationshipType::ResultOf);
        assert_eq!(infer("However, not always"), RelationshipType::LegacyContradicts);
        assert_eq!(infer("I agree with this"), RelationshipType::LegacySupports);
        assert_eq!(infer("We develop the idea"), RelationshipType::ExpandsOn);
        assert_eq!(infer("Nothing in particular"), RelationshipType::RelatedTo);
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(
            infer("an example that causes a result"),
            RelationshipType::ExampleOf
        );
        assert_eq!(
            infer("because of this, therefore that"),
            RelationshipType::Causes
        );
        assert_eq!(
            infer("however we support it"),
            RelationshipType::LegacyContradicts
        );
    }

    #[test]
    fn test_shared_concept_before_expand() {
        let source = KnowledgeNode::new("France", "A country in Europe");
        let candidate = KnowledgeNode::new("Paris", "The capital of France; we develop it");
        let (ty, rule) = infer_relationship_type(&source, &candidate);
        assert_eq!(ty, RelationshipType::PartOf);
        assert_eq!(rule, Some("shared-concept"));
    }

    #[test]
    fn test_shared_concept_either_direction() {
        let source = KnowledgeNode::new("Rust", "Ownership matters in Rust");
        let candidate = KnowledgeNode::new("Ownership", "Values have owners");
        assert_eq!(
            infer_relationship_type(&source, &candidate).0,
            RelationshipType::PartOf
        );
    }

    #[test]
    fn test_fallback_has_no_rule_name() {
        let source = KnowledgeNode::new("A", "");
        let candidate = KnowledgeNode::new("B", "plain");
        assert_eq!(
            infer_relationship_type(&source, &candidate),
            (RelationshipType::RelatedTo, None)
        );
    }

    #[test]
    fn test_shared_concept_needs_whole_words() {
        let cases = [
            ("Art", "Quick start guide to the tool"),
            ("Go", "Good recipes for dinner"),
            ("Data base", "Our database is fast"),
        ];
        for (title, content) in cases {
            let source = KnowledgeNode::new(title, "");
            let candidate = KnowledgeNode::new("Notes", content);
            assert_eq!(
                infer_relationship_type(&source, &candidate),
                (RelationshipType::RelatedTo, None),
                "{title} vs {content}"
            );
        }
    }

    #[test]
    fn test_shared_concept_matches_phrase() {
        let source = KnowledgeNode::new("Machine Learning", "");
        let candidate = KnowledgeNode::new("Notes", "Intro to machine-learning models");
        assert_eq!(
            infer_relationship_type(&source, &candidate),
            (RelationshipType::PartOf, Some("shared-concept"))
        );
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<_> = INFERENCE_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            [
                "example",
                "cause",
                "result",
                "contrast",
                "support",
                "shared-concept",
                "expand"
            ]
        );
    }
}
