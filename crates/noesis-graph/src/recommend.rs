//! Relationship suggestions.

use std::collections::BTreeSet;

use noesis_llm::GenerationRequest;
use noesis_store::{SuggestionFeedback, SuggestionOutcome};
use noesis_types::{EdgeId, KnowledgeNode, NodeId, Relationship, RelationshipType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::KnowledgeEngine;
use crate::error::Result;
use crate::infer::infer_relationship_type;
use crate::similarity::{RankedResult, SimilarOptions, SimilarityMethod};

/// Fraction of the similarity carried into a suggestion's confidence.
const CONFIDENCE_SCALE: f64 = 0.9;

/// No suggestion is ever presented as certain.
const CONFIDENCE_CAP: f64 = 0.95;

/// Options for `recommend_links`. Unset fields take the engine defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendOptions {
    pub max_suggestions: Option<usize>,
    pub similarity_threshold: Option<f64>,
    /// Override whether the attached generator phrases explanations.
    pub use_generator: Option<bool>,
}

impl RecommendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_suggestions(mut self, max: usize) -> Self {
        self.max_suggestions = Some(max);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn with_generator(mut self, enabled: bool) -> Self {
        self.use_generator = Some(enabled);
        self
    }
}

/// A proposed edge between the node recommendations were requested for and
/// one candidate.
///
/// The rules read the candidate's content, so the edge runs from the
/// candidate to the node: "candidate is an example of node".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub node_id: NodeId,
    pub candidate_id: NodeId,
    pub candidate_title: String,
    pub relationship_type: RelationshipType,
    pub confidence: f64,
    pub similarity: f64,
    pub method: SimilarityMethod,
    /// Name of the inference rule that chose the type.
    pub rule: Option<String>,
    pub explanation: String,
    pub reasoning: String,
}

impl Suggestion {
    /// `(source, target)` of the edge accepting this suggestion creates.
    pub fn edge_endpoints(&self) -> (&NodeId, &NodeId) {
        (&self.candidate_id, &self.node_id)
    }
}

pub(crate) fn confidence_for(similarity: f64) -> f64 {
    (similarity * CONFIDENCE_SCALE).clamp(0.0, CONFIDENCE_CAP)
}

pub(crate) fn build_suggestion(source: &KnowledgeNode, candidate: &RankedResult) -> Suggestion {
    let other = &candidate.node;
    let (relationship_type, rule) = infer_relationship_type(source, other);
    let percent = candidate.similarity * 100.0;

    let reasoning = match candidate.method {
        SimilarityMethod::Embedding => {
            format!("{:.0}% semantic similarity between the two nodes", percent)
        }
        SimilarityMethod::Lexical => format!(
            "{:.0}% keyword overlap (no embedding available for comparison)",
            percent
        ),
    };
    let mut reasoning = match rule {
        Some(rule) => format!("{}; matched the '{}' rule", reasoning, rule),
        None => reasoning,
    };
    let shared: Vec<&str> = source
        .tags
        .intersection(&other.tags)
        .map(String::as_str)
        .collect();
    if !shared.is_empty() {
        reasoning.push_str(&format!("; shared tags: {}", shared.join(", ")));
    }

    Suggestion {
        node_id: source.id.clone(),
        candidate_id: other.id.clone(),
        candidate_title: other.title.clone(),
        relationship_type,
        confidence: confidence_for(candidate.similarity),
        similarity: candidate.similarity,
        method: candidate.method,
        rule: rule.map(str::to_string),
        explanation: format!(
            "\"{}\" {} \"{}\"",
            other.title,
            relationship_type.phrase(),
            source.title
        ),
        reasoning,
    }
}

/// Highest confidence first, candidate id as tie-break.
pub(crate) fn rank_suggestions(mut suggestions: Vec<Suggestion>, max: usize) -> Vec<Suggestion> {
    suggestions.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.candidate_id.cmp(&b.candidate_id))
    });
    suggestions.truncate(max);
    suggestions
}

pub(crate) fn explanation_request(
    source: &KnowledgeNode,
    suggestion: &Suggestion,
) -> GenerationRequest {
    GenerationRequest::new(format!(
        "Explain in one sentence why \"{}\" {} \"{}\".\n\nNote:\n{}\n\nReasoning: {}",
        suggestion.candidate_title,
        suggestion.relationship_type.phrase(),
        source.title,
        source.content,
        suggestion.reasoning,
    ))
    .with_system_message("You explain links between notes in a personal knowledge base.")
}

impl KnowledgeEngine {
    /// Suggest edges between `id` and similar nodes it is not yet linked to.
    ///
    /// An empty list is a normal outcome. Each suggestion carries an
    /// inferred relationship type, a confidence below 1.0 and a readable
    /// explanation.
    pub async fn recommend_links(
        &self,
        id: &NodeId,
        options: &RecommendOptions,
    ) -> Result<Vec<Suggestion>> {
        let settings = &self.config.recommend;
        let node = self.get_node(id)?;
        let threshold = options
            .similarity_threshold
            .unwrap_or(settings.similarity_threshold);
        let max = options.max_suggestions.unwrap_or(settings.max_suggestions);

        let linked: BTreeSet<NodeId> = self
            .store
            .list_edges_for_node(id)?
            .neighbor_ids()
            .cloned()
            .collect();

        let candidates = self.find_similar(id, &SimilarOptions::new().with_threshold(threshold))?;
        let considered = candidates.len();
        let suggestions: Vec<_> = candidates
            .iter()
            .filter(|c| !linked.contains(&c.node.id))
            .map(|c| build_suggestion(&node, c))
            .collect();
        let mut suggestions = rank_suggestions(suggestions, max);

        let use_generator = options.use_generator.unwrap_or(settings.use_generator);
        if use_generator && let Some(generator) = &self.generator {
            for suggestion in &mut suggestions {
                let mut request = explanation_request(&node, suggestion)
                    .with_max_tokens(settings.generator_max_tokens)
                    .with_temperature(settings.generator_temperature);
                if let Some(model) = &settings.generator_model {
                    request = request.with_model(model.clone());
                }
                match generator.generate(request).await {
                    Ok(text) if !text.trim().is_empty() => suggestion.explanation = text,
                    Ok(_) => debug!(candidate = %suggestion.candidate_id, "Generator returned empty explanation"),
                    Err(e) => warn!(
                        candidate = %suggestion.candidate_id,
                        error = %e,
                        "Explanation generation failed, keeping heuristic text"
                    ),
                }
            }
        }

        info!(
            node_id = %id,
            considered,
            already_linked = linked.len(),
            suggestions = suggestions.len(),
            "Recommended links"
        );
        Ok(suggestions)
    }

    /// Turn a suggestion into a stored edge and record the acceptance.
    ///
    /// Fails with `DuplicateEdge` if the edge was created in the meantime.
    /// A failure to record feedback is logged and does not undo the edge.
    pub fn accept_suggestion(&self, suggestion: &Suggestion) -> Result<EdgeId> {
        let (source, target) = suggestion.edge_endpoints();
        let edge = Relationship::new(source.clone(), target.clone(), suggestion.relationship_type)
            .with_confidence(suggestion.confidence as f32)
            .with_comment(suggestion.explanation.clone());
        let edge_id = self.store.create_edge(&edge)?;

        let feedback = feedback_for(suggestion, SuggestionOutcome::Accepted).with_edge(edge_id.clone());
        if let Err(e) = self.store.record_suggestion_feedback(&feedback) {
            warn!(edge_id = %edge_id, error = %e, "Failed to record suggestion feedback");
        }

        info!(edge_id = %edge_id, %source, %target, relationship = %suggestion.relationship_type, "Accepted suggestion");
        Ok(edge_id)
    }

    /// Record what happened to a suggestion without creating an edge.
    pub fn record_suggestion_outcome(
        &self,
        suggestion: &Suggestion,
        outcome: SuggestionOutcome,
    ) -> Result<()> {
        self.store
            .record_suggestion_feedback(&feedback_for(suggestion, outcome))?;
        debug!(candidate = %suggestion.candidate_id, %outcome, "Recorded suggestion outcome");
        Ok(())
    }
}

fn feedback_for(suggestion: &Suggestion, outcome: SuggestionOutcome) -> SuggestionFeedback {
    let (source, target) = suggestion.edge_endpoints();
    SuggestionFeedback::new(
        source.clone(),
        target.clone(),
        suggestion.relationship_type,
        suggestion.confidence as f32,
        outcome,
    )
}
