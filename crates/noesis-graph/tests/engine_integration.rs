//! End-to-end behavior of the engine over a real SQLite store.

use std::sync::Arc;

use async_trait::async_trait;
use noesis_graph::{
    EngineConfig, GraphError, KnowledgeEngine, RecommendOptions, SearchOptions, SimilarOptions,
    SimilarityMethod,
};
use noesis_llm::{Embedder, LlmError, MockEmbedder, MockGenerator, SharedGenerator};
use noesis_store::{KnowledgeStore, SharedStore, SqliteStore, SuggestionOutcome};
use noesis_types::{KnowledgeNode, NodeId, RelationshipType};
use tokio_util::sync::CancellationToken;

/// An embedder whose provider is always down.
struct UnavailableEmbedder;

#[async_trait]
impl Embedder for UnavailableEmbedder {
    async fn embed(&self, _text: &str) -> noesis_llm::Result<Vec<f32>> {
        Err(LlmError::Network("connection refused".into()))
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

fn store(dims: usize) -> SharedStore {
    Arc::new(SqliteStore::open_in_memory(dims).unwrap())
}

fn engine_with(store: SharedStore, embedder: impl Embedder + 'static) -> KnowledgeEngine {
    KnowledgeEngine::new(store, Arc::new(embedder), EngineConfig::default()).unwrap()
}

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn insert(store: &SharedStore, node: KnowledgeNode) {
    store.insert_node(&node).unwrap();
}

/// Dogs plus three close neighbors, one of them already linked, and an
/// unrelated node.
fn pets_graph() -> SharedStore {
    let store = store(2);
    insert(
        &store,
        KnowledgeNode::new("Dogs", "Domestic animals")
            .with_id("dogs")
            .with_embedding(vec![1.0, 0.0]),
    );
    insert(
        &store,
        KnowledgeNode::new("Labrador", "An example of a dog breed")
            .with_id("lab")
            .with_tag("pets")
            .with_embedding(vec![0.95, 0.05]),
    );
    insert(
        &store,
        KnowledgeNode::new("Poodle", "Curly coat")
            .with_id("poodle")
            .with_tag("pets")
            .with_embedding(vec![0.9, 0.3]),
    );
    insert(
        &store,
        KnowledgeNode::new("Wolf", "Wild ancestor")
            .with_id("wolf")
            .with_embedding(vec![0.99, 0.01]),
    );
    insert(
        &store,
        KnowledgeNode::new("Banana", "Yellow fruit")
            .with_id("banana")
            .with_embedding(vec![0.0, 1.0]),
    );
    store
        .create_edge(&noesis_types::Relationship::new(
            id("wolf"),
            id("dogs"),
            RelationshipType::RelatedTo,
        ))
        .unwrap();
    store
}

#[test]
fn test_find_similar_ranks_by_cosine() {
    let store = store(2);
    insert(&store, KnowledgeNode::new("Paris", "").with_id("1").with_embedding(vec![1.0, 0.0]));
    insert(&store, KnowledgeNode::new("France", "").with_id("2").with_embedding(vec![0.9, 0.1]));
    insert(&store, KnowledgeNode::new("Banana", "").with_id("3").with_embedding(vec![0.0, 1.0]));
    let engine = engine_with(store, MockEmbedder::new(2));

    let results = engine
        .find_similar(&id("1"), &SimilarOptions::new().with_threshold(0.5))
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].node.id, id("2"));
    assert!(results[0].similarity > 0.99);

    let all = engine
        .find_similar(&id("1"), &SimilarOptions::new().with_threshold(0.0))
        .unwrap();
    let ids: Vec<_> = all.iter().map(|r| r.node.id.as_str()).collect();
    assert_eq!(ids, ["2", "3"]);
}

#[tokio::test]
async fn test_semantic_search_threshold_is_monotonic() {
    let engine = engine_with(pets_graph(), MockEmbedder::new(2));

    let everything = engine
        .semantic_search("dog", &SearchOptions::new().with_threshold(0.0).with_limit(100))
        .await
        .unwrap();
    assert_eq!(everything.len(), 5);
    assert!(everything.windows(2).all(|w| w[0].similarity >= w[1].similarity));

    let mut previous = everything.len();
    for threshold in [0.2, 0.4, 0.6, 0.8, 0.95, 1.0] {
        let count = engine
            .semantic_search("dog", &SearchOptions::new().with_threshold(threshold).with_limit(100))
            .await
            .unwrap()
            .len();
        assert!(count <= previous, "threshold {} grew results", threshold);
        previous = count;
    }
}

#[tokio::test]
async fn test_semantic_search_filters_by_tag_and_limit() {
    let engine = engine_with(pets_graph(), MockEmbedder::new(2));

    let pets = engine
        .semantic_search(
            "dog",
            &SearchOptions::new().with_threshold(0.0).with_tags(["pets"]),
        )
        .await
        .unwrap();
    let mut ids: Vec<_> = pets.iter().map(|r| r.node.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, ["lab", "poodle"]);

    let top = engine
        .semantic_search("dog", &SearchOptions::new().with_threshold(0.0).with_limit(2))
        .await
        .unwrap();
    assert_eq!(top.len(), 2);
}

#[tokio::test]
async fn test_unavailable_provider_is_an_error_unless_fallback_requested() {
    let engine = engine_with(pets_graph(), UnavailableEmbedder);

    let err = engine
        .semantic_search("dog breed", &SearchOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Embedding(_)));
    assert!(err.is_transient());

    let results = engine
        .semantic_search("dog breed", &SearchOptions::new().with_lexical_fallback())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].node.id, id("lab"));
    assert_eq!(results[0].method, SimilarityMethod::Lexical);
}

#[tokio::test]
async fn test_cancelled_search_stops() {
    let engine = engine_with(pets_graph(), MockEmbedder::new(2));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine
        .semantic_search_cancellable("dog", &SearchOptions::new(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Cancelled));
}

#[test]
fn test_relationship_validation() {
    let store = pets_graph();
    let engine = engine_with(store, MockEmbedder::new(2));

    assert!(matches!(
        engine.create_relationship(&id("lab"), &id("lab"), RelationshipType::IsA, None, None),
        Err(GraphError::SelfLoop(_))
    ));
    assert!(matches!(
        engine.create_relationship(&id("wolf"), &id("dogs"), RelationshipType::RelatedTo, None, None),
        Err(GraphError::DuplicateEdge { .. })
    ));
    engine
        .create_relationship(&id("dogs"), &id("wolf"), RelationshipType::RelatedTo, None, None)
        .unwrap();
}

#[test]
fn test_graph_analysis_over_components() {
    let store = store(2);
    for name in ["a", "b", "c", "d", "e", "f"] {
        insert(&store, KnowledgeNode::new(name, "").with_id(name));
    }
    let engine = engine_with(store, MockEmbedder::new(2));
    let link = |s: &str, t: &str| {
        engine
            .create_relationship(&id(s), &id(t), RelationshipType::References, None, None)
            .unwrap();
    };
    link("a", "b");
    link("b", "c");
    link("e", "d");

    let clusters = engine.find_clusters(1).unwrap();
    let sizes: Vec<_> = clusters.iter().map(|c| c.size).collect();
    assert_eq!(sizes, [3, 2, 1]);
    assert_eq!(engine.find_clusters(2).unwrap().len(), 2);

    let near = engine.get_node_neighborhood(&id("a"), 1).unwrap();
    assert_eq!(near.len(), 1);
    assert_eq!(near[0].node.id, id("b"));

    let far = engine.get_node_neighborhood(&id("a"), 2).unwrap();
    let reached: Vec<_> = far.iter().map(|e| (e.node.id.as_str(), e.distance)).collect();
    assert_eq!(reached, [("b", 1), ("c", 2)]);
    assert!(engine.get_node_neighborhood(&id("a"), 0).unwrap().is_empty());

    let with_origin = engine.get_node_neighborhood_with_origin(&id("a"), 0).unwrap();
    assert_eq!(with_origin.len(), 1);
    assert_eq!(with_origin[0].distance, 0);

    let bridges = engine.get_bridge_nodes().unwrap();
    assert_eq!(bridges.len(), 1);
    assert_eq!(bridges[0].node.id, id("b"));
    assert_eq!(bridges[0].components_after_removal, 2);

    // Removing a node takes its edges with it.
    assert!(engine.store().delete_node(&id("b")).unwrap());
    assert_eq!(engine.get_node_influence(&id("a")).unwrap().outbound_count, 0);
    assert!(engine.get_bridge_nodes().unwrap().is_empty());
}

#[tokio::test]
async fn test_recommend_accept_and_recommend_again() {
    let engine = engine_with(pets_graph(), MockEmbedder::new(2));

    let suggestions = engine
        .recommend_links(&id("dogs"), &RecommendOptions::new())
        .await
        .unwrap();
    let candidates: Vec<_> = suggestions.iter().map(|s| s.candidate_id.as_str()).collect();
    assert_eq!(candidates, ["lab", "poodle"]);

    let lab = &suggestions[0];
    assert_eq!(lab.relationship_type, RelationshipType::ExampleOf);
    assert!(lab.confidence < 0.95 && lab.confidence > 0.85);
    assert_eq!(lab.explanation, "\"Labrador\" is an example of \"Dogs\"");
    assert_eq!(suggestions[1].relationship_type, RelationshipType::RelatedTo);
    assert!(suggestions.iter().all(|s| s.confidence <= 0.95));

    let edge_id = engine.accept_suggestion(lab).unwrap();
    let edge = engine.store().get_edge(&edge_id).unwrap().unwrap();
    assert_eq!(edge.source_id, id("lab"));
    assert_eq!(edge.target_id, id("dogs"));
    assert_eq!(edge.comment.as_deref(), Some(lab.explanation.as_str()));
    assert!(edge.confidence.is_some());

    assert!(matches!(
        engine.accept_suggestion(lab),
        Err(GraphError::DuplicateEdge { .. })
    ));

    let again = engine
        .recommend_links(&id("dogs"), &RecommendOptions::new())
        .await
        .unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].candidate_id, id("poodle"));

    engine
        .record_suggestion_outcome(&again[0], SuggestionOutcome::Rejected)
        .unwrap();
    assert_eq!(engine.store().stats().unwrap().feedback_count, 2);
}

#[tokio::test]
async fn test_recommend_respects_max_and_threshold() {
    let engine = engine_with(pets_graph(), MockEmbedder::new(2));

    let one = engine
        .recommend_links(&id("dogs"), &RecommendOptions::new().with_max_suggestions(1))
        .await
        .unwrap();
    assert_eq!(one.len(), 1);

    let none = engine
        .recommend_links(&id("banana"), &RecommendOptions::new())
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_generator_explanations_fall_back_on_failure() {
    let generator = Arc::new(MockGenerator::with_reply("A Labrador is a breed of dog."));
    let engine = engine_with(pets_graph(), MockEmbedder::new(2))
        .with_generator(generator.clone() as SharedGenerator);

    let suggestions = engine
        .recommend_links(
            &id("dogs"),
            &RecommendOptions::new().with_max_suggestions(1).with_generator(true),
        )
        .await
        .unwrap();
    assert_eq!(suggestions[0].explanation, "A Labrador is a breed of dog.");
    assert_eq!(generator.requests().len(), 1);

    let engine = engine_with(pets_graph(), MockEmbedder::new(2))
        .with_generator(Arc::new(MockGenerator::failing()));
    let suggestions = engine
        .recommend_links(
            &id("dogs"),
            &RecommendOptions::new().with_max_suggestions(1).with_generator(true),
        )
        .await
        .unwrap();
    assert_eq!(suggestions[0].explanation, "\"Labrador\" is an example of \"Dogs\"");
}
