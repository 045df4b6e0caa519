//! Keyword overlap, used when a node has no embedding.

use std::collections::BTreeSet;

use noesis_llm::strip_html;
use noesis_types::KnowledgeNode;

const MIN_KEYWORD_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "all", "also", "and", "any", "are", "because", "been", "before",
    "being", "between", "both", "but", "can", "could", "did", "does", "doing", "down", "during",
    "each", "few", "for", "from", "further", "had", "has", "have", "having", "her", "here",
    "hers", "him", "his", "how", "into", "its", "just", "more", "most", "nor", "not", "now",
    "off", "once", "only", "other", "our", "ours", "out", "over", "own", "same", "she",
    "should", "some", "such", "than", "that", "the", "their", "theirs", "them", "then",
    "there", "these", "they", "this", "those", "through", "too", "under", "until", "very",
    "was", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
    "with", "would", "you", "your", "yours",
];

/// Lowercase alphanumeric words of three or more characters, minus common
/// English stop words.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Keywords of a node's title, content and tags.
pub fn node_keywords(node: &KnowledgeNode) -> BTreeSet<String> {
    let mut keywords = extract_keywords(&node.title);
    keywords.extend(extract_keywords(&strip_html(&node.content)));
    for tag in &node.tags {
        keywords.extend(extract_keywords(tag));
    }
    keywords
}

/// `|a ∩ b| / |a ∪ b|`, or `0.0` when both sets are empty.
pub fn jaccard_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}
