use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::value::{Metadata, TokenUsage};

/// One retrieved chunk with its relevance score. Produced per query, never
/// persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub source: String,
    /// Similarity score, higher is better. Threshold-filtered upstream.
    pub score: f32,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
}

/// How a response was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingMode {
    /// Answer grounded purely in retrieved documents.
    DocumentBased,
    /// Retrieved context blended with the model's own knowledge.
    Hybrid,
    /// No usable context; the model answered from general knowledge.
    GeneralKnowledge,
    /// No context found and general knowledge was not allowed; canned reply.
    NoContext,
    Error,
}

/// A retrieval-augmented query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RagQuery {
    pub query: String,
    pub max_results: usize,
    pub score_threshold: f32,
    /// When no documents match, fall back to the model's own knowledge
    /// instead of returning the canned no-context reply.
    pub use_general_knowledge: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Metadata>,
}

impl RagQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: 5,
            score_threshold: 0.2,
            use_general_knowledge: false,
            filter: None,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    pub fn with_general_knowledge(mut self, allowed: bool) -> Self {
        self.use_general_knowledge = allowed;
        self
    }

    pub fn with_filter(mut self, filter: Metadata) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// The generated answer plus everything needed to attribute it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RagResponse {
    pub answer: String,
    pub results: Vec<SearchResult>,
    pub mode: ProcessingMode,
    /// Max retrieved score clamped to [0, 1]; 0.0 when nothing was retrieved.
    pub confidence: f32,
    pub usage: TokenUsage,
}

impl RagResponse {
    /// Distinct source filenames of the retrieved context, in score order.
    pub fn sources(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for result in &self.results {
            if !seen.contains(&result.source) {
                seen.push(result.source.clone());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_serializes_snake_case() {
        assert_eq!(ProcessingMode::DocumentBased.to_string(), "document_based");
        assert_eq!(
            ProcessingMode::GeneralKnowledge.to_string(),
            "general_knowledge"
        );
        assert_eq!(ProcessingMode::NoContext.to_string(), "no_context");
    }

    #[test]
    fn sources_are_deduplicated_in_order() {
        let mk = |source: &str, score: f32| SearchResult {
            content: String::new(),
            source: source.into(),
            score,
            metadata: Metadata::new(),
            chunk_id: None,
        };
        let response = RagResponse {
            answer: String::new(),
            results: vec![mk("a.pdf", 0.9), mk("b.txt", 0.8), mk("a.pdf", 0.7)],
            mode: ProcessingMode::DocumentBased,
            confidence: 0.9,
            usage: TokenUsage::default(),
        };
        assert_eq!(response.sources(), vec!["a.pdf", "b.txt"]);
    }
}
