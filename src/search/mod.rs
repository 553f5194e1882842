use crate::{
    document::DocumentStore,
    error::FinchError,
    model::{ChatModel, ChatModelInference, CompletionConfig},
    utils::truncate_for_log,
    value::{Message, ProcessingMode, RagQuery, RagResponse, SearchResult, TokenUsage},
};

const DOCUMENT_PROMPT: &str = "You are a helpful assistant. Answer the question using ONLY the \
provided document excerpts. If the excerpts do not contain the answer, say so plainly. Cite the \
source filename of any excerpt you rely on.";

const HYBRID_PROMPT: &str = "You are a helpful assistant. Prefer the provided document excerpts \
when they are relevant, and supplement with your own knowledge where they fall short. Make clear \
which parts of the answer come from the documents.";

const GENERAL_PROMPT: &str = "You are a helpful assistant. No relevant documents were found for \
this question; answer from your own knowledge and say that the answer is not based on the \
uploaded documents.";

const NO_CONTEXT_ANSWER: &str = "I couldn't find anything relevant in the uploaded documents. \
Try rephrasing the question, or upload documents that cover this topic.";

/// Retrieval-augmented answering over a [`DocumentStore`].
///
/// `search_and_generate` always returns a [`RagResponse`]; failures become a
/// response in [`ProcessingMode::Error`] with a user-facing message rather
/// than an `Err`, so callers can render every outcome the same way.
#[derive(Clone, Debug)]
pub struct SearchService {
    store: DocumentStore,
    chat: ChatModel,
    config: CompletionConfig,
}

impl SearchService {
    pub fn new(store: DocumentStore, chat: ChatModel) -> Self {
        Self {
            store,
            chat,
            config: CompletionConfig::default(),
        }
    }

    pub fn with_completion_config(mut self, config: CompletionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub async fn search_and_generate(&self, query: &RagQuery) -> RagResponse {
        match self.try_search_and_generate(query).await {
            Ok(response) => response,
            Err(err) => {
                log::error!("query failed: {err:#}");
                let message = match err.downcast::<FinchError>() {
                    Ok(finch) => finch.user_facing_message(),
                    Err(other) => format!("Something went wrong: {other}"),
                };
                RagResponse {
                    answer: message,
                    results: vec![],
                    mode: ProcessingMode::Error,
                    confidence: 0.0,
                    usage: TokenUsage::default(),
                }
            }
        }
    }

    async fn try_search_and_generate(&self, query: &RagQuery) -> anyhow::Result<RagResponse> {
        if query.query.trim().is_empty() {
            return Err(FinchError::Validation("query must not be empty".to_owned()).into());
        }
        log::debug!("query: {}", truncate_for_log(&query.query, 120));

        let results = self
            .store
            .search(
                &query.query,
                query.max_results,
                query.score_threshold,
                query.filter.as_ref(),
            )
            .await?;

        let mode = match (results.is_empty(), query.use_general_knowledge) {
            (false, false) => ProcessingMode::DocumentBased,
            (false, true) => ProcessingMode::Hybrid,
            (true, true) => ProcessingMode::GeneralKnowledge,
            (true, false) => {
                // Short-circuit: no retrieval hits and no fallback allowed,
                // so no completion call is made at all.
                return Ok(RagResponse {
                    answer: NO_CONTEXT_ANSWER.to_owned(),
                    results: vec![],
                    mode: ProcessingMode::NoContext,
                    confidence: 0.0,
                    usage: TokenUsage::default(),
                });
            }
        };

        let system = match mode {
            ProcessingMode::DocumentBased => DOCUMENT_PROMPT,
            ProcessingMode::Hybrid => HYBRID_PROMPT,
            _ => GENERAL_PROMPT,
        };
        let user_content = if results.is_empty() {
            query.query.clone()
        } else {
            format!(
                "Document excerpts:\n\n{}\n\nQuestion: {}",
                build_context(&results),
                query.query
            )
        };
        let messages = [Message::system(system), Message::user(user_content)];
        let completion = self.chat.complete(&messages, &self.config).await?;

        let confidence = results
            .iter()
            .map(|r| r.score)
            .fold(0.0_f32, f32::max)
            .clamp(0.0, 1.0);
        Ok(RagResponse {
            answer: completion.text,
            results,
            mode,
            confidence,
            usage: completion.usage,
        })
    }
}

/// Renders retrieved chunks into a numbered, source-attributed context block.
fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[{}] (from {}, score {:.2})\n{}",
                i + 1,
                r.source,
                r.score,
                r.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use chrono::Utc;

    use super::*;
    use crate::{
        model::{Completion, CustomChatModel, CustomEmbeddingModel, EmbeddingModel},
        value::{DocumentChunk, FileType, Metadata, ProcessingStatus},
        vector_store::VectorStore,
    };

    fn keyword_embedder() -> EmbeddingModel {
        EmbeddingModel::new_custom(CustomEmbeddingModel::new(Arc::new(|text| {
            Box::pin(async move {
                let lower = text.to_lowercase();
                Ok(vec![
                    lower.matches("vacation").count() as f32,
                    lower.matches("parking").count() as f32,
                    1.0,
                ])
            })
        })))
    }

    fn counting_chat(calls: Arc<AtomicUsize>) -> ChatModel {
        ChatModel::new_custom(CustomChatModel::new(Arc::new(move |messages, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
                Ok(Completion {
                    text: format!("answered from: {}", truncate_for_log(&user, 60)),
                    usage: TokenUsage {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                        total_tokens: 15,
                    },
                })
            })
        })))
    }

    fn chunk(content: &str, source: &str, index: usize) -> DocumentChunk {
        DocumentChunk {
            content: content.into(),
            chunk_id: format!("{source}_{index}"),
            chunk_index: index,
            chunk_count: 1,
            source: source.into(),
            document_id: "doc-1".into(),
            file_type: FileType::Txt,
            file_size: content.len() as u64,
            upload_timestamp: Utc::now(),
            status: ProcessingStatus::Completed,
            metadata: Metadata::new(),
        }
    }

    async fn service_with_handbook(calls: Arc<AtomicUsize>) -> SearchService {
        let store = DocumentStore::new(VectorStore::new_memory(), keyword_embedder());
        store
            .add_chunks(&[
                chunk("Employees receive 15 vacation days per year.", "handbook.md", 0),
                chunk("Parking passes are issued at the front desk.", "handbook.md", 1),
            ])
            .await
            .unwrap();
        SearchService::new(store, counting_chat(calls))
    }

    #[tokio::test]
    async fn matching_documents_produce_document_based_answer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = service_with_handbook(calls.clone()).await;

        let response = service
            .search_and_generate(&RagQuery::new("how many vacation days do I get?"))
            .await;
        assert_eq!(response.mode, ProcessingMode::DocumentBased);
        assert!(!response.results.is_empty());
        assert!(response.results[0].content.contains("vacation"));
        assert_eq!(response.sources(), vec!["handbook.md"]);
        assert!(response.confidence > 0.2);
        assert_eq!(response.usage.total_tokens, 15);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hybrid_mode_when_fallback_allowed_and_context_found() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = service_with_handbook(calls.clone()).await;

        let response = service
            .search_and_generate(
                &RagQuery::new("vacation policy?").with_general_knowledge(true),
            )
            .await;
        assert_eq!(response.mode, ProcessingMode::Hybrid);
        assert!(!response.results.is_empty());
    }

    #[tokio::test]
    async fn empty_store_with_fallback_uses_general_knowledge() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = DocumentStore::new(VectorStore::new_memory(), keyword_embedder());
        let service = SearchService::new(store, counting_chat(calls.clone()));

        let response = service
            .search_and_generate(&RagQuery::new("vacation?").with_general_knowledge(true))
            .await;
        assert_eq!(response.mode, ProcessingMode::GeneralKnowledge);
        assert!(response.results.is_empty());
        assert_eq!(response.confidence, 0.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_context_short_circuits_without_a_completion_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = DocumentStore::new(VectorStore::new_memory(), keyword_embedder());
        let service = SearchService::new(store, counting_chat(calls.clone()));

        let response = service.search_and_generate(&RagQuery::new("vacation?")).await;
        assert_eq!(response.mode, ProcessingMode::NoContext);
        assert_eq!(response.answer, NO_CONTEXT_ANSWER);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn max_results_caps_retrieval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = DocumentStore::new(VectorStore::new_memory(), keyword_embedder());
        let chunks: Vec<DocumentChunk> = (0..10)
            .map(|i| chunk(&format!("vacation note number {i}"), "notes.txt", i))
            .collect();
        store.add_chunks(&chunks).await.unwrap();
        let service = SearchService::new(store, counting_chat(calls));

        let response = service
            .search_and_generate(&RagQuery::new("vacation").with_max_results(3))
            .await;
        assert_eq!(response.results.len(), 3);
        for pair in response.results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn configured_completion_settings_reach_the_model() {
        let seen = Arc::new(std::sync::Mutex::new(None::<CompletionConfig>));
        let seen2 = seen.clone();
        let chat = ChatModel::new_custom(CustomChatModel::new(Arc::new(move |_, config| {
            *seen2.lock().unwrap() = Some(config);
            Box::pin(async move {
                Ok(Completion {
                    text: "ok".to_owned(),
                    usage: TokenUsage::default(),
                })
            })
        })));
        let store = DocumentStore::new(VectorStore::new_memory(), keyword_embedder());
        store
            .add_chunks(&[chunk("vacation accrual rules", "handbook.md", 0)])
            .await
            .unwrap();
        let service = SearchService::new(store, chat).with_completion_config(CompletionConfig {
            temperature: 0.9,
            max_tokens: 77,
        });

        let response = service.search_and_generate(&RagQuery::new("vacation")).await;
        assert_eq!(response.mode, ProcessingMode::DocumentBased);
        let config = seen.lock().unwrap().expect("completion was called");
        assert_eq!(config.temperature, 0.9);
        assert_eq!(config.max_tokens, 77);
    }

    #[tokio::test]
    async fn empty_query_becomes_error_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = service_with_handbook(calls.clone()).await;

        let response = service.search_and_generate(&RagQuery::new("   ")).await;
        assert_eq!(response.mode, ProcessingMode::Error);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!response.answer.is_empty());
    }
}
