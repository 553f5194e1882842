use std::collections::BTreeMap;

use anyhow::bail;
use serde::Serialize;
use serde_json::json;

use crate::{
    model::{EmbeddingModel, EmbeddingModelInference},
    value::{DocumentChunk, Metadata, SearchResult},
    vector_store::{StoreEntry, VectorStore},
};

/// High-level document index: embeds chunks on the way in and maps store
/// records back to [`SearchResult`]s on the way out.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    store: VectorStore,
    embedder: EmbeddingModel,
}

/// Per-file rollup produced by [`DocumentStore::list_documents`].
#[derive(Clone, Debug, Serialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub chunk_count: usize,
    pub file_type: String,
    pub file_size: u64,
    pub upload_timestamp: String,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub total_documents: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub components: BTreeMap<String, String>,
}

impl DocumentStore {
    pub fn new(store: VectorStore, embedder: EmbeddingModel) -> Self {
        Self { store, embedder }
    }

    /// Embeds and upserts a batch of chunks, returning the assigned record
    /// ids. Every chunk must carry a document id before it reaches the store.
    pub async fn add_chunks(&self, chunks: &[DocumentChunk]) -> anyhow::Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(vec![]);
        }
        if let Some(chunk) = chunks.iter().find(|c| c.document_id.is_empty()) {
            bail!("chunk {} has no document id", chunk.chunk_id);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let entries = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoreEntry {
                document: chunk.content.clone(),
                embedding,
                metadata: chunk.store_metadata(),
            })
            .collect();
        let ids = self.store.add_documents(entries).await?;
        log::info!("indexed {} chunks", ids.len());
        Ok(ids)
    }

    /// Similarity search returning results ranked by descending score, with
    /// records under `score_threshold` dropped.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        score_threshold: f32,
        filter: Option<&Metadata>,
    ) -> anyhow::Result<Vec<SearchResult>> {
        let embedding = self.embedder.embed(query).await?;
        let records = self
            .store
            .query(embedding, max_results, score_threshold, filter)
            .await?;
        let mut results: Vec<SearchResult> = records
            .into_iter()
            .map(|record| {
                let source = record
                    .metadata
                    .get("filename")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_owned();
                let chunk_id = record
                    .metadata
                    .get("chunk_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_owned);
                SearchResult {
                    content: record.document,
                    source,
                    score: record.score,
                    metadata: record.metadata,
                    chunk_id,
                }
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }

    /// Groups stored chunk metadata by filename into per-document summaries.
    pub async fn list_documents(&self) -> anyhow::Result<Vec<DocumentSummary>> {
        let metadatas = self.store.all_metadata().await?;
        let mut by_file: BTreeMap<String, DocumentSummary> = BTreeMap::new();
        for meta in metadatas {
            let filename = meta
                .get("filename")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_owned();
            let summary = by_file
                .entry(filename.clone())
                .or_insert_with(|| DocumentSummary {
                    filename,
                    chunk_count: 0,
                    file_type: meta
                        .get("file_type")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown")
                        .to_owned(),
                    file_size: meta.get("file_size").and_then(|v| v.as_u64()).unwrap_or(0),
                    upload_timestamp: meta
                        .get("upload_timestamp")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown")
                        .to_owned(),
                });
            summary.chunk_count += 1;
        }
        Ok(by_file.into_values().collect())
    }

    /// Removes every chunk of the named document. Returns how many records
    /// were deleted.
    pub async fn delete_document(&self, filename: &str) -> anyhow::Result<usize> {
        let mut filter = Metadata::new();
        filter.insert("filename".into(), json!(filename));
        let removed = self.store.delete_by_metadata(&filter).await?;
        log::info!("deleted {removed} chunks of {filename}");
        Ok(removed)
    }

    pub async fn stats(&self) -> anyhow::Result<StoreStats> {
        let total_chunks = self.store.count().await?;
        let total_documents = self.list_documents().await?.len();
        Ok(StoreStats {
            total_chunks,
            total_documents,
        })
    }

    /// Probes the store and the embedding model, reporting per-component
    /// status rather than failing on the first unhealthy one.
    pub async fn health_check(&self) -> HealthStatus {
        let mut components = BTreeMap::new();
        let store_ok = match self.store.heartbeat().await {
            Ok(()) => {
                components.insert("vector_store".to_owned(), "ok".to_owned());
                true
            }
            Err(e) => {
                components.insert("vector_store".to_owned(), format!("error: {e}"));
                false
            }
        };
        let embed_ok = match self.embedder.embed("ping").await {
            Ok(_) => {
                components.insert("embedding_model".to_owned(), "ok".to_owned());
                true
            }
            Err(e) => {
                components.insert("embedding_model".to_owned(), format!("error: {e}"));
                false
            }
        };
        HealthStatus {
            healthy: store_ok && embed_ok,
            components,
        }
    }

    pub fn vector_store(&self) -> &VectorStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::{
        model::CustomEmbeddingModel,
        value::{FileType, ProcessingStatus},
    };

    fn keyword_embedder() -> EmbeddingModel {
        // Embeds a text as keyword-presence counts so similarity behaves
        // predictably in tests.
        EmbeddingModel::new_custom(CustomEmbeddingModel::new(Arc::new(|text| {
            Box::pin(async move {
                let lower = text.to_lowercase();
                Ok(vec![
                    lower.matches("vacation").count() as f32,
                    lower.matches("expense").count() as f32,
                    1.0,
                ])
            })
        })))
    }

    fn chunk(content: &str, source: &str, index: usize, count: usize) -> DocumentChunk {
        DocumentChunk {
            content: content.into(),
            chunk_id: format!("{source}_{index}"),
            chunk_index: index,
            chunk_count: count,
            source: source.into(),
            document_id: "doc-1".into(),
            file_type: FileType::Txt,
            file_size: content.len() as u64,
            upload_timestamp: Utc::now(),
            status: ProcessingStatus::Completed,
            metadata: Metadata::new(),
        }
    }

    fn store() -> DocumentStore {
        DocumentStore::new(VectorStore::new_memory(), keyword_embedder())
    }

    #[tokio::test]
    async fn add_then_search_finds_relevant_chunk() -> anyhow::Result<()> {
        let store = store();
        store
            .add_chunks(&[
                chunk("Employees receive 15 vacation days.", "handbook.txt", 0, 2),
                chunk("Expense reports are due monthly.", "handbook.txt", 1, 2),
            ])
            .await?;

        let results = store
            .search("how much vacation do I get", 5, 0.2, None)
            .await?;
        assert!(!results.is_empty());
        assert!(results[0].content.contains("vacation"));
        assert_eq!(results[0].source, "handbook.txt");
        assert_eq!(results[0].chunk_id.as_deref(), Some("handbook.txt_0"));
        Ok(())
    }

    #[tokio::test]
    async fn empty_document_id_is_rejected() {
        let store = store();
        let mut bad = chunk("text", "a.txt", 0, 1);
        bad.document_id.clear();
        assert!(store.add_chunks(&[bad]).await.is_err());
    }

    #[tokio::test]
    async fn list_and_delete_by_filename() -> anyhow::Result<()> {
        let store = store();
        store
            .add_chunks(&[
                chunk("vacation one", "a.txt", 0, 2),
                chunk("vacation two", "a.txt", 1, 2),
                chunk("expense", "b.txt", 0, 1),
            ])
            .await?;

        let docs = store.list_documents().await?;
        assert_eq!(docs.len(), 2);
        let a = docs.iter().find(|d| d.filename == "a.txt").unwrap();
        assert_eq!(a.chunk_count, 2);
        assert_eq!(a.file_type, "txt");

        let stats = store.stats().await?;
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.total_documents, 2);

        assert_eq!(store.delete_document("a.txt").await?, 2);
        let stats = store.stats().await?;
        assert_eq!(stats.total_chunks, 1);
        assert_eq!(stats.total_documents, 1);
        Ok(())
    }

    #[tokio::test]
    async fn health_reports_components() {
        let status = store().health_check().await;
        assert!(status.healthy);
        assert_eq!(status.components["vector_store"], "ok");
        assert_eq!(status.components["embedding_model"], "ok");
    }
}
