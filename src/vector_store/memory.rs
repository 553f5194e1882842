use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    value::{Embedding, Metadata},
    vector_store::base::{ScoredRecord, StoreEntry, VectorStoreBehavior, metadata_matches},
};

/// In-process vector store doing brute-force cosine similarity. Used for
/// tests and for running without a Chroma server.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<MemoryRecord>,
}

#[derive(Debug, Clone)]
struct MemoryRecord {
    id: String,
    document: String,
    embedding: Embedding,
    metadata: Metadata,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStoreBehavior for MemoryStore {
    async fn add_documents(&mut self, entries: Vec<StoreEntry>) -> anyhow::Result<Vec<String>> {
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = Uuid::new_v4().to_string();
            ids.push(id.clone());
            self.records.push(MemoryRecord {
                id,
                document: entry.document,
                embedding: entry.embedding,
                metadata: entry.metadata,
            });
        }
        Ok(ids)
    }

    async fn query(
        &self,
        embedding: Embedding,
        top_k: usize,
        min_score: f32,
        filter: Option<&Metadata>,
    ) -> anyhow::Result<Vec<ScoredRecord>> {
        let mut scored: Vec<ScoredRecord> = self
            .records
            .iter()
            .filter(|r| filter.is_none_or(|f| metadata_matches(&r.metadata, f)))
            .map(|r| ScoredRecord {
                id: r.id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
                score: cosine_similarity(&r.embedding, &embedding),
            })
            .filter(|r| r.score >= min_score)
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_by_metadata(&mut self, filter: &Metadata) -> anyhow::Result<usize> {
        if filter.is_empty() {
            return Ok(0);
        }
        let before = self.records.len();
        self.records.retain(|r| !metadata_matches(&r.metadata, filter));
        Ok(before - self.records.len())
    }

    async fn delete_by_ids(&mut self, ids: &[&str]) -> anyhow::Result<()> {
        self.records.retain(|r| !ids.contains(&r.id.as_str()));
        Ok(())
    }

    async fn all_metadata(&self) -> anyhow::Result<Vec<Metadata>> {
        Ok(self.records.iter().map(|r| r.metadata.clone()).collect())
    }

    async fn count(&self) -> anyhow::Result<usize> {
        Ok(self.records.len())
    }

    async fn heartbeat(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn clear(&mut self) -> anyhow::Result<()> {
        self.records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(document: &str, embedding: Vec<f32>, filename: &str) -> StoreEntry {
        let mut metadata = Metadata::new();
        metadata.insert("filename".into(), json!(filename));
        StoreEntry {
            document: document.into(),
            embedding,
            metadata,
        }
    }

    #[tokio::test]
    async fn query_ranks_by_similarity() -> anyhow::Result<()> {
        let mut store = MemoryStore::new();
        store
            .add_documents(vec![
                entry("one", vec![1.0, 0.0], "a.txt"),
                entry("two", vec![0.0, 1.0], "b.txt"),
                entry("one-ish", vec![0.9, 0.1], "a.txt"),
            ])
            .await?;

        let results = store.query(vec![1.0, 0.0], 2, 0.0, None).await?;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document, "one");
        assert_eq!(results[1].document, "one-ish");
        assert!(results[0].score >= results[1].score);
        Ok(())
    }

    #[tokio::test]
    async fn threshold_and_filter_apply() -> anyhow::Result<()> {
        let mut store = MemoryStore::new();
        store
            .add_documents(vec![
                entry("one", vec![1.0, 0.0], "a.txt"),
                entry("two", vec![0.0, 1.0], "b.txt"),
            ])
            .await?;

        // Orthogonal vector scores 0.0 and falls under the threshold.
        let results = store.query(vec![1.0, 0.0], 10, 0.5, None).await?;
        assert_eq!(results.len(), 1);

        let mut filter = Metadata::new();
        filter.insert("filename".into(), json!("b.txt"));
        let results = store.query(vec![1.0, 0.0], 10, -1.0, Some(&filter)).await?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document, "two");
        Ok(())
    }

    #[tokio::test]
    async fn delete_by_metadata_reports_removed_count() -> anyhow::Result<()> {
        let mut store = MemoryStore::new();
        store
            .add_documents(vec![
                entry("one", vec![1.0], "a.txt"),
                entry("two", vec![1.0], "a.txt"),
                entry("three", vec![1.0], "b.txt"),
            ])
            .await?;

        let mut filter = Metadata::new();
        filter.insert("filename".into(), json!("a.txt"));
        assert_eq!(store.delete_by_metadata(&filter).await?, 2);
        assert_eq!(store.count().await?, 1);

        // An empty filter must not wipe the store.
        assert_eq!(store.delete_by_metadata(&Metadata::new()).await?, 0);
        assert_eq!(store.count().await?, 1);
        Ok(())
    }
}
