use std::time::Duration;

use async_trait::async_trait;
use chromadb::{
    client::{ChromaClient, ChromaClientOptions},
    collection::{ChromaCollection, CollectionEntries, GetOptions, QueryOptions, QueryResult},
};
use uuid::Uuid;

use crate::{
    config::ChromaSettings,
    error::FinchError,
    utils::retry_with_backoff,
    value::{Embedding, Metadata},
    vector_store::base::{
        ScoredRecord, StoreEntry, VectorStoreBehavior, filter_to_where_clause,
    },
};

const INIT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Vector store backed by a Chroma server collection.
///
/// Collection initialization and insertion go through bounded
/// exponential-backoff retry; Chroma itself handles persistence, so there is
/// no explicit flush here.
pub struct ChromaStore {
    collection: ChromaCollection,
    batch_size: usize,
    retry_attempts: u32,
}

impl std::fmt::Debug for ChromaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromaStore")
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

fn store_err(e: anyhow::Error) -> FinchError {
    FinchError::Transient {
        service: "chroma".to_owned(),
        message: e.to_string(),
    }
}

impl ChromaStore {
    pub async fn new(settings: &ChromaSettings, retry_attempts: u32) -> anyhow::Result<Self> {
        let url = settings.url.clone();
        let name = settings.collection.clone();
        let collection = retry_with_backoff(
            retry_attempts,
            INIT_RETRY_DELAY,
            "chroma collection init",
            || {
                let url = url.clone();
                let name = name.clone();
                async move {
                    let client = ChromaClient::new(ChromaClientOptions {
                        url: Some(url),
                        ..Default::default()
                    })
                    .await
                    .map_err(store_err)?;
                    client
                        .get_or_create_collection(&name, None)
                        .await
                        .map_err(store_err)
                }
            },
        )
        .await?;
        Ok(Self {
            collection,
            batch_size: settings.insert_batch_size.max(1),
            retry_attempts,
        })
    }

    async fn upsert_batch(&self, batch: &[StoreEntry], ids: &[String]) -> anyhow::Result<()> {
        retry_with_backoff(
            self.retry_attempts,
            INIT_RETRY_DELAY,
            "chroma upsert",
            || async {
                let entries = CollectionEntries {
                    ids: ids.iter().map(|id| id.as_str()).collect(),
                    embeddings: Some(batch.iter().map(|e| e.embedding.clone()).collect()),
                    documents: Some(batch.iter().map(|e| e.document.as_str()).collect()),
                    metadatas: Some(batch.iter().map(|e| e.metadata.clone()).collect()),
                };
                self.collection
                    .upsert(entries, None)
                    .await
                    .map(|_| ())
                    .map_err(store_err)
            },
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStoreBehavior for ChromaStore {
    async fn add_documents(&mut self, entries: Vec<StoreEntry>) -> anyhow::Result<Vec<String>> {
        let ids: Vec<String> = (0..entries.len())
            .map(|_| Uuid::new_v4().to_string())
            .collect();
        for (batch, batch_ids) in entries.chunks(self.batch_size).zip(ids.chunks(self.batch_size))
        {
            self.upsert_batch(batch, batch_ids).await?;
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
        let opts = QueryOptions {
            query_embeddings: Some(vec![embedding]),
            n_results: Some(top_k),
            where_metadata: filter.and_then(filter_to_where_clause),
            ..Default::default()
        };
        let QueryResult {
            ids,
            documents,
            metadatas,
            distances,
            ..
        } = self.collection.query(opts, None).await?;

        let Some(ids_vec) = ids.first() else {
            return Ok(vec![]);
        };
        let Some(distances_vec) = distances.as_ref().and_then(|d| d.first()) else {
            return Ok(vec![]);
        };

        let out = ids_vec
            .iter()
            .zip(distances_vec)
            .enumerate()
            .filter_map(|(i, (id, &distance))| {
                // Chroma reports distances; flip into a higher-is-better score.
                let score = 1.0 - distance;
                if score < min_score {
                    return None;
                }
                let document = documents
                    .as_ref()
                    .and_then(|d| d.first()?.get(i).cloned())
                    .unwrap_or_default();
                let metadata = metadatas
                    .as_ref()
                    .and_then(|m| m.first()?.get(i).cloned())
                    .flatten()
                    .unwrap_or_default();
                Some(ScoredRecord {
                    id: id.clone(),
                    document,
                    metadata,
                    score,
                })
            })
            .collect();
        Ok(out)
    }

    async fn delete_by_metadata(&mut self, filter: &Metadata) -> anyhow::Result<usize> {
        let Some(where_clause) = filter_to_where_clause(filter) else {
            return Ok(0);
        };
        let before = self.collection.count().await?;
        self.collection
            .delete(None, Some(where_clause), None)
            .await?;
        let after = self.collection.count().await?;
        Ok(before.saturating_sub(after))
    }

    async fn delete_by_ids(&mut self, ids: &[&str]) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.collection.delete(Some(ids.to_vec()), None, None).await?;
        Ok(())
    }

    async fn all_metadata(&self) -> anyhow::Result<Vec<Metadata>> {
        let opts = GetOptions {
            include: Some(vec!["metadatas".to_owned()]),
            ..Default::default()
        };
        let results = self.collection.get(opts).await?;
        let metadatas = results.metadatas.unwrap_or_default();
        Ok(metadatas.into_iter().flatten().collect())
    }

    async fn count(&self) -> anyhow::Result<usize> {
        Ok(self.collection.count().await?)
    }

    async fn heartbeat(&self) -> anyhow::Result<()> {
        // count() doubles as the reachability probe; it exercises the same
        // server path a query would.
        self.collection.count().await?;
        Ok(())
    }

    async fn clear(&mut self) -> anyhow::Result<()> {
        let all = self.collection.get(GetOptions::default()).await?;
        if !all.ids.is_empty() {
            self.collection
                .delete(
                    Some(all.ids.iter().map(|s| s.as_str()).collect()),
                    None,
                    None,
                )
                .await?;
        }
        Ok(())
    }
}
