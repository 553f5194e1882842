pub(crate) mod base;
pub(crate) mod chroma;
pub(crate) mod memory;

use std::sync::Arc;

pub use base::{ScoredRecord, StoreEntry, VectorStoreBehavior};
pub use chroma::ChromaStore;
use futures::lock::Mutex;
pub use memory::MemoryStore;

use crate::{
    config::ChromaSettings,
    value::{Embedding, Metadata},
};

#[derive(Clone, Debug)]
enum VectorStoreInner {
    Chroma(Arc<Mutex<ChromaStore>>),
    Memory(Arc<Mutex<MemoryStore>>),
}

/// Dispatching wrapper over the known vector store backends.
#[derive(Clone, Debug)]
pub struct VectorStore {
    inner: VectorStoreInner,
}

impl VectorStore {
    pub async fn new_chroma(settings: &ChromaSettings, retry_attempts: u32) -> anyhow::Result<Self> {
        let store = ChromaStore::new(settings, retry_attempts).await?;
        Ok(Self {
            inner: VectorStoreInner::Chroma(Arc::new(Mutex::new(store))),
        })
    }

    pub fn new_memory() -> Self {
        Self {
            inner: VectorStoreInner::Memory(Arc::new(Mutex::new(MemoryStore::new()))),
        }
    }

    pub async fn add_documents(&self, entries: Vec<StoreEntry>) -> anyhow::Result<Vec<String>> {
        match &self.inner {
            VectorStoreInner::Chroma(inner) => inner.lock().await.add_documents(entries).await,
            VectorStoreInner::Memory(inner) => inner.lock().await.add_documents(entries).await,
        }
    }

    pub async fn query(
        &self,
        embedding: Embedding,
        top_k: usize,
        min_score: f32,
        filter: Option<&Metadata>,
    ) -> anyhow::Result<Vec<ScoredRecord>> {
        match &self.inner {
            VectorStoreInner::Chroma(inner) => {
                inner
                    .lock()
                    .await
                    .query(embedding, top_k, min_score, filter)
                    .await
            }
            VectorStoreInner::Memory(inner) => {
                inner
                    .lock()
                    .await
                    .query(embedding, top_k, min_score, filter)
                    .await
            }
        }
    }

    pub async fn delete_by_metadata(&self, filter: &Metadata) -> anyhow::Result<usize> {
        match &self.inner {
            VectorStoreInner::Chroma(inner) => inner.lock().await.delete_by_metadata(filter).await,
            VectorStoreInner::Memory(inner) => inner.lock().await.delete_by_metadata(filter).await,
        }
    }

    pub async fn delete_by_ids(&self, ids: &[&str]) -> anyhow::Result<()> {
        match &self.inner {
            VectorStoreInner::Chroma(inner) => inner.lock().await.delete_by_ids(ids).await,
            VectorStoreInner::Memory(inner) => inner.lock().await.delete_by_ids(ids).await,
        }
    }

    pub async fn all_metadata(&self) -> anyhow::Result<Vec<Metadata>> {
        match &self.inner {
            VectorStoreInner::Chroma(inner) => inner.lock().await.all_metadata().await,
            VectorStoreInner::Memory(inner) => inner.lock().await.all_metadata().await,
        }
    }

    pub async fn count(&self) -> anyhow::Result<usize> {
        match &self.inner {
            VectorStoreInner::Chroma(inner) => inner.lock().await.count().await,
            VectorStoreInner::Memory(inner) => inner.lock().await.count().await,
        }
    }

    pub async fn heartbeat(&self) -> anyhow::Result<()> {
        match &self.inner {
            VectorStoreInner::Chroma(inner) => inner.lock().await.heartbeat().await,
            VectorStoreInner::Memory(inner) => inner.lock().await.heartbeat().await,
        }
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        match &self.inner {
            VectorStoreInner::Chroma(inner) => inner.lock().await.clear().await,
            VectorStoreInner::Memory(inner) => inner.lock().await.clear().await,
        }
    }
}
