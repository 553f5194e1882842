pub(crate) mod azure;
pub(crate) mod custom;

use async_trait::async_trait;
pub use azure::{AzureOpenAiChat, AzureOpenAiEmbedding};
pub use custom::{CustomChatModel, CustomEmbeddingModel};
use serde::{Deserialize, Serialize};

use crate::{
    config::AzureOpenAiSettings,
    value::{Embedding, Message, TokenUsage},
};

/// Generates dense vectors for indexing and querying.
#[async_trait]
pub trait EmbeddingModelInference: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Embedding>;

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>>;
}

/// A finished chat completion with the provider's token accounting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Parameters for a single completion call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionConfig {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

/// Generates chat completions from a system+user message list.
#[async_trait]
pub trait ChatModelInference: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        config: &CompletionConfig,
    ) -> anyhow::Result<Completion>;
}

#[derive(Clone, Debug)]
enum EmbeddingModelInner {
    Azure(AzureOpenAiEmbedding),
    Custom(CustomEmbeddingModel),
}

/// Dispatching wrapper over the known embedding model backends.
#[derive(Clone, Debug)]
pub struct EmbeddingModel {
    inner: EmbeddingModelInner,
}

impl EmbeddingModel {
    pub fn new_azure(settings: &AzureOpenAiSettings, retry_attempts: u32) -> anyhow::Result<Self> {
        Ok(Self {
            inner: EmbeddingModelInner::Azure(AzureOpenAiEmbedding::new(settings, retry_attempts)?),
        })
    }

    pub fn new_custom(model: CustomEmbeddingModel) -> Self {
        Self {
            inner: EmbeddingModelInner::Custom(model),
        }
    }
}

#[async_trait]
impl EmbeddingModelInference for EmbeddingModel {
    async fn embed(&self, text: &str) -> anyhow::Result<Embedding> {
        match &self.inner {
            EmbeddingModelInner::Azure(model) => model.embed(text).await,
            EmbeddingModelInner::Custom(model) => model.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>> {
        match &self.inner {
            EmbeddingModelInner::Azure(model) => model.embed_batch(texts).await,
            EmbeddingModelInner::Custom(model) => model.embed_batch(texts).await,
        }
    }
}

#[derive(Clone, Debug)]
enum ChatModelInner {
    Azure(AzureOpenAiChat),
    Custom(CustomChatModel),
}

/// Dispatching wrapper over the known chat model backends.
#[derive(Clone, Debug)]
pub struct ChatModel {
    inner: ChatModelInner,
}

impl ChatModel {
    pub fn new_azure(settings: &AzureOpenAiSettings, retry_attempts: u32) -> anyhow::Result<Self> {
        Ok(Self {
            inner: ChatModelInner::Azure(AzureOpenAiChat::new(settings, retry_attempts)?),
        })
    }

    pub fn new_custom(model: CustomChatModel) -> Self {
        Self {
            inner: ChatModelInner::Custom(model),
        }
    }
}

#[async_trait]
impl ChatModelInference for ChatModel {
    async fn complete(
        &self,
        messages: &[Message],
        config: &CompletionConfig,
    ) -> anyhow::Result<Completion> {
        match &self.inner {
            ChatModelInner::Azure(model) => model.complete(messages, config).await,
            ChatModelInner::Custom(model) => model.complete(messages, config).await,
        }
    }
}
