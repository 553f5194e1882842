use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{
    model::{ChatModelInference, Completion, CompletionConfig, EmbeddingModelInference},
    value::{Embedding, Message},
};

pub type CustomEmbedFunc = dyn Fn(String) -> BoxFuture<'static, anyhow::Result<Embedding>> + Send + Sync;

pub type CustomCompleteFunc = dyn Fn(Vec<Message>, CompletionConfig) -> BoxFuture<'static, anyhow::Result<Completion>>
    + Send
    + Sync;

/// An embedding model backed by a caller-supplied async function. The test
/// seam for everything that needs embeddings without a provider.
#[derive(Clone)]
pub struct CustomEmbeddingModel {
    f: Arc<CustomEmbedFunc>,
}

impl Debug for CustomEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomEmbeddingModel")
            .field("f", &"function")
            .finish()
    }
}

impl CustomEmbeddingModel {
    pub fn new(f: Arc<CustomEmbedFunc>) -> Self {
        Self { f }
    }
}

#[async_trait]
impl EmbeddingModelInference for CustomEmbeddingModel {
    async fn embed(&self, text: &str) -> anyhow::Result<Embedding> {
        (self.f)(text.to_owned()).await
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push((self.f)(text.clone()).await?);
        }
        Ok(out)
    }
}

/// A chat model backed by a caller-supplied async function.
#[derive(Clone)]
pub struct CustomChatModel {
    f: Arc<CustomCompleteFunc>,
}

impl Debug for CustomChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomChatModel")
            .field("f", &"function")
            .finish()
    }
}

impl CustomChatModel {
    pub fn new(f: Arc<CustomCompleteFunc>) -> Self {
        Self { f }
    }
}

#[async_trait]
impl ChatModelInference for CustomChatModel {
    async fn complete(
        &self,
        messages: &[Message],
        config: &CompletionConfig,
    ) -> anyhow::Result<Completion> {
        (self.f)(messages.to_vec(), *config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{ChatModel, EmbeddingModel},
        value::TokenUsage,
    };

    #[tokio::test]
    async fn custom_embedding_round_trips() -> anyhow::Result<()> {
        let model = EmbeddingModel::new_custom(CustomEmbeddingModel::new(Arc::new(|text| {
            Box::pin(async move { Ok(vec![text.len() as f32, 1.0]) })
        })));
        assert_eq!(model.embed("abcd").await?, vec![4.0, 1.0]);
        let batch = model
            .embed_batch(&["a".to_owned(), "bb".to_owned()])
            .await?;
        assert_eq!(batch, vec![vec![1.0, 1.0], vec![2.0, 1.0]]);
        Ok(())
    }

    #[tokio::test]
    async fn custom_chat_sees_messages() -> anyhow::Result<()> {
        let model = ChatModel::new_custom(CustomChatModel::new(Arc::new(|messages, _| {
            Box::pin(async move {
                Ok(Completion {
                    text: format!("saw {} messages", messages.len()),
                    usage: TokenUsage::default(),
                })
            })
        })));
        let out = model
            .complete(
                &[Message::system("s"), Message::user("u")],
                &CompletionConfig::default(),
            )
            .await?;
        assert_eq!(out.text, "saw 2 messages");
        Ok(())
    }
}
