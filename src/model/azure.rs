use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    config::AzureOpenAiSettings,
    error::FinchError,
    model::{ChatModelInference, Completion, CompletionConfig, EmbeddingModelInference},
    utils::retry_with_backoff,
    value::{Embedding, Message, TokenUsage},
};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

fn deployment_url(
    endpoint: &str,
    deployment: &str,
    operation: &str,
    api_version: &str,
) -> Result<Url, FinchError> {
    let raw = format!(
        "{}/openai/deployments/{}/{}?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        operation,
        api_version
    );
    Url::parse(&raw).map_err(|e| FinchError::Config(format!("bad Azure OpenAI endpoint: {e}")))
}

fn classify_status(status: StatusCode, body: String) -> FinchError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FinchError::Auth {
            service: "azure-openai".to_owned(),
            message: format!("{status}: {body}"),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => FinchError::Transient {
            service: "azure-openai".to_owned(),
            message: format!("{status}: {body}"),
        },
        s if s.is_server_error() => FinchError::Transient {
            service: "azure-openai".to_owned(),
            message: format!("{status}: {body}"),
        },
        _ => FinchError::Model(format!("{status}: {body}")),
    }
}

fn classify_send_error(err: reqwest::Error) -> FinchError {
    if err.is_timeout() || err.is_connect() {
        FinchError::Transient {
            service: "azure-openai".to_owned(),
            message: err.to_string(),
        }
    } else {
        FinchError::Model(err.to_string())
    }
}

fn require_credentials(settings: &AzureOpenAiSettings) -> Result<(), FinchError> {
    if settings.endpoint.is_empty() || settings.api_key.is_empty() {
        return Err(FinchError::Config(
            "Azure OpenAI endpoint and api key must be configured".to_owned(),
        ));
    }
    Ok(())
}

/// Embeddings client for the Azure OpenAI REST surface.
#[derive(Clone, Debug)]
pub struct AzureOpenAiEmbedding {
    client: Client,
    url: Url,
    api_key: String,
    retry_attempts: u32,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsDatum>,
}

#[derive(Deserialize)]
struct EmbeddingsDatum {
    embedding: Embedding,
}

impl AzureOpenAiEmbedding {
    pub fn new(settings: &AzureOpenAiSettings, retry_attempts: u32) -> Result<Self, FinchError> {
        require_credentials(settings)?;
        Ok(Self {
            client: Client::new(),
            url: deployment_url(
                &settings.endpoint,
                &settings.embedding_deployment,
                "embeddings",
                &settings.api_version,
            )?,
            api_key: settings.api_key.clone(),
            retry_attempts,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Embedding>, FinchError> {
        let parsed: EmbeddingsResponse = retry_with_backoff(
            self.retry_attempts,
            RETRY_BASE_DELAY,
            "azure embeddings",
            || async {
                let response = self
                    .client
                    .post(self.url.clone())
                    .header("api-key", &self.api_key)
                    .json(&EmbeddingsRequest { input: texts })
                    .send()
                    .await
                    .map_err(classify_send_error)?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(classify_status(status, body));
                }
                response
                    .json()
                    .await
                    .map_err(|e| FinchError::Model(format!("malformed embeddings response: {e}")))
            },
        )
        .await?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingModelInference for AzureOpenAiEmbedding {
    async fn embed(&self, text: &str) -> anyhow::Result<Embedding> {
        let mut embeddings = self.request(std::slice::from_ref(&text.to_owned())).await?;
        embeddings
            .pop()
            .ok_or_else(|| FinchError::Model("embeddings response was empty".to_owned()).into())
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let embeddings = self.request(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(FinchError::Model(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            ))
            .into());
        }
        Ok(embeddings)
    }
}

/// Chat-completions client for the Azure OpenAI REST surface.
#[derive(Clone, Debug)]
pub struct AzureOpenAiChat {
    client: Client,
    url: Url,
    api_key: String,
    retry_attempts: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<UsagePayload>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct UsagePayload {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl AzureOpenAiChat {
    pub fn new(settings: &AzureOpenAiSettings, retry_attempts: u32) -> Result<Self, FinchError> {
        require_credentials(settings)?;
        Ok(Self {
            client: Client::new(),
            url: deployment_url(
                &settings.endpoint,
                &settings.chat_deployment,
                "chat/completions",
                &settings.api_version,
            )?,
            api_key: settings.api_key.clone(),
            retry_attempts,
        })
    }
}

#[async_trait]
impl ChatModelInference for AzureOpenAiChat {
    async fn complete(
        &self,
        messages: &[Message],
        config: &CompletionConfig,
    ) -> anyhow::Result<Completion> {
        let parsed: ChatResponse = retry_with_backoff(
            self.retry_attempts,
            RETRY_BASE_DELAY,
            "azure chat completion",
            || async {
                let response = self
                    .client
                    .post(self.url.clone())
                    .header("api-key", &self.api_key)
                    .json(&ChatRequest {
                        messages,
                        temperature: config.temperature,
                        max_tokens: config.max_tokens,
                    })
                    .send()
                    .await
                    .map_err(classify_send_error)?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(classify_status(status, body));
                }
                response
                    .json()
                    .await
                    .map_err(|e| FinchError::Model(format!("malformed chat response: {e}")))
            },
        )
        .await?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| FinchError::Model("chat response had no choices".to_owned()))?;
        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();
        Ok(Completion { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AzureOpenAiSettings;

    fn settings() -> AzureOpenAiSettings {
        AzureOpenAiSettings {
            endpoint: "https://example.openai.azure.com".to_owned(),
            api_key: "key".to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn url_includes_deployment_and_api_version() {
        let url = deployment_url(
            "https://example.openai.azure.com/",
            "gpt-4o",
            "chat/completions",
            "2024-02-01",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01"
        );
    }

    #[test]
    fn missing_credentials_fail_at_construction() {
        let mut incomplete = settings();
        incomplete.api_key = String::new();
        assert!(AzureOpenAiChat::new(&incomplete, 3).is_err());
        assert!(AzureOpenAiEmbedding::new(&incomplete, 3).is_err());
        assert!(AzureOpenAiChat::new(&settings(), 3).is_ok());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, String::new()),
            FinchError::Auth { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            FinchError::Transient { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, String::new()),
            FinchError::Transient { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, String::new()),
            FinchError::Model(_)
        ));
    }
}
