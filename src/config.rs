use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FinchError;

/// Top-level application settings.
///
/// Built once at startup (from defaults, a JSON file or the environment) and
/// passed into constructors explicitly. Nothing in this crate reads the
/// environment at import/first-use time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub azure: AzureOpenAiSettings,
    pub chroma: ChromaSettings,
    pub documents: DocumentSettings,
    pub availability: AvailabilitySettings,
    pub tools: ToolSettings,
    pub external: ExternalApiSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AzureOpenAiSettings {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub chat_deployment: String,
    pub embedding_deployment: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for AzureOpenAiSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: "2024-02-01".to_owned(),
            chat_deployment: "gpt-4o".to_owned(),
            embedding_deployment: "text-embedding-3-small".to_owned(),
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChromaSettings {
    pub url: String,
    pub collection: String,
    /// Upserts are sent to the server in groups of this many chunks.
    pub insert_batch_size: usize,
}

impl Default for ChromaSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_owned(),
            collection: "finch_documents".to_owned(),
            insert_batch_size: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentSettings {
    pub max_file_size_bytes: u64,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 10 * 1024 * 1024,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AvailabilitySettings {
    /// How long a probed result (positive *or* negative) stays fresh.
    pub cache_ttl_secs: u64,
    /// Per-probe network timeout, independent of the TTL.
    pub probe_timeout_secs: u64,
}

impl Default for AvailabilitySettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            probe_timeout_secs: 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolSettings {
    /// Soft per-tool execution timeout.
    pub execution_timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            execution_timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalApiSettings {
    pub fdic_base_url: String,
    pub call_report_base_url: String,
    pub ratings_base_url: String,
    pub response_cache_ttl_secs: u64,
    pub retry_attempts: u32,
}

impl Default for ExternalApiSettings {
    fn default() -> Self {
        Self {
            fdic_base_url: "https://banks.data.fdic.gov/api".to_owned(),
            call_report_base_url: "https://cdr.ffiec.gov/public".to_owned(),
            ratings_base_url: "https://api.ratings.example.com/v1".to_owned(),
            response_cache_ttl_secs: 300,
            retry_attempts: 3,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FinchError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| FinchError::Config(format!("cannot read settings file: {e}")))?;
        let settings: Settings = serde_json::from_str(&raw)
            .map_err(|e| FinchError::Config(format!("cannot parse settings file: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from `FINCH_*` environment variables on top of defaults.
    pub fn from_env() -> Result<Self, FinchError> {
        let mut settings = Settings::default();
        let get = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        if let Some(v) = get("FINCH_AZURE_ENDPOINT") {
            settings.azure.endpoint = v;
        }
        if let Some(v) = get("FINCH_AZURE_API_KEY") {
            settings.azure.api_key = v;
        }
        if let Some(v) = get("FINCH_AZURE_API_VERSION") {
            settings.azure.api_version = v;
        }
        if let Some(v) = get("FINCH_AZURE_CHAT_DEPLOYMENT") {
            settings.azure.chat_deployment = v;
        }
        if let Some(v) = get("FINCH_AZURE_EMBEDDING_DEPLOYMENT") {
            settings.azure.embedding_deployment = v;
        }
        if let Some(v) = get("FINCH_CHROMA_URL") {
            settings.chroma.url = v;
        }
        if let Some(v) = get("FINCH_CHROMA_COLLECTION") {
            settings.chroma.collection = v;
        }
        if let Some(v) = get("FINCH_CHUNK_SIZE") {
            settings.documents.chunk_size = v
                .parse()
                .map_err(|_| FinchError::Config(format!("FINCH_CHUNK_SIZE is not a number: {v}")))?;
        }
        if let Some(v) = get("FINCH_CHUNK_OVERLAP") {
            settings.documents.chunk_overlap = v.parse().map_err(|_| {
                FinchError::Config(format!("FINCH_CHUNK_OVERLAP is not a number: {v}"))
            })?;
        }
        if let Some(v) = get("FINCH_FDIC_BASE_URL") {
            settings.external.fdic_base_url = v;
        }
        if let Some(v) = get("FINCH_CALL_REPORT_BASE_URL") {
            settings.external.call_report_base_url = v;
        }
        if let Some(v) = get("FINCH_RATINGS_BASE_URL") {
            settings.external.ratings_base_url = v;
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), FinchError> {
        if self.documents.chunk_size == 0 {
            return Err(FinchError::Config("chunk_size must be positive".into()));
        }
        if self.documents.chunk_overlap >= self.documents.chunk_size {
            return Err(FinchError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.documents.chunk_overlap, self.documents.chunk_size
            )));
        }
        if self.chroma.insert_batch_size == 0 {
            return Err(FinchError::Config(
                "insert_batch_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let mut settings = Settings::default();
        settings.documents.chunk_size = 100;
        settings.documents.chunk_overlap = 100;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.chroma.collection = "other".to_owned();
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        let loaded = Settings::from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_file_keeps_defaults_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"chroma": {"url": "http://chroma:9000"}}"#).unwrap();
        let loaded = Settings::from_file(&path).unwrap();
        assert_eq!(loaded.chroma.url, "http://chroma:9000");
        assert_eq!(loaded.documents.chunk_size, 1000);
    }
}
