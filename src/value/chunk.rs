use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum_macros::{Display, EnumString};

use crate::value::Metadata;

/// Supported source document formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
}

impl FileType {
    /// Maps a file extension to a [`FileType`], `None` for anything else.
    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.parse().ok()
    }
}

/// Lifecycle state of a document moving through the ingestion pipeline.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A bounded slice of a source document, carrying everything needed to link
/// it back to its origin. Immutable once upserted into the vector store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    /// `{source}_{index}`, unique within a document.
    pub chunk_id: String,
    pub chunk_index: usize,
    /// Total chunks produced from the same document, backfilled after the
    /// split completes.
    pub chunk_count: usize,
    pub source: String,
    pub document_id: String,
    pub file_type: FileType,
    pub file_size: u64,
    pub upload_timestamp: DateTime<Utc>,
    pub status: ProcessingStatus,
    /// Caller-supplied metadata merged into the stored record.
    pub metadata: Metadata,
}

impl DocumentChunk {
    /// Flattens the chunk into the metadata record stored next to its text in
    /// the vector store. The document id must be present before insertion.
    pub fn store_metadata(&self) -> Metadata {
        let mut map = self.metadata.clone();
        map.insert("chunk_id".into(), json!(self.chunk_id));
        map.insert("chunk_index".into(), json!(self.chunk_index));
        map.insert("chunk_count".into(), json!(self.chunk_count));
        map.insert("chunk_length".into(), json!(self.content.len()));
        map.insert("filename".into(), json!(self.source));
        map.insert("document_id".into(), json!(self.document_id));
        map.insert("file_type".into(), json!(self.file_type.to_string()));
        map.insert("file_size".into(), json!(self.file_size));
        map.insert(
            "upload_timestamp".into(),
            json!(self.upload_timestamp.to_rfc3339()),
        );
        map.insert("status".into(), json!(self.status.to_string()));
        map
    }
}

#[cfg(test)]
mod tests {
    use yare::parameterized;

    use super::*;

    #[parameterized(
        pdf = { "pdf", Some(FileType::Pdf) },
        pdf_upper = { "PDF", Some(FileType::Pdf) },
        docx = { "docx", Some(FileType::Docx) },
        txt = { "txt", Some(FileType::Txt) },
        doc = { "doc", None },
        md = { "md", None },
        empty = { "", None },
    )]
    fn extension_mapping(ext: &str, expected: Option<FileType>) {
        assert_eq!(FileType::from_extension(ext), expected);
    }

    #[test]
    fn store_metadata_includes_linkage_fields() {
        let chunk = DocumentChunk {
            content: "hello".into(),
            chunk_id: "a.txt_0".into(),
            chunk_index: 0,
            chunk_count: 1,
            source: "a.txt".into(),
            document_id: "doc-1".into(),
            file_type: FileType::Txt,
            file_size: 5,
            upload_timestamp: Utc::now(),
            status: ProcessingStatus::Completed,
            metadata: Metadata::new(),
        };
        let meta = chunk.store_metadata();
        assert_eq!(meta["filename"], "a.txt");
        assert_eq!(meta["document_id"], "doc-1");
        assert_eq!(meta["chunk_count"], 1);
        assert_eq!(meta["status"], "completed");
    }
}
