use std::path::Path;

use chrono::Utc;
use encoding_rs::{Encoding, WINDOWS_1252};
use futures::future::join_all;
use text_splitter::{ChunkConfig, TextSplitter};
use uuid::Uuid;

use crate::{
    config::DocumentSettings,
    error::FinchError,
    utils::truncate_for_log,
    value::{DocumentChunk, FileType, Metadata, ProcessingStatus},
};

/// Turns uploaded files into metadata-stamped [`DocumentChunk`]s:
/// validate → extract text → split with overlap.
#[derive(Clone, Debug)]
pub struct DocumentProcessor {
    settings: DocumentSettings,
}

/// Result of a concurrent multi-file run. One file failing never aborts the
/// others.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<(String, Vec<DocumentChunk>)>,
    pub failed: Vec<(String, String)>,
}

impl BatchOutcome {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

impl DocumentProcessor {
    pub fn new(settings: DocumentSettings) -> Self {
        Self { settings }
    }

    /// Rejects unsupported extensions and oversized files before any byte of
    /// content is parsed.
    pub fn validate_file(&self, path: &Path, size: u64) -> Result<FileType, FinchError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let file_type = FileType::from_extension(ext).ok_or_else(|| {
            FinchError::Validation(format!(
                "unsupported file type '.{ext}' for {}; accepted: .pdf, .docx, .txt",
                path.display()
            ))
        })?;
        if size > self.settings.max_file_size_bytes {
            return Err(FinchError::Validation(format!(
                "{} is {size} bytes, exceeding the {} byte limit",
                path.display(),
                self.settings.max_file_size_bytes
            )));
        }
        Ok(file_type)
    }

    /// Extracts plain text from the raw file content, branching on type.
    pub fn extract_text(&self, file_type: FileType, bytes: &[u8]) -> Result<String, FinchError> {
        match file_type {
            FileType::Pdf => extract_pdf(bytes),
            FileType::Docx => extract_docx(bytes),
            FileType::Txt => extract_txt(bytes),
        }
    }

    /// Splits `text` into overlapping chunks and stamps each with linkage
    /// metadata. Empty input yields an empty vec (logged), not an error.
    pub fn chunk_document(
        &self,
        text: &str,
        source: &str,
        document_id: &str,
        file_type: FileType,
        file_size: u64,
        extra_metadata: Metadata,
    ) -> Result<Vec<DocumentChunk>, FinchError> {
        if text.trim().is_empty() {
            log::warn!("no text to chunk for {source}; skipping");
            return Ok(vec![]);
        }

        let config = ChunkConfig::new(self.settings.chunk_size)
            .with_overlap(self.settings.chunk_overlap)
            .map_err(|e| FinchError::Config(format!("bad chunking parameters: {e}")))?;
        let splitter = TextSplitter::new(config);
        let now = Utc::now();

        let mut chunks: Vec<DocumentChunk> = splitter
            .chunks(text)
            .filter(|piece| !piece.trim().is_empty())
            .enumerate()
            .map(|(index, piece)| DocumentChunk {
                content: piece.to_owned(),
                chunk_id: format!("{source}_{index}"),
                chunk_index: index,
                chunk_count: 0, // backfilled below
                source: source.to_owned(),
                document_id: document_id.to_owned(),
                file_type,
                file_size,
                upload_timestamp: now,
                status: ProcessingStatus::Processing,
                metadata: extra_metadata.clone(),
            })
            .collect();

        let total = chunks.len();
        for chunk in &mut chunks {
            chunk.chunk_count = total;
        }
        log::debug!(
            "split {source} into {total} chunks; first: {}",
            truncate_for_log(chunks.first().map(|c| c.content.as_str()).unwrap_or(""), 80)
        );
        Ok(chunks)
    }

    /// Full pipeline for one file. `content` skips the filesystem read,
    /// `source_name` overrides the name recorded in metadata.
    pub async fn process_file(
        &self,
        path: &Path,
        content: Option<Vec<u8>>,
        source_name: Option<&str>,
    ) -> Result<Vec<DocumentChunk>, FinchError> {
        let bytes = match content {
            Some(bytes) => bytes,
            None => tokio::fs::read(path)
                .await
                .map_err(|e| FinchError::Validation(format!("cannot read {}: {e}", path.display())))?,
        };
        let file_type = self.validate_file(path, bytes.len() as u64)?;
        let source = source_name
            .map(str::to_owned)
            .or_else(|| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| path.display().to_string());

        let text = self.extract_text(file_type, &bytes)?;
        let document_id = Uuid::new_v4().to_string();
        let mut chunks = self.chunk_document(
            &text,
            &source,
            &document_id,
            file_type,
            bytes.len() as u64,
            Metadata::new(),
        )?;
        if chunks.is_empty() {
            return Err(FinchError::Validation(format!(
                "{source} produced no chunks"
            )));
        }
        for chunk in &mut chunks {
            chunk.status = ProcessingStatus::Completed;
        }
        Ok(chunks)
    }

    /// Processes many files concurrently with partial-failure semantics.
    pub async fn process_files(&self, paths: &[std::path::PathBuf]) -> BatchOutcome {
        let results = join_all(
            paths
                .iter()
                .map(|path| async move { (path, self.process_file(path, None, None).await) }),
        )
        .await;

        let mut outcome = BatchOutcome::default();
        for (path, result) in results {
            let name = path.display().to_string();
            match result {
                Ok(chunks) => outcome.succeeded.push((name, chunks)),
                Err(err) => {
                    log::warn!("processing {name} failed: {err}");
                    outcome.failed.push((name, err.to_string()));
                }
            }
        }
        outcome
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, FinchError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| FinchError::Validation(format!("cannot parse PDF: {e}")))?;
    if doc.is_encrypted() {
        return Err(FinchError::Validation(
            "PDF is encrypted; decrypt it before uploading".to_owned(),
        ));
    }
    let mut pages_text = Vec::new();
    for page_number in doc.get_pages().keys() {
        if let Ok(text) = doc.extract_text(&[*page_number])
            && !text.trim().is_empty()
        {
            pages_text.push(text);
        }
    }
    let combined = pages_text.join("\n");
    if combined.trim().is_empty() {
        return Err(FinchError::Validation(
            "PDF contains no extractable text; it may be scanned images".to_owned(),
        ));
    }
    Ok(combined)
}

fn extract_docx(bytes: &[u8]) -> Result<String, FinchError> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| FinchError::Validation(format!("cannot parse DOCX: {e}")))?;
    let mut paragraphs = Vec::new();
    for child in docx.document.children {
        let docx_rs::DocumentChild::Paragraph(paragraph) = child else {
            continue;
        };
        let mut text = String::new();
        for pc in paragraph.children {
            let docx_rs::ParagraphChild::Run(run) = pc else {
                continue;
            };
            for rc in run.children {
                if let docx_rs::RunChild::Text(t) = rc {
                    text.push_str(&t.text);
                }
            }
        }
        if !text.trim().is_empty() {
            paragraphs.push(text);
        }
    }
    if paragraphs.is_empty() {
        return Err(FinchError::Validation(
            "DOCX contains no paragraph text".to_owned(),
        ));
    }
    Ok(paragraphs.join("\n"))
}

fn extract_txt(bytes: &[u8]) -> Result<String, FinchError> {
    // UTF-16 is only trusted when a BOM announces it: without one, nearly any
    // even-length byte sequence decodes "cleanly" into the wrong characters,
    // so BOM-less single-byte text must fall through to windows-1252 instead.
    let text = match Encoding::for_bom(bytes) {
        Some((encoding, _)) => {
            let (text, _, had_errors) = encoding.decode(bytes);
            if had_errors {
                String::from_utf8_lossy(bytes).into_owned()
            } else {
                text.into_owned()
            }
        }
        None => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_owned(),
            Err(_) => {
                let (text, _, had_errors) = WINDOWS_1252.decode(bytes);
                if had_errors {
                    String::from_utf8_lossy(bytes).into_owned()
                } else {
                    text.into_owned()
                }
            }
        },
    };
    if text.trim().is_empty() {
        return Err(FinchError::Validation("text file is empty".to_owned()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use yare::parameterized;

    use super::*;
    use crate::config::DocumentSettings;

    fn processor() -> DocumentProcessor {
        DocumentProcessor::new(DocumentSettings {
            max_file_size_bytes: 1024,
            chunk_size: 50,
            chunk_overlap: 10,
        })
    }

    #[parameterized(
        exe = { "malware.exe" },
        markdown = { "notes.md" },
        no_extension = { "README" },
        doc = { "old.doc" },
    )]
    fn unsupported_extensions_rejected(name: &str) {
        let err = processor()
            .validate_file(Path::new(name), 10)
            .unwrap_err();
        assert!(matches!(err, FinchError::Validation(_)));
    }

    #[test]
    fn oversized_file_rejected() {
        let err = processor()
            .validate_file(Path::new("big.txt"), 4096)
            .unwrap_err();
        assert!(matches!(err, FinchError::Validation(_)));
        assert!(processor().validate_file(Path::new("ok.txt"), 100).is_ok());
    }

    #[test]
    fn empty_text_yields_no_chunks_without_error() {
        let chunks = processor()
            .chunk_document("", "a.txt", "doc-1", FileType::Txt, 0, Metadata::new())
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn chunk_indices_are_contiguous_and_count_backfilled() {
        let text = "word ".repeat(100);
        let chunks = processor()
            .chunk_document(&text, "a.txt", "doc-1", FileType::Txt, 500, Metadata::new())
            .unwrap();
        assert!(chunks.len() > 1);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.chunk_count, total);
            assert_eq!(chunk.chunk_id, format!("a.txt_{i}"));
            assert_eq!(chunk.document_id, "doc-1");
            assert!(chunk.content.len() <= 50);
        }
    }

    #[test]
    fn txt_encoding_ladder_handles_utf16_and_cp1252() {
        // utf-16le with BOM
        let mut utf16le = vec![0xFF, 0xFE];
        for unit in "héllo".encode_utf16() {
            utf16le.extend_from_slice(&unit.to_le_bytes());
        }
        assert!(extract_txt(&utf16le).unwrap().contains("héllo"));

        // utf-16be with BOM
        let mut utf16be = vec![0xFE, 0xFF];
        for unit in "héllo".encode_utf16() {
            utf16be.extend_from_slice(&unit.to_be_bytes());
        }
        assert!(extract_txt(&utf16be).unwrap().contains("héllo"));

        assert!(extract_txt(b"   ").is_err());
    }

    #[test]
    fn bomless_single_byte_text_is_not_mistaken_for_utf16() {
        // cp1252 "café": even-length and BOM-less, so a byte-pair decoder
        // would happily turn it into CJK garbage.
        let cp1252 = [0x63, 0x61, 0x66, 0xE9];
        assert_eq!(extract_txt(&cp1252).unwrap(), "café");

        // odd-length cp1252 "naïve"
        let odd = [0x6E, 0x61, 0xEF, 0x76, 0x65];
        assert_eq!(extract_txt(&odd).unwrap(), "naïve");

        // plain ascii stays plain ascii
        assert_eq!(extract_txt(b"hello").unwrap(), "hello");
    }

    #[test]
    fn garbage_pdf_is_a_validation_error() {
        let err = processor()
            .extract_text(FileType::Pdf, b"not a pdf at all")
            .unwrap_err();
        assert!(matches!(err, FinchError::Validation(_)));
    }

    #[tokio::test]
    async fn process_file_stamps_metadata() -> anyhow::Result<()> {
        let text = "The handbook grants 15 days of vacation per year. ".repeat(5);
        let chunks = processor()
            .process_file(
                Path::new("handbook.txt"),
                Some(text.into_bytes()),
                Some("handbook.txt"),
            )
            .await?;
        assert!(!chunks.is_empty());
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.chunk_count, total);
            assert_eq!(chunk.source, "handbook.txt");
            assert!(!chunk.document_id.is_empty());
            assert_eq!(chunk.status, ProcessingStatus::Completed);
        }
        // All chunks share one document id.
        assert!(chunks.iter().all(|c| c.document_id == chunks[0].document_id));
        Ok(())
    }

    #[tokio::test]
    async fn batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        std::fs::write(&good, "some perfectly fine content for chunking").unwrap();
        let bad = dir.path().join("bad.exe");
        std::fs::write(&bad, "binary").unwrap();
        let missing = dir.path().join("missing.txt");

        let outcome = processor()
            .process_files(&[good, bad, missing.to_path_buf()])
            .await;
        assert_eq!(outcome.success_count(), 1);
        assert_eq!(outcome.failure_count(), 2);
    }

    #[tokio::test]
    async fn process_file_of_empty_text_is_an_error() {
        let err = processor()
            .process_file(
                PathBuf::from("empty.txt").as_path(),
                Some(b"   ".to_vec()),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FinchError::Validation(_)));
    }
}
