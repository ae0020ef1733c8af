//! Document Text Extractor: uploaded PDF bytes in, plain text out.
//!
//! Flow: validate (media type, size) → read bytes → parse pages on a blocking
//!       thread → join pages with a blank line → trim.
//!
//! Batch extraction never fails as a whole: each file gets exactly one entry,
//! either its text or a description of what went wrong.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::extraction::validation::{check_pdf, is_valid_pdf, FileRejection};

/// Where an uploaded file's bytes live.
#[derive(Debug, Clone)]
pub enum FileContent {
    Memory(Bytes),
    /// Spilled to a temp file; removed when the last clone is dropped.
    Spooled(Arc<TempPath>),
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub media_type: String,
    pub size: u64,
    content: FileContent,
}

impl UploadedFile {
    pub fn from_bytes(name: impl Into<String>, media_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            content: FileContent::Memory(bytes),
        }
    }

    /// A file whose bytes are read lazily from `path`. `size` is the declared size.
    pub fn spooled(
        name: impl Into<String>,
        media_type: impl Into<String>,
        path: TempPath,
        size: u64,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size,
            content: FileContent::Spooled(Arc::new(path)),
        }
    }

    pub async fn read(&self) -> std::io::Result<Bytes> {
        match &self.content {
            FileContent::Memory(bytes) => Ok(bytes.clone()),
            FileContent::Spooled(path) => {
                let path: &Path = path;
                tokio::fs::read(path).await.map(Bytes::from)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Invalid PDF file: {name} ({reason})")]
    Invalid { name: String, reason: FileRejection },

    #[error("Failed to read PDF file {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to extract text from PDF {name}: {message}")]
    Parse { name: String, message: String },
}

impl ExtractionError {
    /// The inline text used for this failure in a batch result.
    pub fn batch_entry(&self) -> String {
        match self {
            ExtractionError::Invalid { name, .. } => format!("Invalid PDF file: {name}"),
            ExtractionError::Read { name, source } => {
                format!("Error extracting from {name}: Failed to read PDF file ({source})")
            }
            ExtractionError::Parse { name, message } => {
                format!("Error extracting from {name}: Failed to extract text from PDF ({message})")
            }
        }
    }
}

/// How text is obtained from a validated file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Real per-page parsing.
    #[default]
    Parser,
    /// No parser: return a labelled description of the file.
    Placeholder,
}

#[derive(Debug, Error)]
#[error("unknown extraction mode '{0}'")]
pub struct UnknownExtractionMode(String);

impl FromStr for ExtractionMode {
    type Err = UnknownExtractionMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parser" => Ok(ExtractionMode::Parser),
            "placeholder" => Ok(ExtractionMode::Placeholder),
            other => Err(UnknownExtractionMode(other.to_string())),
        }
    }
}

/// Whether `ExtractedText::text` is the document's content or a stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Parsed,
    Placeholder,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedText {
    pub file_name: String,
    pub text: String,
    pub source: TextSource,
    pub page_count: usize,
}

/// Per-page text extraction. Implementations are synchronous and may be CPU-heavy;
/// the extractor always calls them from a blocking thread.
pub trait PageTextParser: Send + Sync {
    fn parse_pages(&self, bytes: &[u8]) -> anyhow::Result<Vec<String>>;
}

/// `pdf-extract` backed parser.
pub struct PdfExtractParser;

impl PageTextParser for PdfExtractParser {
    fn parse_pages(&self, bytes: &[u8]) -> anyhow::Result<Vec<String>> {
        pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// Joins page texts in order, separated by a blank line, and trims the whole.
pub fn join_pages(pages: &[String]) -> String {
    pages.join("\n\n").trim().to_string()
}

fn placeholder_text(file: &UploadedFile) -> String {
    format!(
        "[PDF placeholder: text not extracted]\nFile: {}\nSize: {:.2} KB\n\n\
         No PDF parser is configured, so this describes the file rather than its contents.",
        file.name,
        file.size as f64 / 1024.0
    )
}

#[derive(Clone)]
pub struct PdfExtractor {
    mode: ExtractionMode,
    parser: Arc<dyn PageTextParser>,
}

impl PdfExtractor {
    /// Extractor backed by `pdf-extract`.
    pub fn new(mode: ExtractionMode) -> Self {
        Self::with_parser(mode, Arc::new(PdfExtractParser))
    }

    pub fn with_parser(mode: ExtractionMode, parser: Arc<dyn PageTextParser>) -> Self {
        Self { mode, parser }
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Extracts one file, failing outright on invalid, unreadable or unparseable input.
    pub async fn extract(&self, file: &UploadedFile) -> Result<ExtractedText, ExtractionError> {
        check_pdf(&file.media_type, file.size).map_err(|reason| ExtractionError::Invalid {
            name: file.name.clone(),
            reason,
        })?;

        self.read_and_parse(file).await
    }

    /// Reads and parses a file that has already passed validation.
    async fn read_and_parse(&self, file: &UploadedFile) -> Result<ExtractedText, ExtractionError> {
        let bytes = file.read().await.map_err(|source| ExtractionError::Read {
            name: file.name.clone(),
            source,
        })?;
        debug!("Read {} bytes from {}", bytes.len(), file.name);

        if self.mode == ExtractionMode::Placeholder {
            return Ok(ExtractedText {
                file_name: file.name.clone(),
                text: placeholder_text(file),
                source: TextSource::Placeholder,
                page_count: 0,
            });
        }

        let parser = Arc::clone(&self.parser);
        let pages = tokio::task::spawn_blocking(move || parser.parse_pages(&bytes))
            .await
            .map_err(|join_error| ExtractionError::Parse {
                name: file.name.clone(),
                message: if join_error.is_panic() {
                    "PDF parser panicked".to_string()
                } else {
                    join_error.to_string()
                },
            })?
            .map_err(|e| ExtractionError::Parse {
                name: file.name.clone(),
                message: format!("{e:#}"),
            })?;

        info!("Extracted {} page(s) from {}", pages.len(), file.name);

        Ok(ExtractedText {
            file_name: file.name.clone(),
            text: join_pages(&pages),
            source: TextSource::Parsed,
            page_count: pages.len(),
        })
    }

    /// Extracts files one at a time, in order. The output has one entry per input.
    /// Files failing validation are never read.
    pub async fn extract_batch(&self, files: &[UploadedFile]) -> Vec<String> {
        info!("Batch extraction of {} file(s)", files.len());
        let mut results = Vec::with_capacity(files.len());

        for file in files {
            if !is_valid_pdf(&file.media_type, file.size) {
                warn!(
                    "Batch extraction: skipping {} ({}, {} bytes)",
                    file.name, file.media_type, file.size
                );
                results.push(format!("Invalid PDF file: {}", file.name));
                continue;
            }

            match self.read_and_parse(file).await {
                Ok(extracted) => results.push(extracted.text),
                Err(e) => {
                    warn!("Batch extraction: {e}");
                    results.push(e.batch_entry());
                }
            }
        }

        results
    }
}
