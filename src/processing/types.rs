//! Core data types and error definitions for the document pipeline.

use crate::llm::LlmClientError;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Warning shown when summarization is requested before any chunks exist.
pub const NO_CHUNKS_TO_SUMMARIZE: &str = "No document chunks found. Upload a file first.";
/// Warning shown when a question is asked before any chunks exist.
pub const NO_DOCUMENT_FOR_QUESTION: &str = "No document found. Upload a file first.";
/// Warning shown when a download is requested before a final summary exists.
pub const NO_FINAL_SUMMARY: &str = "No final summary yet. Click Summarize first.";

/// Errors produced while configuring or running the text splitter.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Splitter configured with an impossible chunk length.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new text in every window.
    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    InvalidOverlap {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested chunk size in characters.
        chunk_size: usize,
    },
}

/// Errors raised while turning one uploaded file into chunks.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Declared MIME type has no loader.
    #[error("Unsupported file type for '{name}': {content_type}")]
    UnsupportedFileType {
        /// Uploaded file name.
        name: String,
        /// Declared (or guessed) MIME type.
        content_type: String,
    },
    /// Temp file could not be written or read back.
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        /// Temp path involved in the failure.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// Loader could not extract text from the file.
    #[error("Failed to parse '{name}': {message}")]
    Parse {
        /// Uploaded file name.
        name: String,
        /// Loader diagnostic.
        message: String,
    },
    /// Splitter rejected its configuration.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
}

/// Errors emitted by the session-level operations exposed to the API and CLI.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The session holds no chunks; surfaced to users as a warning.
    #[error("{0}")]
    NoChunks(&'static str),
    /// No final summary has been produced for the current chunks.
    #[error("No final summary yet. Click Summarize first.")]
    NoSummary,
    /// The chunks were replaced or cleared while a summary was being produced.
    #[error("The document changed while summarizing. Click Summarize again.")]
    DocumentChanged,
    /// Request was missing required input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Session id is unknown or was closed.
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),
    /// Upload batch failed and was discarded.
    #[error("Error processing file: {0}")]
    Ingestion(#[from] IngestionError),
    /// A per-chunk summarization call failed.
    #[error("Error summarizing document: {0}")]
    Summarize(#[source] LlmClientError),
    /// The combine call failed.
    #[error("Error creating final summary: {0}")]
    Combine(#[source] LlmClientError),
    /// The question-answering call failed.
    #[error("Error fetching answer: {0}")]
    Answer(#[source] LlmClientError),
    /// LLM client could not be constructed.
    #[error("LLM client unavailable: {0}")]
    Client(#[source] LlmClientError),
}

impl ProcessingError {
    /// Whether the condition is a user-facing warning rather than a failure.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::NoChunks(_) | Self::NoSummary | Self::DocumentChanged
        )
    }
}

/// Loader selected from a file's declared MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// `text/plain`
    PlainText,
    /// `text/csv`
    Csv,
    /// `application/pdf`
    Pdf,
}

impl DocumentKind {
    /// Map a MIME type (parameters ignored) to a loader.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "text/plain" => Some(Self::PlainText),
            "text/csv" => Some(Self::Csv),
            "application/pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Resolve the loader for an upload.
    ///
    /// The declared type wins. Only when it is missing or the generic
    /// `application/octet-stream` is the type guessed from the file extension.
    pub fn resolve(file: &UploadedFile) -> Result<Self, IngestionError> {
        let declared = file
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty() && !value.starts_with("application/octet-stream"));

        let mime = match declared {
            Some(value) => value.to_string(),
            None => mime_guess::from_path(&file.name)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string(),
        };

        Self::from_mime(&mime).ok_or_else(|| IngestionError::UnsupportedFileType {
            name: file.name.clone(),
            content_type: mime,
        })
    }

    /// Canonical MIME type for the kind.
    pub fn mime(self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Csv => "text/csv",
            Self::Pdf => "application/pdf",
        }
    }
}

/// A file received from the uploader.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name.
    pub name: String,
    /// Declared MIME type, if the client sent one.
    pub content_type: Option<String>,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Text produced by a loader, before splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    /// Temp file the text was read from.
    pub source: PathBuf,
    /// Extracted text.
    pub text: String,
}

/// A bounded slice of document text handed to the LLM pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Name of the uploaded file the chunk came from.
    pub source: String,
    /// Position within the session's chunk list.
    pub index: usize,
    /// Chunk contents.
    pub text: String,
}

/// Per-file ingestion counters returned to the UI.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileReport {
    /// File name as uploaded.
    pub name: String,
    /// Loader used.
    pub kind: DocumentKind,
    /// Documents produced by the loader (rows for CSV).
    pub documents: usize,
    /// Chunks produced for the file.
    pub chunks: usize,
}

/// Result of a successful upload batch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestReport {
    /// Files in upload order.
    pub files: Vec<FileReport>,
    /// Chunks now held by the session.
    pub chunk_count: usize,
}

/// Result of the summarization pipeline.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SummaryOutcome {
    /// Per-chunk summaries in chunk order.
    pub chunk_summaries: Vec<String>,
    /// Output of the combine call, verbatim.
    pub final_summary: String,
}
