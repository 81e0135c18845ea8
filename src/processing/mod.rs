//! Document pipeline: loading, splitting, session state, and LLM orchestration.

pub mod chunking;
mod loaders;
mod prompts;
pub mod session;
mod service;
pub mod types;

pub use service::{DocumentApi, DocumentService, PipelineSettings};
pub use types::{
    Chunk, ChunkingError, DocumentKind, FileReport, IngestReport, IngestionError, LoadedDocument,
    NO_CHUNKS_TO_SUMMARIZE, NO_DOCUMENT_FOR_QUESTION, NO_FINAL_SUMMARY, ProcessingError,
    SummaryOutcome, UploadedFile,
};
