#![deny(missing_docs)]

//! Core library for docqa: upload documents, summarize them, and ask questions about them.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// LLM completion clients.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Document loading, splitting, and LLM pipelines.
pub mod processing;
/// Browser UI shell.
pub mod ui;
