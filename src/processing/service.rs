//! Document service coordinating ingestion, summarization, and question answering.

use crate::{
    config::{Config, get_config},
    llm::{CompletionClient, CompletionRequest, LlmClientError, get_completion_client},
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::TextSplitter,
        loaders::{load_documents, persist_upload},
        prompts::{PromptBudget, chunk_summary_prompt, combine_prompt, question_prompt},
        session::SessionStore,
        types::{
            Chunk, DocumentKind, FileReport, IngestReport, IngestionError,
            NO_CHUNKS_TO_SUMMARIZE, NO_DOCUMENT_FOR_QUESTION, ProcessingError, SummaryOutcome,
            UploadedFile,
        },
    },
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Pipeline knobs derived from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Model identifier sent with every completion.
    pub model: String,
    /// Sampling temperature sent with every completion.
    pub temperature: f32,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Directory receiving uploaded files.
    pub temp_dir: PathBuf,
    /// Token budget used to flag oversized prompts.
    pub context_window: usize,
    /// Idle time after which a session and its chunks are dropped.
    pub session_idle_timeout: Duration,
}

impl PipelineSettings {
    /// Extract pipeline settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.llm_model.clone(),
            temperature: config.llm_temperature,
            chunk_size: config.text_splitter_chunk_size,
            chunk_overlap: config.text_splitter_chunk_overlap,
            temp_dir: config.upload_temp_dir.clone(),
            context_window: config.llm_context_window,
            session_idle_timeout: Duration::from_secs(config.session_idle_timeout_secs),
        }
    }
}

/// Owns the LLM client, the session store, and the metrics registry.
///
/// Construct the service once near process start and share it through an `Arc`; the HTTP
/// surface and the CLI drive the same instance type.
pub struct DocumentService {
    client: Box<dyn CompletionClient>,
    settings: PipelineSettings,
    splitter: TextSplitter,
    budget: PromptBudget,
    sessions: SessionStore,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the document pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Open a new empty session.
    fn create_session(&self) -> Uuid;

    /// Close a session, returning `false` if it was unknown.
    fn close_session(&self, session: Uuid) -> bool;

    /// Load and split an upload batch, replacing the session's chunk list.
    async fn ingest(
        &self,
        session: Uuid,
        files: Vec<UploadedFile>,
    ) -> Result<IngestReport, ProcessingError>;

    /// Summarize every chunk, then combine the summaries into one.
    async fn summarize(&self, session: Uuid) -> Result<SummaryOutcome, ProcessingError>;

    /// Answer a question against the session's full document text.
    async fn answer(&self, session: Uuid, question: &str) -> Result<String, ProcessingError>;

    /// Last final summary produced for the session.
    fn final_summary(&self, session: Uuid) -> Result<Option<String>, ProcessingError>;

    /// Current pipeline counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl DocumentService {
    /// Build the service from the global configuration.
    pub fn new() -> Result<Self, ProcessingError> {
        let config = get_config();
        tracing::info!(
            provider = ?config.llm_provider,
            model = %config.llm_model,
            "Initializing LLM client"
        );
        let client = get_completion_client(config).map_err(ProcessingError::Client)?;
        Self::with_client(client, PipelineSettings::from_config(config))
    }

    /// Build the service around an explicit client and settings.
    pub fn with_client(
        client: Box<dyn CompletionClient>,
        settings: PipelineSettings,
    ) -> Result<Self, ProcessingError> {
        let splitter = TextSplitter::new(settings.chunk_size, settings.chunk_overlap)
            .map_err(IngestionError::from)?;
        let budget = PromptBudget::new(settings.context_window);
        let sessions = SessionStore::new(settings.session_idle_timeout);
        Ok(Self {
            client,
            settings,
            splitter,
            budget,
            sessions,
            metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    /// Open a new empty session.
    pub fn create_session(&self) -> Uuid {
        let id = self.sessions.create();
        tracing::debug!(session = %id, "Session created");
        id
    }

    /// Close a session.
    pub fn close_session(&self, session: Uuid) -> bool {
        let removed = self.sessions.remove(session);
        tracing::debug!(session = %session, removed, "Session closed");
        removed
    }

    /// Evict sessions that have been idle longer than the configured timeout.
    pub fn sweep_idle_sessions(&self) -> usize {
        self.sessions.sweep()
    }

    /// How often the server should sweep idle sessions.
    pub fn sweep_interval(&self) -> Duration {
        (self.settings.session_idle_timeout / 4).max(Duration::from_secs(1))
    }

    /// Process an upload batch sequentially.
    ///
    /// The batch is all-or-nothing: the first failing file aborts the batch and leaves the
    /// session without chunks.
    pub async fn ingest(
        &self,
        session: Uuid,
        files: Vec<UploadedFile>,
    ) -> Result<IngestReport, ProcessingError> {
        self.sessions.ensure(session)?;
        if files.is_empty() {
            return Err(ProcessingError::InvalidInput("no files were uploaded".into()));
        }

        match self.ingest_batch(&files).await {
            Ok((reports, chunks)) => {
                let chunk_count = chunks.len();
                let names = reports.iter().map(|report| report.name.clone()).collect();
                self.sessions.replace_chunks(session, names, chunks)?;
                tracing::info!(
                    session = %session,
                    files = reports.len(),
                    chunks = chunk_count,
                    "All files processed"
                );
                Ok(IngestReport {
                    files: reports,
                    chunk_count,
                })
            }
            Err(error) => {
                self.sessions.clear(session)?;
                tracing::warn!(session = %session, error = %error, "Upload batch rejected");
                Err(error.into())
            }
        }
    }

    async fn ingest_batch(
        &self,
        files: &[UploadedFile],
    ) -> Result<(Vec<FileReport>, Vec<Chunk>), IngestionError> {
        let mut reports = Vec::with_capacity(files.len());
        let mut chunks = Vec::new();

        for file in files {
            tracing::info!(file = %file.name, bytes = file.bytes.len(), "Processing upload");
            let kind = DocumentKind::resolve(file)?;
            let path = persist_upload(&self.settings.temp_dir, file).await?;
            let documents = load_documents(kind, &file.name, &path).await?;
            tracing::debug!(
                file = %file.name,
                ?kind,
                documents = documents.len(),
                "Document loaded"
            );

            let file_chunks = self
                .splitter
                .split_documents(&file.name, &documents, chunks.len());
            tracing::info!(file = %file.name, chunks = file_chunks.len(), "Document split");
            self.metrics.record_file(file_chunks.len() as u64);

            reports.push(FileReport {
                name: file.name.clone(),
                kind,
                documents: documents.len(),
                chunks: file_chunks.len(),
            });
            chunks.extend(file_chunks);
        }

        Ok((reports, chunks))
    }

    /// Summarize each chunk in order, then merge the summaries with a single combine call.
    ///
    /// The summary is only stored if the session still holds the batch it was computed from.
    pub async fn summarize(&self, session: Uuid) -> Result<SummaryOutcome, ProcessingError> {
        let batch = self.sessions.batch(session)?;
        let chunks = batch.chunks;
        if chunks.is_empty() {
            return Err(ProcessingError::NoChunks(NO_CHUNKS_TO_SUMMARIZE));
        }

        let mut chunk_summaries = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let prompt = chunk_summary_prompt(&chunk.text);
            let summary = self
                .complete("chunk_summary", prompt)
                .await
                .map_err(ProcessingError::Summarize)?;
            tracing::debug!(session = %session, chunk = chunk.index, "Chunk summarized");
            chunk_summaries.push(summary);
        }

        let final_summary = self
            .complete("combine", combine_prompt(&chunk_summaries))
            .await
            .map_err(ProcessingError::Combine)?;

        self.sessions
            .set_final_summary(session, batch.generation, final_summary.clone())
            .inspect_err(|_| {
                tracing::warn!(session = %session, "Document replaced during summarization")
            })?;
        self.metrics.record_summary();
        tracing::info!(session = %session, chunks = chunks.len(), "Final summary created");

        Ok(SummaryOutcome {
            chunk_summaries,
            final_summary,
        })
    }

    /// Answer a question using the concatenated text of every chunk.
    pub async fn answer(&self, session: Uuid, question: &str) -> Result<String, ProcessingError> {
        if question.trim().is_empty() {
            return Err(ProcessingError::InvalidInput(
                "question must not be empty".into(),
            ));
        }
        let chunks = self.sessions.chunks(session)?;
        if chunks.is_empty() {
            return Err(ProcessingError::NoChunks(NO_DOCUMENT_FOR_QUESTION));
        }

        let full_text = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let answer = self
            .complete("question", question_prompt(&full_text, question))
            .await
            .map_err(ProcessingError::Answer)?;

        self.metrics.record_answer();
        tracing::info!(session = %session, chunks = chunks.len(), "Question answered");
        Ok(answer)
    }

    /// Last final summary produced for the session.
    pub fn final_summary(&self, session: Uuid) -> Result<Option<String>, ProcessingError> {
        self.sessions.final_summary(session)
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn complete(
        &self,
        stage: &'static str,
        prompt: String,
    ) -> Result<String, LlmClientError> {
        self.budget.check(stage, &prompt);
        let text = self
            .client
            .complete(CompletionRequest {
                model: self.settings.model.clone(),
                prompt,
                temperature: self.settings.temperature,
            })
            .await
            .inspect_err(|error| tracing::error!(stage, error = %error, "LLM call failed"))?;
        self.metrics.record_llm_call();
        Ok(text)
    }
}

#[async_trait]
impl DocumentApi for DocumentService {
    fn create_session(&self) -> Uuid {
        DocumentService::create_session(self)
    }

    fn close_session(&self, session: Uuid) -> bool {
        DocumentService::close_session(self, session)
    }

    async fn ingest(
        &self,
        session: Uuid,
        files: Vec<UploadedFile>,
    ) -> Result<IngestReport, ProcessingError> {
        DocumentService::ingest(self, session, files).await
    }

    async fn summarize(&self, session: Uuid) -> Result<SummaryOutcome, ProcessingError> {
        DocumentService::summarize(self, session).await
    }

    async fn answer(&self, session: Uuid, question: &str) -> Result<String, ProcessingError> {
        DocumentService::answer(self, session, question).await
    }

    fn final_summary(&self, session: Uuid) -> Result<Option<String>, ProcessingError> {
        DocumentService::final_summary(self, session)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        DocumentService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every prompt and answers from a script.
    struct ScriptedClient {
        prompts: Arc<Mutex<Vec<String>>>,
        fail_when: Option<&'static str>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmClientError> {
            let reply = {
                let mut prompts = self.prompts.lock().unwrap();
                prompts.push(request.prompt.clone());
                if let Some(marker) = self.fail_when
                    && request.prompt.contains(marker)
                {
                    return Err(LlmClientError::GenerationFailed("scripted failure".into()));
                }
                if request.prompt.starts_with("You are an expert summarizer") {
                    "FINAL SUMMARY\n".to_string()
                } else if request.prompt.starts_with("You are a knowledgeable") {
                    "ANSWER".to_string()
                } else {
                    format!("summary {}", prompts.len())
                }
            };
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(reply)
        }
    }

    struct Harness {
        service: DocumentService,
        prompts: Arc<Mutex<Vec<String>>>,
        _temp: tempfile::TempDir,
    }

    fn harness(fail_when: Option<&'static str>) -> Harness {
        scripted_harness(fail_when, None)
    }

    fn scripted_harness(fail_when: Option<&'static str>, delay: Option<Duration>) -> Harness {
        let temp = tempfile::tempdir().expect("tempdir");
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let client = ScriptedClient {
            prompts: prompts.clone(),
            fail_when,
            delay,
        };
        let settings = PipelineSettings {
            model: "test-model".into(),
            temperature: 0.0,
            chunk_size: 5000,
            chunk_overlap: 100,
            temp_dir: temp.path().join("temp"),
            context_window: 32_768,
            session_idle_timeout: Duration::from_secs(3600),
        };
        let service = DocumentService::with_client(Box::new(client), settings).expect("service");
        Harness {
            service,
            prompts,
            _temp: temp,
        }
    }

    fn text_file(name: &str, text: &str) -> UploadedFile {
        UploadedFile {
            name: name.into(),
            content_type: Some("text/plain".into()),
            bytes: text.as_bytes().to_vec(),
        }
    }

    fn prompt_count(harness: &Harness) -> usize {
        harness.prompts.lock().unwrap().len()
    }

    #[tokio::test]
    async fn twelve_thousand_character_scenario() {
        let h = harness(None);
        let session = h.service.create_session();
        let text = "x".repeat(12_000);

        let report = h
            .service
            .ingest(session, vec![text_file("big.txt", &text)])
            .await
            .expect("ingest");
        assert_eq!(report.chunk_count, 3);
        assert_eq!(report.files[0].chunks, 3);
        assert!(h.service.settings.temp_dir.join("big.txt").exists());

        let outcome = h.service.summarize(session).await.expect("summary");
        assert_eq!(prompt_count(&h), 4);
        assert_eq!(outcome.chunk_summaries, vec!["summary 1", "summary 2", "summary 3"]);
        assert_eq!(outcome.final_summary, "FINAL SUMMARY\n");

        let prompts = h.prompts.lock().unwrap().clone();
        assert!(prompts[3].ends_with("\n\nsummary 1\nsummary 2\nsummary 3"));
        assert_eq!(
            h.service.final_summary(session).unwrap().as_deref(),
            Some("FINAL SUMMARY\n")
        );

        let snapshot = h.service.metrics_snapshot();
        assert_eq!(snapshot.llm_calls, 4);
        assert_eq!(snapshot.summaries_generated, 1);
        assert_eq!(snapshot.chunks_created, 3);
    }

    #[tokio::test]
    async fn summarize_without_chunks_is_a_warning_without_calls() {
        let h = harness(None);
        let session = h.service.create_session();

        let error = h.service.summarize(session).await.unwrap_err();
        assert!(error.is_warning());
        assert_eq!(error.to_string(), NO_CHUNKS_TO_SUMMARIZE);
        assert_eq!(prompt_count(&h), 0);
    }

    #[tokio::test]
    async fn question_without_chunks_is_a_warning_without_calls() {
        let h = harness(None);
        let session = h.service.create_session();

        let error = h.service.answer(session, "What is it?").await.unwrap_err();
        assert!(matches!(error, ProcessingError::NoChunks(NO_DOCUMENT_FOR_QUESTION)));
        assert_eq!(prompt_count(&h), 0);
    }

    #[tokio::test]
    async fn answer_uses_one_call_with_full_text() {
        let h = harness(None);
        let session = h.service.create_session();
        h.service
            .ingest(
                session,
                vec![
                    text_file("a.txt", "alpha facts"),
                    text_file("b.txt", "beta facts"),
                ],
            )
            .await
            .expect("ingest");

        let answer = h.service.answer(session, "Which facts?").await.expect("answer");
        assert_eq!(answer, "ANSWER");

        let prompts = h.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("alpha facts\nbeta facts"));
        assert!(prompts[0].ends_with("based only on the document:\nWhich facts?"));
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let h = harness(None);
        let session = h.service.create_session();
        let error = h.service.answer(session, "   ").await.unwrap_err();
        assert!(matches!(error, ProcessingError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unsupported_file_halts_batch_and_clears_session() {
        let h = harness(None);
        let session = h.service.create_session();
        h.service
            .ingest(session, vec![text_file("keep.txt", "kept before")])
            .await
            .expect("first batch");

        let image = UploadedFile {
            name: "photo.png".into(),
            content_type: Some("image/png".into()),
            bytes: vec![0x89, 0x50],
        };
        let error = h
            .service
            .ingest(session, vec![text_file("ok.txt", "fine"), image])
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            ProcessingError::Ingestion(IngestionError::UnsupportedFileType { .. })
        ));
        assert!(h.service.sessions.chunks(session).unwrap().is_empty());
    }

    #[tokio::test]
    async fn csv_rows_are_chunked_in_order() {
        let h = harness(None);
        let session = h.service.create_session();
        let csv = UploadedFile {
            name: "people.csv".into(),
            content_type: Some("text/csv".into()),
            bytes: b"name,role\nAda,engineer\nGrace,admiral\n".to_vec(),
        };

        let report = h.service.ingest(session, vec![csv]).await.expect("ingest");
        assert_eq!(report.files[0].documents, 2);
        let chunks = h.service.sessions.chunks(session).unwrap();
        assert_eq!(chunks[0].text, "name: Ada\nrole: engineer");
        assert_eq!(chunks[1].text, "name: Grace\nrole: admiral");
        assert_eq!(chunks[1].index, 1);
    }

    #[tokio::test]
    async fn combine_failure_keeps_previous_summary_absent() {
        let h = harness(Some("expert summarizer"));
        let session = h.service.create_session();
        h.service
            .ingest(session, vec![text_file("a.txt", "some text")])
            .await
            .expect("ingest");

        let error = h.service.summarize(session).await.unwrap_err();
        assert!(matches!(error, ProcessingError::Combine(_)));
        assert!(error.to_string().starts_with("Error creating final summary"));
        assert_eq!(prompt_count(&h), 2);
        assert_eq!(h.service.final_summary(session).unwrap(), None);
    }

    #[tokio::test]
    async fn chunk_failure_stops_before_combine() {
        let h = harness(Some("highly skilled"));
        let session = h.service.create_session();
        h.service
            .ingest(session, vec![text_file("a.txt", "some text")])
            .await
            .expect("ingest");

        let error = h.service.summarize(session).await.unwrap_err();
        assert!(matches!(error, ProcessingError::Summarize(_)));
        assert_eq!(prompt_count(&h), 1);
    }

    #[tokio::test]
    async fn unknown_session_is_reported() {
        let h = harness(None);
        let missing = Uuid::new_v4();
        assert!(matches!(
            h.service.summarize(missing).await,
            Err(ProcessingError::SessionNotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn reupload_during_summarize_discards_the_stale_summary() {
        let h = scripted_harness(None, Some(Duration::from_millis(200)));
        let session = h.service.create_session();
        h.service
            .ingest(session, vec![text_file("old.txt", "old document")])
            .await
            .expect("first upload");

        let (outcome, reupload) = tokio::join!(h.service.summarize(session), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            h.service
                .ingest(session, vec![text_file("new.txt", "brand new document")])
                .await
        });

        reupload.expect("second upload");
        let error = outcome.unwrap_err();
        assert!(matches!(error, ProcessingError::DocumentChanged));
        assert!(error.is_warning());
        assert_eq!(h.service.final_summary(session).unwrap(), None);
        assert_eq!(h.service.metrics_snapshot().summaries_generated, 0);

        let chunks = h.service.sessions.chunks(session).unwrap();
        let texts: Vec<_> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["brand new document"]);
    }

    #[tokio::test]
    async fn failed_upload_during_summarize_discards_the_stale_summary() {
        let h = scripted_harness(None, Some(Duration::from_millis(200)));
        let session = h.service.create_session();
        h.service
            .ingest(session, vec![text_file("old.txt", "old document")])
            .await
            .expect("first upload");

        let image = UploadedFile {
            name: "photo.png".into(),
            content_type: Some("image/png".into()),
            bytes: vec![0x89, 0x50],
        };
        let (outcome, reupload) = tokio::join!(h.service.summarize(session), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            h.service.ingest(session, vec![image]).await
        });

        assert!(reupload.is_err());
        assert!(matches!(outcome, Err(ProcessingError::DocumentChanged)));
        assert_eq!(h.service.final_summary(session).unwrap(), None);
    }

    #[tokio::test]
    async fn idle_sessions_are_dropped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let client = ScriptedClient {
            prompts: Arc::new(Mutex::new(Vec::new())),
            fail_when: None,
            delay: None,
        };
        let settings = PipelineSettings {
            model: "test-model".into(),
            temperature: 0.0,
            chunk_size: 5000,
            chunk_overlap: 100,
            temp_dir: temp.path().join("temp"),
            context_window: 32_768,
            session_idle_timeout: Duration::from_millis(20),
        };
        let service = DocumentService::with_client(Box::new(client), settings).expect("service");
        assert_eq!(service.sweep_interval(), Duration::from_secs(1));
        let session = service.create_session();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(matches!(
            service.answer(session, "Anything?").await,
            Err(ProcessingError::SessionNotFound(id)) if id == session
        ));
    }
}
