use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity since startup.
#[derive(Default)]
pub struct PipelineMetrics {
    files_ingested: AtomicU64,
    chunks_created: AtomicU64,
    llm_calls: AtomicU64,
    summaries_generated: AtomicU64,
    questions_answered: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested file and the number of chunks produced for it.
    pub fn record_file(&self, chunk_count: u64) {
        self.files_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_created.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record one completed LLM request.
    pub fn record_llm_call(&self) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a final summary produced by the combine step.
    pub fn record_summary(&self) {
        self.summaries_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered question.
    pub fn record_answer(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_ingested: self.files_ingested.load(Ordering::Relaxed),
            chunks_created: self.chunks_created.load(Ordering::Relaxed),
            llm_calls: self.llm_calls.load(Ordering::Relaxed),
            summaries_generated: self.summaries_generated.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Files successfully loaded and split.
    pub files_ingested: u64,
    /// Chunks produced across all ingested files.
    pub chunks_created: u64,
    /// Successful completions returned by the LLM provider.
    pub llm_calls: u64,
    /// Final summaries produced by the combine step.
    pub summaries_generated: u64,
    /// Questions answered by the Q&A pipeline.
    pub questions_answered: u64,
}
