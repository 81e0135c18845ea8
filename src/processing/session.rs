//! Session-scoped storage for chunk lists and final summaries.
//!
//! Each browser tab (or CLI run) owns one [`Session`]. Ingestion replaces a session's chunk
//! list; the pipelines copy it out and never hold the lock across an LLM call. Every batch
//! bumps the session's generation so a summary computed from an older batch is never stored.
//! Sessions idle for longer than the configured timeout are evicted.

use super::types::{Chunk, ProcessingError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// State held for one user session.
#[derive(Debug, Default, Clone)]
pub struct Session {
    /// Files from the most recent successful upload batch.
    pub files: Vec<String>,
    /// Chunks from the most recent successful upload batch.
    pub chunks: Vec<Chunk>,
    /// Output of the last successful combine step.
    pub final_summary: Option<String>,
    /// Incremented whenever the chunk list is replaced or cleared.
    pub generation: u64,
}

/// Chunk list copied out of a session, tagged with the batch it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkBatch {
    /// Session generation the chunks belong to.
    pub generation: u64,
    /// The chunks themselves.
    pub chunks: Vec<Chunk>,
}

struct Entry {
    session: Session,
    last_used: Instant,
}

impl Entry {
    fn new() -> Self {
        Self {
            session: Session::default(),
            last_used: Instant::now(),
        }
    }

    fn expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_used) > idle_timeout
    }
}

/// In-memory registry of live sessions.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Entry>>,
    idle_timeout: Duration,
}

impl SessionStore {
    /// Create an empty store whose sessions expire after `idle_timeout` without use.
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new empty session, evicting idle ones first.
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.lock();
        self.evict_idle(&mut sessions);
        sessions.insert(id, Entry::new());
        id
    }

    /// Drop a session. Returns `false` when it did not exist.
    pub fn remove(&self, id: Uuid) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Drop every session idle for longer than the timeout and return how many were removed.
    pub fn sweep(&self) -> usize {
        self.evict_idle(&mut self.lock())
    }

    fn evict_idle(&self, sessions: &mut HashMap<Uuid, Entry>) -> usize {
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.expired(now, self.idle_timeout));
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, live = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Fail with [`ProcessingError::SessionNotFound`] unless the session exists.
    pub fn ensure(&self, id: Uuid) -> Result<(), ProcessingError> {
        self.with_session(id, |_| ())
    }

    /// Copy of the session's chunk list.
    pub fn chunks(&self, id: Uuid) -> Result<Vec<Chunk>, ProcessingError> {
        self.with_session(id, |session| session.chunks.clone())
    }

    /// Copy of the session's chunk list together with its generation.
    pub fn batch(&self, id: Uuid) -> Result<ChunkBatch, ProcessingError> {
        self.with_session(id, |session| ChunkBatch {
            generation: session.generation,
            chunks: session.chunks.clone(),
        })
    }

    /// Install the chunks of a completed batch, discarding the previous summary.
    pub fn replace_chunks(
        &self,
        id: Uuid,
        files: Vec<String>,
        chunks: Vec<Chunk>,
    ) -> Result<(), ProcessingError> {
        self.with_session(id, |session| {
            session.files = files;
            session.chunks = chunks;
            session.final_summary = None;
            session.generation += 1;
        })
    }

    /// Forget everything the session holds after a failed batch.
    pub fn clear(&self, id: Uuid) -> Result<(), ProcessingError> {
        self.with_session(id, |session| {
            *session = Session {
                generation: session.generation + 1,
                ..Session::default()
            }
        })
    }

    /// Store the output of the combine step computed from batch `generation`.
    ///
    /// Fails with [`ProcessingError::DocumentChanged`] when the chunks were replaced or cleared
    /// since that batch was read; the stored summary is left untouched.
    pub fn set_final_summary(
        &self,
        id: Uuid,
        generation: u64,
        summary: String,
    ) -> Result<(), ProcessingError> {
        self.with_session(id, |session| {
            if session.generation != generation {
                return Err(ProcessingError::DocumentChanged);
            }
            session.final_summary = Some(summary);
            Ok(())
        })?
    }

    /// Last final summary, if one was produced for the current chunks.
    pub fn final_summary(&self, id: Uuid) -> Result<Option<String>, ProcessingError> {
        self.with_session(id, |session| session.final_summary.clone())
    }

    /// Run `apply` on a live session and mark it used. Expired sessions are dropped and
    /// reported as missing.
    fn with_session<T>(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut Session) -> T,
    ) -> Result<T, ProcessingError> {
        let mut sessions = self.lock();
        let now = Instant::now();
        match sessions.get_mut(&id) {
            Some(entry) if entry.expired(now, self.idle_timeout) => {
                sessions.remove(&id);
                tracing::debug!(session = %id, "Session expired");
                Err(ProcessingError::SessionNotFound(id))
            }
            Some(entry) => {
                entry.last_used = now;
                Ok(apply(&mut entry.session))
            }
            None => Err(ProcessingError::SessionNotFound(id)),
        }
    }
}
