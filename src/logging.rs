//! Tracing setup shared by the `docqa` server and `docqa-cli`.
//!
//! Console output goes to stderr so `docqa-cli summarize > summary.txt` captures only the
//! summary. Pipeline events carry `session`, `file` and `stage` fields; `RUST_LOG=docqa=debug`
//! shows per-chunk progress. A second copy of every event is appended to `DOCQA_LOG_FILE`, or to
//! `logs/docqa.log` when that variable is unset.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "docqa.log";

/// Install the console and file subscribers.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Calling this more than once is harmless;
/// only the first subscriber is installed.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let target = LogTarget::from_override(std::env::var("DOCQA_LOG_FILE").ok());
    let result = if let Some(writer) = open_writer(&target) {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).try_init()
    } else {
        registry.try_init()
    };

    if let Err(err) = result {
        eprintln!("Tracing already initialized: {err}");
    }
}

/// Where the file layer writes.
#[derive(Debug, PartialEq, Eq)]
enum LogTarget {
    /// Append to an explicit path.
    Append(PathBuf),
    /// Write `file` inside `dir`, creating the directory first.
    Directory { dir: PathBuf, file: String },
}

impl LogTarget {
    fn from_override(path: Option<String>) -> Self {
        match path.map(|value| value.trim().to_string()) {
            Some(path) if !path.is_empty() => Self::Append(PathBuf::from(path)),
            _ => Self::Directory {
                dir: PathBuf::from(DEFAULT_LOG_DIR),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}

/// Returns `None` when the log directory or file cannot be opened; console logging continues.
fn open_writer(target: &LogTarget) -> Option<NonBlocking> {
    let (non_blocking, guard) = match target {
        LogTarget::Append(path) => {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(file) => tracing_appender::non_blocking(file),
                Err(err) => {
                    eprintln!("Failed to open log file {}: {err}", path.display());
                    return None;
                }
            }
        }
        LogTarget::Directory { dir, file } => {
            if let Err(err) = std::fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory {}: {err}", dir.display());
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
