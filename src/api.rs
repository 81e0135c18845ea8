//! HTTP surface for docqa.
//!
//! The router serves the browser UI and a small JSON API that mirrors the UI's three actions:
//!
//! - `POST /sessions` – Open a session; the returned id scopes every other call.
//! - `POST /sessions/:id/files` – Multipart upload (`files` fields). Loads and splits the batch,
//!   replacing the session's chunks.
//! - `POST /sessions/:id/summary` – Summarize every chunk and combine the results.
//! - `GET /sessions/:id/summary/download` – The final summary as `final_summary.txt`.
//! - `POST /sessions/:id/questions` – Answer `{ "question": … }` from the full document text.
//! - `DELETE /sessions/:id` – Drop the session.
//! - `GET /metrics` and `GET /commands` – Counters and a machine-readable command catalog.
//!
//! Failures are returned as `{ "level": "error" | "warning", "message": … }`.

use crate::processing::{
    DocumentApi, IngestReport, IngestionError, ProcessingError, SummaryOutcome, UploadedFile,
};
use crate::ui;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// File name offered for the final summary download.
pub const SUMMARY_FILE_NAME: &str = "final_summary.txt";

/// Build the HTTP router exposing the UI and the session API.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: DocumentApi + 'static,
{
    Router::new()
        .route("/", get(ui::index))
        .route("/sessions", post(create_session::<S>))
        .route("/sessions/:session_id", delete(close_session::<S>))
        .route(
            "/sessions/:session_id/files",
            post(upload_files::<S>).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/sessions/:session_id/summary", post(summarize::<S>))
        .route(
            "/sessions/:session_id/summary/download",
            get(download_summary::<S>),
        )
        .route("/sessions/:session_id/questions", post(ask_question::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Response body for `POST /sessions`.
#[derive(Serialize)]
struct SessionResponse {
    session_id: Uuid,
}

async fn create_session<S>(State(service): State<Arc<S>>) -> Json<SessionResponse>
where
    S: DocumentApi,
{
    Json(SessionResponse {
        session_id: service.create_session(),
    })
}

async fn close_session<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError>
where
    S: DocumentApi,
{
    if service.close_session(session_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ProcessingError::SessionNotFound(session_id).into())
    }
}

/// Read every file part of the multipart body, then hand the batch to the pipeline.
///
/// Parts without a file name are ignored unless they are named `files`.
async fn upload_files<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<IngestReport>, AppError>
where
    S: DocumentApi,
{
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|error| {
        ProcessingError::InvalidInput(format!("failed to read multipart body: {error}"))
    })? {
        let is_file_part = field.file_name().is_some() || field.name() == Some("files");
        if !is_file_part {
            continue;
        }

        let name = field
            .file_name()
            .or(field.name())
            .unwrap_or_default()
            .to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|error| {
            ProcessingError::InvalidInput(format!("failed to read upload {name}: {error}"))
        })?;
        files.push(UploadedFile {
            name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let report = service.ingest(session_id, files).await?;
    Ok(Json(report))
}

async fn summarize<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SummaryOutcome>, AppError>
where
    S: DocumentApi,
{
    Ok(Json(service.summarize(session_id).await?))
}

/// Serve the last final summary as a plain-text attachment.
async fn download_summary<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<Response, AppError>
where
    S: DocumentApi,
{
    let summary = service
        .final_summary(session_id)?
        .ok_or(ProcessingError::NoSummary)?;
    let disposition = format!("attachment; filename=\"{SUMMARY_FILE_NAME}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        summary,
    )
        .into_response())
}

/// Request body for `POST /sessions/:id/questions`.
#[derive(Deserialize)]
struct QuestionRequest {
    question: String,
}

/// Response body for `POST /sessions/:id/questions`.
#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
}

async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<AnswerResponse>, AppError>
where
    S: DocumentApi,
{
    let answer = service.answer(session_id, &request.question).await?;
    Ok(Json(AnswerResponse { answer }))
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for scripted clients.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "create_session",
                method: "POST",
                path: "/sessions",
                description: "Open a session. Response returns { \"session_id\": uuid }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/sessions/:session_id/files",
                description: "Multipart upload of .txt, .csv, or .pdf files in `files` parts. Loads, chunks, and replaces the session's document.",
                request_example: None,
            },
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/sessions/:session_id/summary",
                description: "Summarize each chunk, then combine the summaries. Response returns { \"chunk_summaries\": [..], \"final_summary\": string }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "download_summary",
                method: "GET",
                path: "/sessions/:session_id/summary/download",
                description: "Download the final summary as final_summary.txt (text/plain).",
                request_example: None,
            },
            CommandDescriptor {
                name: "ask",
                method: "POST",
                path: "/sessions/:session_id/questions",
                description: "Answer a question from the full document text.",
                request_example: Some(json!({ "question": "What are the key findings?" })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters.",
                request_example: None,
            },
        ],
    })
}

/// Error body shared by every failing endpoint.
#[derive(Serialize)]
struct ErrorBody {
    level: &'static str,
    message: String,
}

struct AppError(ProcessingError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ProcessingError::NoChunks(_) | ProcessingError::DocumentChanged => {
                StatusCode::CONFLICT
            }
            ProcessingError::NoSummary | ProcessingError::SessionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ProcessingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ProcessingError::Ingestion(IngestionError::UnsupportedFileType { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ProcessingError::Ingestion(IngestionError::Parse { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ProcessingError::Ingestion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProcessingError::Summarize(_)
            | ProcessingError::Combine(_)
            | ProcessingError::Answer(_) => StatusCode::BAD_GATEWAY,
            ProcessingError::Client(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let level = if self.0.is_warning() {
            "warning"
        } else {
            "error"
        };
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self.0, "Request rejected");
        }
        let body = ErrorBody {
            level,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self(inner)
    }
}
