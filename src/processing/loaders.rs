//! Temp-file persistence and per-type document loaders.

use super::types::{DocumentKind, IngestionError, LoadedDocument, UploadedFile};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Write an upload to `<temp_dir>/<file name>` and return the path.
///
/// Only the final component of the client-supplied name is used. Existing files with the same
/// name are overwritten; nothing under the temp directory is ever removed.
pub(crate) async fn persist_upload(
    temp_dir: &Path,
    file: &UploadedFile,
) -> Result<PathBuf, IngestionError> {
    tokio::fs::create_dir_all(temp_dir)
        .await
        .map_err(|source| IngestionError::Io {
            path: temp_dir.to_path_buf(),
            source,
        })?;

    let path = temp_dir.join(temp_file_name(&file.name));
    tokio::fs::write(&path, &file.bytes)
        .await
        .map_err(|source| IngestionError::Io {
            path: path.clone(),
            source,
        })?;
    tracing::debug!(path = %path.display(), bytes = file.bytes.len(), "Upload written to temp file");
    Ok(path)
}

fn temp_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|component| component.to_str())
        .map(str::trim)
        .filter(|component| !component.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("upload_{}.bin", Uuid::new_v4()))
}

/// Read a temp file back and extract its text with the loader for `kind`.
pub(crate) async fn load_documents(
    kind: DocumentKind,
    name: &str,
    path: &Path,
) -> Result<Vec<LoadedDocument>, IngestionError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| IngestionError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let texts = match kind {
        DocumentKind::PlainText => vec![load_text(name, bytes)?],
        DocumentKind::Csv => load_csv(name, &bytes)?,
        DocumentKind::Pdf => load_pdf(name, bytes).await?,
    };

    Ok(texts
        .into_iter()
        .map(|text| LoadedDocument {
            source: path.to_path_buf(),
            text,
        })
        .collect())
}

fn load_text(name: &str, bytes: Vec<u8>) -> Result<String, IngestionError> {
    String::from_utf8(bytes).map_err(|error| IngestionError::Parse {
        name: name.to_string(),
        message: format!("file is not valid UTF-8: {error}"),
    })
}

/// One document per data row, rendered as `header: value` lines.
fn load_csv(name: &str, bytes: &[u8]) -> Result<Vec<String>, IngestionError> {
    let parse_error = |error: csv::Error| IngestionError::Parse {
        name: name.to_string(),
        message: error.to_string(),
    };

    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers().map_err(parse_error)?.clone();

    reader
        .records()
        .map(|record| -> Result<String, IngestionError> {
            let record = record.map_err(parse_error)?;
            Ok(headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| format!("{}: {}", header.trim(), value.trim()))
                .collect::<Vec<_>>()
                .join("\n"))
        })
        .collect()
}

/// One document per page.
///
/// PDF extraction runs on the blocking pool; a panic inside the extractor becomes a parse error.
async fn load_pdf(name: &str, bytes: Vec<u8>) -> Result<Vec<String>, IngestionError> {
    let outcome =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await;

    match outcome {
        Ok(Ok(text)) => Ok(split_pages(&text)),
        Ok(Err(error)) => Err(IngestionError::Parse {
            name: name.to_string(),
            message: error.to_string(),
        }),
        Err(join_error) => Err(IngestionError::Parse {
            name: name.to_string(),
            message: format!("PDF extraction aborted: {join_error}"),
        }),
    }
}

/// Split extracted PDF text on the form feeds that separate pages.
///
/// A trailing separator does not start an extra page; text without separators is one page.
fn split_pages(text: &str) -> Vec<String> {
    let text = text.strip_suffix(PAGE_BREAK).unwrap_or(text);
    text.split(PAGE_BREAK).map(str::to_string).collect()
}

const PAGE_BREAK: char = '\u{c}';
