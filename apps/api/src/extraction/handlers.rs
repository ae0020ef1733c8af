use axum::{
    extract::{multipart::Field, Multipart, State},
    Json,
};
use bytes::BytesMut;
use serde::Serialize;
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::extraction::extractor::{ExtractedText, UploadedFile};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BatchExtractionResponse {
    pub results: Vec<String>,
}

/// Uploads larger than this are spilled to a temp file instead of held in memory.
const IN_MEMORY_UPLOAD_LIMIT: usize = 1024 * 1024;

/// Reads one multipart file field, chunk by chunk. The declared content type is
/// kept as-is; validation happens in the extractor.
pub async fn read_upload(mut field: Field<'_>) -> Result<UploadedFile, AppError> {
    let name = field
        .file_name()
        .or_else(|| field.name())
        .unwrap_or("upload")
        .to_string();
    let media_type = field.content_type().unwrap_or_default().to_string();

    let mut buffer = BytesMut::new();
    let mut spool: Option<(TempPath, tokio::fs::File)> = None;
    let mut size: u64 = 0;

    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;

        if let Some((_, file)) = spool.as_mut() {
            file.write_all(&chunk).await?;
            continue;
        }

        buffer.extend_from_slice(&chunk);
        if buffer.len() > IN_MEMORY_UPLOAD_LIMIT {
            let path = NamedTempFile::new()?.into_temp_path();
            let mut file = tokio::fs::File::create(&path).await?;
            file.write_all(&buffer).await?;
            buffer.clear();
            spool = Some((path, file));
        }
    }

    info!("Received upload {name} ({media_type}, {size} bytes)");

    match spool {
        Some((path, mut file)) => {
            file.flush().await?;
            debug!("Spooled {name} to {}", path.display());
            Ok(UploadedFile::spooled(name, media_type, path, size))
        }
        None => Ok(UploadedFile::from_bytes(name, media_type, buffer.freeze())),
    }
}

/// POST /api/v1/extractions
pub async fn handle_extract(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractedText>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file = read_upload(field).await?;
            let extracted = state.extractor.extract(&file).await?;
            return Ok(Json(extracted));
        }
    }

    Err(AppError::Validation(
        "multipart body must contain a 'file' field".to_string(),
    ))
}

/// POST /api/v1/extractions/batch
///
/// The request body is capped at `routes::MAX_BATCH_BODY_BYTES`; within that,
/// every file gets its own entry.
pub async fn handle_extract_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchExtractionResponse>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if matches!(field.name(), Some("files" | "file")) {
            files.push(read_upload(field).await?);
        }
    }

    let results = state.extractor.extract_batch(&files).await;
    Ok(Json(BatchExtractionResponse { results }))
}
