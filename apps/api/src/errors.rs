use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::evaluation::EvaluationError;
use crate::extraction::ExtractionError;
use crate::llm_client::LlmError;

/// A problem with one named input of a form submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid fields: {}", .0.iter().map(|f| f.field.as_str()).collect::<Vec<_>>().join(", "))]
    InvalidFields(Vec<FieldError>),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to buffer upload: {0}")]
    Upload(#[from] std::io::Error),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::InvalidFields(_) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "One or more fields are invalid".to_string(),
            ),
            AppError::Multipart(e) => (e.status(), "INVALID_MULTIPART", e.body_text()),
            AppError::Upload(e) => {
                tracing::error!("Upload spooling failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPLOAD_FAILED",
                    "The uploaded file could not be stored".to_string(),
                )
            }
            AppError::Evaluation(e) => evaluation_parts(e),
            AppError::Extraction(e) => match e {
                ExtractionError::Invalid { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_FILE", e.to_string())
                }
                ExtractionError::Read { .. } | ExtractionError::Parse { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "EXTRACTION_FAILED",
                    e.to_string(),
                ),
            },
        }
    }
}

fn evaluation_parts(e: &EvaluationError) -> (StatusCode, &'static str, String) {
    let message = e.user_message();

    if e.is_analysis_failure() {
        tracing::error!("Analysis failed: {e}");
        return (StatusCode::BAD_GATEWAY, "ANALYSIS_FAILED", message);
    }

    match e {
        EvaluationError::InvalidRequest(_) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
        }
        EvaluationError::Model(LlmError::InvalidApiKey) => {
            tracing::error!("Gemini rejected the configured API key");
            (StatusCode::BAD_GATEWAY, "LLM_AUTH_ERROR", message)
        }
        EvaluationError::Model(LlmError::QuotaExceeded) => {
            (StatusCode::TOO_MANY_REQUESTS, "LLM_QUOTA_EXCEEDED", message)
        }
        EvaluationError::Model(LlmError::Blocked(_)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "CONTENT_BLOCKED", message)
        }
        EvaluationError::Model(LlmError::Timeout(_)) => {
            (StatusCode::GATEWAY_TIMEOUT, "LLM_TIMEOUT", message)
        }
        EvaluationError::Model(LlmError::Api { status, .. }) => {
            tracing::error!("Gemini API returned HTTP {status}: {e}");
            (StatusCode::BAD_GATEWAY, "LLM_ERROR", message)
        }
        other => {
            tracing::error!("LLM error: {other}");
            (StatusCode::BAD_GATEWAY, "LLM_ERROR", message)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = match &self {
            AppError::InvalidFields(fields) => json!({
                "error": {
                    "code": code,
                    "message": message,
                    "fields": fields
                }
            }),
            _ => json!({
                "error": {
                    "code": code,
                    "message": message
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}
