use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::evaluation::orchestrator::ReportError;
use crate::evaluation::selection::SelectionError;
use crate::models::catalog::TermError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Daily limit of {limit} reports reached")]
    QuotaExceeded { limit: u32 },

    #[error("Generation failed: {message}")]
    GenerationFailed { message: String, prompt: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ReportError> for AppError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::QuotaExceeded { limit } => AppError::QuotaExceeded { limit },
            ReportError::GenerationFailed { message, prompt } => {
                AppError::GenerationFailed { message, prompt }
            }
        }
    }
}

impl From<SelectionError> for AppError {
    fn from(e: SelectionError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<TermError> for AppError {
    fn from(e: TermError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::QuotaExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "QUOTA_EXCEEDED"),
            AppError::GenerationFailed { .. } => (StatusCode::BAD_GATEWAY, "GENERATION_FAILED"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = match &self {
            AppError::NotFound(msg) | AppError::Validation(msg) => {
                json!({ "error": { "code": code, "message": msg } })
            }
            AppError::QuotaExceeded { .. } => {
                json!({ "error": { "code": code, "message": self.to_string() } })
            }
            AppError::GenerationFailed { message, prompt } => {
                tracing::warn!("Generation failed: {message}");
                json!({ "error": { "code": code, "message": message, "prompt": prompt } })
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                json!({ "error": { "code": code, "message": "A database error occurred" } })
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                json!({ "error": { "code": code, "message": "An internal server error occurred" } })
            }
        };

        (status, Json(body)).into_response()
    }
}
