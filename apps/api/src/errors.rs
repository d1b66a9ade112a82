use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::coach::relay::RelayError;
use crate::documents::extract::ExtractionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Bodies are always `{ "error": "<message>" }` and never carry internal detail.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upload error: {0}")]
    Upload(#[from] MultipartError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("OpenAI API key not configured")]
    NotConfigured,

    #[error("Upstream error (status {status})")]
    Upstream { status: u16 },

    #[error("Invalid response from AI: {0}")]
    InvalidAiResponse(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::NotConfigured => AppError::NotConfigured,
            RelayError::Upstream { status } => AppError::Upstream { status },
            RelayError::MalformedResponse(detail) => AppError::InvalidAiResponse(detail),
            RelayError::Internal(detail) => AppError::Internal(anyhow::anyhow!(detail)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Upload(e) => {
                tracing::warn!("Upload error: {e}");
                (e.status(), e.body_text())
            }
            AppError::Extraction(e) => {
                tracing::warn!("Extraction error: {e}");
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            AppError::NotConfigured => {
                tracing::error!("Chat request rejected: OPENAI_API_KEY is not set");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    RelayError::NotConfigured.user_message().to_string(),
                )
            }
            AppError::Upstream { status } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                RelayError::Upstream { status: *status }
                    .user_message()
                    .to_string(),
            ),
            AppError::InvalidAiResponse(detail) => {
                tracing::error!("Invalid AI response: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Invalid response from AI".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
