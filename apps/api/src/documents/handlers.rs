//! Axum route handlers for document uploads.

use anyhow::anyhow;
use axum::{extract::Multipart, Json};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use crate::documents::extract::extract_text;
use crate::errors::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub text: String,
    pub total_pages: usize,
    pub truncated: bool,
}

/// POST /api/extract
///
/// Accepts a multipart upload with a `file` field holding a PDF and returns
/// its plain text.
pub async fn handle_extract(mut multipart: Multipart) -> Result<Json<ExtractResponse>, AppError> {
    let mut upload: Option<(Option<String>, Bytes)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file_name = field.file_name().map(String::from);
            upload = Some((file_name, field.bytes().await?));
            break;
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;

    let extracted = tokio::task::spawn_blocking(move || extract_text(&bytes))
        .await
        .map_err(|e| AppError::Internal(anyhow!("Extraction task failed: {e}")))??;

    info!(
        file = file_name.as_deref().unwrap_or("<unnamed>"),
        pages_read = extracted.pages_read,
        pages_skipped = extracted.pages_skipped,
        truncated = extracted.truncated,
        "Extracted uploaded document"
    );

    Ok(Json(ExtractResponse {
        text: extracted.text,
        total_pages: extracted.total_pages,
        truncated: extracted.truncated,
    }))
}
