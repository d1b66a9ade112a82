//! Axum route handlers for the coaching chat.

use anyhow::anyhow;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::errors::AppError;
use crate::models::chat::{ChatRequest, ChatResponse};
use crate::state::AppState;

/// POST /api/chat
///
/// Relays the conversation plus the three context documents to the
/// completion service and returns its first reply. The credential check
/// runs before the body is looked at.
pub async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    if !state.relay.is_configured() {
        return Err(AppError::NotConfigured);
    }

    let Json(request) =
        body.map_err(|e| AppError::Internal(anyhow!("Invalid chat request body: {e}")))?;

    let response = state
        .relay
        .get_completion(&request.messages, &request.system_context)
        .await?;

    Ok(Json(response))
}
