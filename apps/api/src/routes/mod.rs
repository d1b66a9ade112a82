pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::coach::handlers::handle_chat;
use crate::documents::handlers::handle_extract;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/chat", post(handle_chat))
        .route(
            "/api/extract",
            post(handle_extract).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}
