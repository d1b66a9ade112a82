use crate::coach::relay::ChatRelay;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Built once at startup; unconfigured when no API key was provided.
    pub relay: ChatRelay,
    pub config: Config,
}
