use std::sync::Arc;

use crate::config::Config;
use crate::extraction::Extractor;
use crate::llm_client::CompletionProvider;
use crate::store::KeyValueStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres-backed in production, in-memory for tests and DB-less runs.
    pub store: Arc<dyn KeyValueStore>,
    pub llm: Arc<dyn CompletionProvider>,
    pub extractor: Arc<Extractor>,
    pub config: Config,
}
