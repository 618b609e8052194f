mod config;
mod db;
mod errors;
mod export;
mod extraction;
mod jobs;
mod llm_client;
mod llm_extract;
mod models;
mod routes;
mod scoring;
mod settings;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::extraction::Extractor;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::postgres::PgKeyValueStore;
use crate::store::{KeyValueStore, MemoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobCompass API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn KeyValueStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            Arc::new(PgKeyValueStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, jobs and settings are kept in memory and lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let llm = LlmClient::new(Duration::from_secs(config.llm_timeout_secs))?;
    info!(timeout_secs = config.llm_timeout_secs, "LLM client initialized");

    let state = AppState {
        store,
        llm: Arc::new(llm),
        extractor: Arc::new(Extractor::default()),
        config: config.clone(),
    };

    // The extension calls from its own origin.
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("127.0.0.1:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
