//! Persistence collaborator: a two-scope key-value store plus typed helpers for
//! the values JobCompass keeps in it.
//!
//! There is no transaction across calls. Every mutation is load → modify → save,
//! and callers re-load right before mutating (last writer wins).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::job::JobRecord;
use crate::models::settings::{DownloadOption, ResumeMeta, ScoringSettings, SyncSettings};

pub mod dedup;
pub mod postgres;

pub const JOBS_KEY: &str = "jobs";
pub const SCORING_SETTINGS_KEY: &str = "scoringSettings";
pub const LLM_SCRAPER_SETTINGS_KEY: &str = "llmScraperSettings";
pub const LLM_SCORING_SETTINGS_KEY: &str = "llmScoringSettings";
pub const DOWNLOAD_OPTION_KEY: &str = "downloadOption";
pub const RESUME_META_KEY: &str = "resumeMeta";
pub const RESUME_TEXT_KEY: &str = "resumeText";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored value under '{key}' is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no job at index {0}")]
    IndexOutOfRange(usize),
}

/// `local` holds scraped data, `sync` holds configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Local,
    Sync,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Sync => "sync",
        }
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, scope: Scope, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove(&self, scope: Scope, key: &str) -> Result<(), StoreError>;
}

/// Process-local store. Used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(Scope, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(&(scope, key.to_string())).cloned())
    }

    async fn set(&self, scope: Scope, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert((scope, key.to_string()), value);
        Ok(())
    }

    async fn remove(&self, scope: Scope, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(&(scope, key.to_string()));
        Ok(())
    }
}

async fn get_typed<T: DeserializeOwned>(
    kv: &dyn KeyValueStore,
    scope: Scope,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match kv.get(scope, key).await? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Malformed {
                key: key.to_string(),
                source,
            }),
    }
}

async fn set_typed<T: Serialize + ?Sized>(
    kv: &dyn KeyValueStore,
    scope: Scope,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    kv.set(scope, key, serde_json::to_value(value)?).await
}

// ── JobStore ────────────────────────────────────────────────────────────────

pub async fn load_jobs(kv: &dyn KeyValueStore) -> Result<Vec<JobRecord>, StoreError> {
    Ok(get_typed(kv, Scope::Local, JOBS_KEY).await?.unwrap_or_default())
}

pub async fn save_jobs(kv: &dyn KeyValueStore, jobs: &[JobRecord]) -> Result<(), StoreError> {
    set_typed(kv, Scope::Local, JOBS_KEY, jobs).await
}

/// Removes one record by position and returns it.
pub async fn remove_job(kv: &dyn KeyValueStore, index: usize) -> Result<JobRecord, StoreError> {
    let mut jobs = load_jobs(kv).await?;
    if index >= jobs.len() {
        return Err(StoreError::IndexOutOfRange(index));
    }
    let removed = jobs.remove(index);
    save_jobs(kv, &jobs).await?;
    Ok(removed)
}

pub async fn clear_jobs(kv: &dyn KeyValueStore) -> Result<(), StoreError> {
    save_jobs(kv, &[]).await
}

// ── Sync settings ───────────────────────────────────────────────────────────

pub async fn load_settings(kv: &dyn KeyValueStore) -> Result<SyncSettings, StoreError> {
    Ok(SyncSettings {
        scoring_settings: get_typed::<ScoringSettings>(kv, Scope::Sync, SCORING_SETTINGS_KEY)
            .await?
            .unwrap_or_default(),
        llm_scraper_settings: get_typed(kv, Scope::Sync, LLM_SCRAPER_SETTINGS_KEY).await?,
        llm_scoring_settings: get_typed(kv, Scope::Sync, LLM_SCORING_SETTINGS_KEY).await?,
        download_option: get_typed::<DownloadOption>(kv, Scope::Sync, DOWNLOAD_OPTION_KEY)
            .await?
            .unwrap_or_default(),
        resume_meta: get_typed(kv, Scope::Sync, RESUME_META_KEY).await?,
        resume_text: get_typed(kv, Scope::Sync, RESUME_TEXT_KEY).await?,
    })
}

/// Writes every sync key. Absent optional values are removed rather than stored as null.
pub async fn save_settings(
    kv: &dyn KeyValueStore,
    settings: &SyncSettings,
) -> Result<(), StoreError> {
    set_typed(kv, Scope::Sync, SCORING_SETTINGS_KEY, &settings.scoring_settings).await?;
    set_typed(kv, Scope::Sync, DOWNLOAD_OPTION_KEY, &settings.download_option).await?;

    match &settings.llm_scraper_settings {
        Some(s) => set_typed(kv, Scope::Sync, LLM_SCRAPER_SETTINGS_KEY, s).await?,
        None => kv.remove(Scope::Sync, LLM_SCRAPER_SETTINGS_KEY).await?,
    }
    match &settings.llm_scoring_settings {
        Some(s) => set_typed(kv, Scope::Sync, LLM_SCORING_SETTINGS_KEY, s).await?,
        None => kv.remove(Scope::Sync, LLM_SCORING_SETTINGS_KEY).await?,
    }
    save_resume(kv, settings.resume_meta.as_ref(), settings.resume_text.as_deref()).await
}

pub async fn save_resume(
    kv: &dyn KeyValueStore,
    meta: Option<&ResumeMeta>,
    text: Option<&str>,
) -> Result<(), StoreError> {
    match meta {
        Some(m) => set_typed(kv, Scope::Sync, RESUME_META_KEY, m).await?,
        None => kv.remove(Scope::Sync, RESUME_META_KEY).await?,
    }
    match text {
        Some(t) => set_typed(kv, Scope::Sync, RESUME_TEXT_KEY, t).await,
        None => kv.remove(Scope::Sync, RESUME_TEXT_KEY).await,
    }
}
