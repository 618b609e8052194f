//! Test doubles shared across module tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::Config;
use crate::extraction::Extractor;
use crate::llm_client::{CompletionProvider, LlmError, ProviderKind, ProviderSettings};
use crate::state::AppState;
use crate::store::MemoryStore;

/// Completion provider that replays canned replies in order and records every prompt.
/// Once the replies run out it answers with `EmptyContent`. Key checks replay
/// their own queue and pass once it is empty.
pub struct FakeProvider {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    key_checks: Mutex<VecDeque<Result<(), LlmError>>>,
    verified: Mutex<Vec<ProviderKind>>,
}

impl FakeProvider {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            key_checks: Mutex::new(VecDeque::new()),
            verified: Mutex::new(Vec::new()),
        }
    }

    pub fn with_key_checks(self, results: Vec<Result<(), LlmError>>) -> Self {
        *self.key_checks.lock().unwrap() = results.into();
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Providers whose keys were checked, in call order.
    pub fn verified(&self) -> Vec<ProviderKind> {
        self.verified.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    async fn complete(&self, prompt: &str, _settings: &ProviderSettings) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }

    async fn verify_key(&self, settings: &ProviderSettings) -> Result<(), LlmError> {
        settings.check()?;
        self.verified.lock().unwrap().push(settings.provider);
        self.key_checks.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: None,
        port: 0,
        rust_log: "debug".to_string(),
        page_text_budget: 8000,
        llm_timeout_secs: 5,
    }
}

/// App state over an in-memory store and the given fake provider.
pub fn test_state(provider: Arc<FakeProvider>) -> AppState {
    AppState {
        store: Arc::new(MemoryStore::new()),
        llm: provider,
        extractor: Arc::new(Extractor::default()),
        config: test_config(),
    }
}
