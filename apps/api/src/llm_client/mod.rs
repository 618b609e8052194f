/// LLM Client: the single point of entry for every text-completion call in JobCompass.
///
/// Extraction and scoring depend only on the `CompletionProvider` trait; `LlmClient`
/// is the reqwest binding for the three supported provider APIs. The request and
/// response shapes below are fixed contracts of those APIs.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

use prompts::JSON_ONLY_SYSTEM;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f32 = 0.3;
const MAX_RETRIES: u32 = 3;
/// Token cap and prompt for the minimal request that tests an API key.
const KEY_CHECK_TOKENS: u32 = 10;
const KEY_CHECK_PROMPT: &str = "test";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Provider configuration error: {0}")]
    Config(String),
}

/// The provider APIs JobCompass knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1/chat/completions",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1/messages",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta/models",
        }
    }
}

/// Credentials and model choice for one completion provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default)]
    pub enabled: bool,
    pub provider: ProviderKind,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ProviderSettings {
    /// Rejects settings that could never produce a successful call. Runs before any network I/O.
    pub fn check(&self) -> Result<(), LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::Config(format!(
                "no API key configured for provider '{}'",
                self.provider.as_str()
            )));
        }
        if self.model.trim().is_empty() {
            return Err(LlmError::Config(format!(
                "no model configured for provider '{}'",
                self.provider.as_str()
            )));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.provider.default_endpoint())
    }
}

/// The "text completion" capability. Implemented once for real providers (`LlmClient`)
/// and by canned fakes in tests.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, settings: &ProviderSettings)
        -> Result<String, LlmError>;

    /// Makes one cheap authenticated call with `settings`. A key the provider
    /// refuses comes back as `LlmError::Api` with status 401 or 403.
    async fn verify_key(&self, settings: &ProviderSettings) -> Result<(), LlmError>;
}

// ── Request / response contracts ────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

/// Pulls the completion text out of a successful provider response body.
fn completion_text(provider: ProviderKind, body: &str) -> Result<String, LlmError> {
    let text = match provider {
        ProviderKind::OpenAI => serde_json::from_str::<OpenAIResponse>(body)?
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content),
        ProviderKind::Anthropic => serde_json::from_str::<AnthropicResponse>(body)?
            .content
            .into_iter()
            .next()
            .and_then(|b| b.text),
        ProviderKind::Gemini => serde_json::from_str::<GeminiResponse>(body)?
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text),
    };
    text.filter(|t| !t.trim().is_empty())
        .ok_or(LlmError::EmptyContent)
}

/// Model-listing URL next to an OpenAI-compatible chat endpoint.
fn models_url(settings: &ProviderSettings) -> String {
    settings
        .endpoint()
        .trim_end_matches('/')
        .strip_suffix("/chat/completions")
        .map(|base| format!("{base}/models"))
        .unwrap_or_else(|| "https://api.openai.com/v1/models".to_string())
}

/// reqwest binding for OpenAI-compatible, Anthropic and Gemini endpoints.
/// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
}

impl LlmClient {
    pub fn new(timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    fn build_request(&self, prompt: &str, settings: &ProviderSettings) -> reqwest::RequestBuilder {
        let model = settings.model.trim();
        match settings.provider {
            ProviderKind::OpenAI => self
                .client
                .post(settings.endpoint())
                .bearer_auth(&settings.api_key)
                .json(&OpenAIRequest {
                    model,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: JSON_ONLY_SYSTEM,
                        },
                        ChatMessage {
                            role: "user",
                            content: prompt,
                        },
                    ],
                    temperature: TEMPERATURE,
                    max_tokens: MAX_TOKENS,
                }),
            ProviderKind::Anthropic => self
                .client
                .post(settings.endpoint())
                .header("x-api-key", &settings.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&AnthropicRequest {
                    model,
                    max_tokens: MAX_TOKENS,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                }),
            ProviderKind::Gemini => {
                let url = format!(
                    "{}/{}:generateContent",
                    settings.endpoint().trim_end_matches('/'),
                    model
                );
                self.client
                    .post(url)
                    .header("X-goog-api-key", &settings.api_key)
                    .json(&GeminiRequest {
                        contents: vec![GeminiContent {
                            parts: vec![GeminiPart {
                                text: format!("{JSON_ONLY_SYSTEM}\n\n{prompt}"),
                            }],
                        }],
                        generation_config: GeminiGenerationConfig {
                            temperature: TEMPERATURE,
                            max_output_tokens: MAX_TOKENS,
                        },
                    })
            }
        }
    }

    /// OpenAI keys are checked by listing models; the others get a 10-token completion.
    fn build_key_check(&self, settings: &ProviderSettings) -> reqwest::RequestBuilder {
        let model = settings.model.trim();
        match settings.provider {
            ProviderKind::OpenAI => self
                .client
                .get(models_url(settings))
                .bearer_auth(&settings.api_key),
            ProviderKind::Anthropic => self
                .client
                .post(settings.endpoint())
                .header("x-api-key", &settings.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&AnthropicRequest {
                    model,
                    max_tokens: KEY_CHECK_TOKENS,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: KEY_CHECK_PROMPT,
                    }],
                }),
            ProviderKind::Gemini => {
                let url = format!(
                    "{}/{}:generateContent",
                    settings.endpoint().trim_end_matches('/'),
                    model
                );
                self.client
                    .post(url)
                    .header("X-goog-api-key", &settings.api_key)
                    .json(&GeminiRequest {
                        contents: vec![GeminiContent {
                            parts: vec![GeminiPart {
                                text: KEY_CHECK_PROMPT.to_string(),
                            }],
                        }],
                        generation_config: GeminiGenerationConfig {
                            temperature: TEMPERATURE,
                            max_output_tokens: KEY_CHECK_TOKENS,
                        },
                    })
            }
        }
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(
        &self,
        prompt: &str,
        settings: &ProviderSettings,
    ) -> Result<String, LlmError> {
        settings.check()?;

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "{} call attempt {} failed, retrying after {}ms...",
                    settings.provider.as_str(),
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.build_request(prompt, settings).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("{} API returned {}: {}", settings.provider.as_str(), status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let body = response.text().await?;
            let text = completion_text(settings.provider, &body)?;
            debug!(
                provider = settings.provider.as_str(),
                model = %settings.model,
                chars = text.len(),
                "completion succeeded"
            );
            return Ok(text);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    async fn verify_key(&self, settings: &ProviderSettings) -> Result<(), LlmError> {
        settings.check()?;
        let response = self.build_key_check(settings).send().await?;
        let status = response.status();
        // Only OpenAI's model listing must succeed outright; the completion
        // checks count any non-auth failure (bad model, quota) as a working key.
        let rejected = match settings.provider {
            ProviderKind::OpenAI => !status.is_success(),
            ProviderKind::Anthropic | ProviderKind::Gemini => {
                matches!(status.as_u16(), 401 | 403)
            }
        };
        if rejected {
            let body = response.text().await.unwrap_or_default();
            warn!("{} rejected the API key check with {}", settings.provider.as_str(), status);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        debug!(provider = settings.provider.as_str(), %status, "API key accepted");
        Ok(())
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Returns the first balanced top-level `{...}` object in `text`.
/// Braces inside JSON string literals are ignored.
pub fn find_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the JSON object embedded in a model reply (fenced, prefixed with prose, or bare).
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let text = strip_json_fences(raw);
    let candidate = find_json_object(text).unwrap_or(text);
    serde_json::from_str(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn settings(provider: ProviderKind) -> ProviderSettings {
        ProviderSettings {
            enabled: true,
            provider,
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            endpoint: None,
        }
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_find_json_object_skips_prose_and_trailing_text() {
        let input = "Sure! Here you go: {\"a\": {\"b\": 1}} Let me know if you need more.";
        assert_eq!(find_json_object(input), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn test_find_json_object_ignores_braces_in_strings() {
        let input = r#"{"title": "C++ {templates}", "note": "escaped \" quote }"} trailing }"#;
        let found = find_json_object(input).unwrap();
        let value: Value = serde_json::from_str(found).unwrap();
        assert_eq!(value["title"], "C++ {templates}");
    }

    #[test]
    fn test_find_json_object_unbalanced_returns_none() {
        assert_eq!(find_json_object("{\"a\": 1"), None);
        assert_eq!(find_json_object("no json here"), None);
    }

    #[test]
    fn test_parse_json_reply_with_fence_and_preamble() {
        let raw = "Here is the data:\n```json\n{\"title\": \"Engineer\"}\n```";
        let value: Value = parse_json_reply(raw).unwrap();
        assert_eq!(value["title"], "Engineer");
    }

    #[test]
    fn test_check_rejects_missing_key_and_model() {
        let mut s = settings(ProviderKind::OpenAI);
        s.api_key = " ".to_string();
        assert!(matches!(s.check(), Err(LlmError::Config(_))));

        let mut s = settings(ProviderKind::Gemini);
        s.model = String::new();
        let err = s.check().unwrap_err();
        assert!(err.to_string().contains("gemini"));
    }

    #[test]
    fn test_endpoint_defaults_per_provider() {
        assert_eq!(
            settings(ProviderKind::Anthropic).endpoint(),
            "https://api.anthropic.com/v1/messages"
        );
        let mut s = settings(ProviderKind::OpenAI);
        s.endpoint = Some("http://localhost:11434/v1/chat/completions".to_string());
        assert_eq!(s.endpoint(), "http://localhost:11434/v1/chat/completions");
        s.endpoint = Some("  ".to_string());
        assert_eq!(s.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_provider_kind_serde() {
        let s: ProviderSettings = serde_json::from_str(
            r#"{"provider": "openai", "apiKey": "k", "model": "gpt-4"}"#,
        )
        .unwrap();
        assert_eq!(s.provider, ProviderKind::OpenAI);
        assert!(!s.enabled);
        assert_eq!(serde_json::to_string(&ProviderKind::Gemini).unwrap(), r#""gemini""#);
    }

    #[test]
    fn test_completion_text_openai() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "hello"}}]}"#;
        assert_eq!(completion_text(ProviderKind::OpenAI, body).unwrap(), "hello");
    }

    #[test]
    fn test_completion_text_anthropic() {
        let body = r#"{"content": [{"type": "text", "text": "hi there"}], "usage": {}}"#;
        assert_eq!(
            completion_text(ProviderKind::Anthropic, body).unwrap(),
            "hi there"
        );
    }

    #[test]
    fn test_completion_text_gemini() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\":1}"}], "role": "model"}}]}"#;
        assert_eq!(
            completion_text(ProviderKind::Gemini, body).unwrap(),
            "{\"a\":1}"
        );
    }

    #[test]
    fn test_completion_text_gemini_without_candidates_is_empty() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        assert!(matches!(
            completion_text(ProviderKind::Gemini, body),
            Err(LlmError::EmptyContent)
        ));
    }

    #[test]
    fn test_models_url_follows_chat_endpoint() {
        let mut s = settings(ProviderKind::OpenAI);
        assert_eq!(models_url(&s), "https://api.openai.com/v1/models");
        s.endpoint = Some("http://localhost:11434/v1/chat/completions/".to_string());
        assert_eq!(models_url(&s), "http://localhost:11434/v1/models");
        s.endpoint = Some("http://localhost:8080/generate".to_string());
        assert_eq!(models_url(&s), "https://api.openai.com/v1/models");
    }

    #[tokio::test]
    async fn test_verify_key_fails_fast_on_config_error() {
        let client = LlmClient::new(Duration::from_secs(1)).unwrap();
        let mut s = settings(ProviderKind::OpenAI);
        s.api_key = "  ".to_string();
        let result = client.verify_key(&s).await;
        assert!(matches!(result, Err(LlmError::Config(_))));
    }

    #[tokio::test]
    async fn test_complete_fails_fast_on_config_error() {
        let client = LlmClient::new(Duration::from_secs(1)).unwrap();
        let mut s = settings(ProviderKind::Anthropic);
        s.api_key.clear();
        let result = client.complete("prompt", &s).await;
        assert!(matches!(result, Err(LlmError::Config(_))));
    }
}
