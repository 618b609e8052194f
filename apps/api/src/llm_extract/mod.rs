//! LLM Extraction Adapter: page context → prompt → completion → tolerant JSON parse.
//!
//! Failures here are reported to the caller; there is no fallback to the DOM path.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};
use url::Url;

use crate::errors::AppError;
use crate::extraction::page::{formatted_text, truncate_chars, Page};
use crate::extraction::schema::job_posting_block;
use crate::extraction::{ExtractionTrace, Tier};
use crate::llm_client::{parse_json_reply, CompletionProvider, LlmError, ProviderSettings};
use crate::models::job::JobRecord;

pub mod prompts;

use prompts::build_extraction_prompt;

/// What the model gets to see of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    pub url: String,
    pub title: String,
    pub content: String,
}

/// The JSON-LD `JobPosting` block when present, else the cleaned text of the
/// main content container, cut to `budget` characters.
pub fn page_context(url: &Url, html: &str, budget: usize) -> PageContext {
    let page = Page::new(url.clone(), html);
    let content = job_posting_block(&page)
        .map(|block| block.trim().to_string())
        .or_else(|| page.main_content().map(formatted_text))
        .unwrap_or_default();

    PageContext {
        url: url.to_string(),
        title: page.document_title(),
        content: truncate_chars(&content, budget),
    }
}

/// JSON keys the prompt asks for, in prompt order.
const FIELD_KEYS: [&str; 14] = [
    "title",
    "company",
    "locations",
    "jobType",
    "workMode",
    "experienceLevel",
    "educationLevel",
    "duration",
    "salaryAndBenefits",
    "visaSponsorship",
    "responsibilities",
    "requiredSkills",
    "preferredSkills",
    "description",
];

fn field_slot<'a>(job: &'a mut JobRecord, key: &str) -> Option<&'a mut String> {
    let slot = match key {
        "title" => &mut job.title,
        "company" => &mut job.company,
        "locations" => &mut job.locations,
        "jobType" => &mut job.job_type,
        "workMode" => &mut job.work_mode,
        "experienceLevel" => &mut job.experience_level,
        "educationLevel" => &mut job.education_level,
        "duration" => &mut job.duration,
        "salaryAndBenefits" => &mut job.salary_and_benefits,
        "visaSponsorship" => &mut job.visa_sponsorship,
        "responsibilities" => &mut job.responsibilities,
        "requiredSkills" => &mut job.required_skills,
        "preferredSkills" => &mut job.preferred_skills,
        "description" => &mut job.description,
        _ => return None,
    };
    Some(slot)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

/// Loose patterns for replies that are not valid JSON. Only the four core
/// fields get a second, unquoted pattern.
static FALLBACK_PATTERNS: LazyLock<Vec<(&'static str, Regex, Option<Regex>)>> = LazyLock::new(|| {
    let strict = |key: &str| {
        let key = if key == "locations" { "locations?".to_string() } else { regex::escape(key) };
        Regex::new(&format!(r#"(?i)"{key}"\s*:\s*"([^"]+)""#)).expect("valid regex")
    };
    let loose = |word: &str| Regex::new(&format!(r#"(?i){word}["\s:]+([^\n,}}]+)"#)).expect("valid regex");
    FIELD_KEYS
        .iter()
        .map(|&key| {
            let second = match key {
                "title" => Some(loose("title")),
                "company" => Some(loose("company")),
                "locations" => Some(loose("location")),
                "description" => Some(loose("description")),
                _ => None,
            };
            (key, strict(key), second)
        })
        .collect()
});

fn regex_fallback(raw: &str) -> JobRecord {
    let mut job = JobRecord::default();
    for (key, strict, loose) in FALLBACK_PATTERNS.iter() {
        let captured = strict
            .captures(raw)
            .or_else(|| loose.as_ref().and_then(|re| re.captures(raw)))
            .map(|caps| caps[1].trim().trim_matches('"').trim().to_string());
        if let (Some(value), Some(slot)) = (captured, field_slot(&mut job, key)) {
            *slot = value;
        }
    }
    job
}

/// Parses a model reply into job fields. String values are kept, arrays are
/// joined with `"; "`, missing fields stay empty. A reply that is not valid
/// JSON goes through the regex fallback instead of failing.
pub fn parse_llm_job_response(raw: &str) -> JobRecord {
    match parse_json_reply::<Map<String, Value>>(raw) {
        Ok(object) => {
            let mut job = JobRecord::default();
            for key in FIELD_KEYS {
                if let (Some(value), Some(slot)) = (object.get(key), field_slot(&mut job, key)) {
                    *slot = value_to_text(value);
                }
            }
            job
        }
        Err(e) => {
            warn!("LLM reply is not valid JSON ({e}), falling back to regex extraction");
            regex_fallback(raw)
        }
    }
}

/// Runs the LLM path end to end for one page.
pub async fn extract_with_llm(
    provider: &dyn CompletionProvider,
    settings: Option<&ProviderSettings>,
    context: PageContext,
) -> Result<(JobRecord, ExtractionTrace), AppError> {
    let settings = settings
        .filter(|s| s.enabled)
        .ok_or_else(|| AppError::Config("LLM extraction is not enabled".to_string()))?;
    settings.check().map_err(AppError::from)?;

    let prompt = build_extraction_prompt(&context.url, &context.title, &context.content);
    let raw = provider
        .complete(&prompt, settings)
        .await
        .map_err(|e| match e {
            LlmError::EmptyContent => AppError::ExtractionEmpty,
            other => AppError::from(other),
        })?;

    let mut job = parse_llm_job_response(&raw);
    if job.title.is_empty() && job.description.is_empty() {
        return Err(AppError::ExtractionEmpty);
    }

    job.url = context.url.clone();
    job.source = Url::parse(&context.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    let selector = format!("{}:{}", settings.provider.as_str(), settings.model.trim());
    let mut trace = ExtractionTrace {
        source: "llm-api".to_string(),
        ..Default::default()
    };
    for key in FIELD_KEYS {
        if field_slot(&mut job, key).is_some_and(|v| !v.is_empty()) {
            trace.record(key, Tier::Llm, selector.clone());
        }
    }

    info!(url = %context.url, provider = settings.provider.as_str(), "LLM extraction succeeded");
    Ok((job, trace))
}
