use std::collections::HashSet;

use tracing::info;

use crate::errors::AppError;
use crate::llm_client::{CompletionProvider, LlmError, ProviderSettings};
use crate::models::settings::{ScoringSettings, SyncSettings};

/// Checks scoring settings before they are saved. The first violated rule is
/// reported as a `Validation` error naming it.
///
/// Rules:
/// - desirability and eligibility weights each in 0–100 and summing to 100
/// - threshold in 0–100
/// - criterion names non-empty and unique (case-insensitive) within each list
/// - eligibility criterion weights in 0–100 and, while eligibility is active,
///   summing to 100
/// - a weighted eligibility criterion needs details or a stored resume
pub fn validate_scoring_settings(
    settings: &ScoringSettings,
    resume_text: Option<&str>,
) -> Result<(), AppError> {
    for (label, value) in [
        ("desirabilityWeight", settings.desirability_weight),
        ("eligibilityWeight", settings.eligibility_weight),
        ("threshold", settings.threshold),
    ] {
        if value > 100 {
            return Err(invalid(format!("{label} must be between 0 and 100, got {value}")));
        }
    }
    let split = settings.desirability_weight + settings.eligibility_weight;
    if split != 100 {
        return Err(invalid(format!(
            "desirabilityWeight and eligibilityWeight must sum to 100, got {split}"
        )));
    }

    check_names(
        "desirability",
        settings.desirability_criteria.iter().map(|c| c.name.as_str()),
    )?;
    check_names(
        "eligibility",
        settings.eligibility_criteria.iter().map(|c| c.name.as_str()),
    )?;

    if let Some(c) = settings.eligibility_criteria.iter().find(|c| c.weight > 100) {
        return Err(invalid(format!(
            "eligibility criterion '{}' weight must be between 0 and 100, got {}",
            c.name, c.weight
        )));
    }
    if settings.eligibility_active() {
        let total: u32 = settings.eligibility_criteria.iter().map(|c| c.weight).sum();
        if total != 100 {
            return Err(invalid(format!(
                "eligibility criterion weights must sum to 100, got {total}"
            )));
        }
    }

    let has_resume = resume_text.is_some_and(|r| !r.trim().is_empty());
    if !has_resume {
        if let Some(c) = settings
            .eligibility_criteria
            .iter()
            .find(|c| c.weight > 0 && c.details.trim().is_empty())
        {
            return Err(invalid(format!(
                "eligibility criterion '{}' needs details or an uploaded resume",
                c.name
            )));
        }
    }

    Ok(())
}

/// Validates a complete sync-settings document, including enabled provider settings.
pub fn validate_settings(sync: &SyncSettings) -> Result<(), AppError> {
    validate_scoring_settings(&sync.scoring_settings, sync.resume_text.as_deref())?;
    for (label, provider) in [
        ("llmScraperSettings", &sync.llm_scraper_settings),
        ("llmScoringSettings", &sync.llm_scoring_settings),
    ] {
        if let Some(p) = provider.as_ref().filter(|p| p.enabled) {
            p.check().map_err(|e| invalid(format!("{label}: {e}")))?;
        }
    }
    Ok(())
}

/// Live check of one provider's API key. A 401 or 403 from the provider is a
/// validation failure; any other provider failure keeps its own error.
pub async fn verify_provider_key(
    provider: &dyn CompletionProvider,
    label: &str,
    settings: &ProviderSettings,
) -> Result<(), AppError> {
    settings
        .check()
        .map_err(|e| invalid(format!("{label}: {e}")))?;
    match provider.verify_key(settings).await {
        Ok(()) => {
            info!(provider = settings.provider.as_str(), label, "API key verified");
            Ok(())
        }
        Err(LlmError::Api {
            status: status @ (401 | 403),
            ..
        }) => Err(invalid(format!(
            "{label}: {} rejected the API key (status {status})",
            settings.provider.as_str()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Runs [`verify_provider_key`] for every enabled provider in `sync`.
pub async fn verify_enabled_keys(
    provider: &dyn CompletionProvider,
    sync: &SyncSettings,
) -> Result<(), AppError> {
    for (label, settings) in [
        ("llmScraperSettings", &sync.llm_scraper_settings),
        ("llmScoringSettings", &sync.llm_scoring_settings),
    ] {
        if let Some(p) = settings.as_ref().filter(|p| p.enabled) {
            verify_provider_key(provider, label, p).await?;
        }
    }
    Ok(())
}

fn check_names<'a>(list: &str, names: impl Iterator<Item = &'a str>) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for name in names {
        let normalized = name.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(invalid(format!("{list} criterion names must not be empty")));
        }
        if !seen.insert(normalized) {
            return Err(invalid(format!(
                "duplicate {list} criterion name '{}'",
                name.trim()
            )));
        }
    }
    Ok(())
}

fn invalid(msg: String) -> AppError {
    AppError::Validation(msg)
}
