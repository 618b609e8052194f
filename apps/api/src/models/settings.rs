use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm_client::ProviderSettings;

/// How much a desirability criterion counts toward the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Mandatory,
    High,
    Medium,
    Low,
    Exclude,
}

impl Priority {
    /// Aggregation weight. Mandatory criteria act as a gate instead of a weight.
    pub fn weight(self) -> u32 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
            Priority::Mandatory | Priority::Exclude => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Mandatory => "mandatory",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Exclude => "exclude",
        }
    }
}

/// A desirability preference ("what I want from a job").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringCriterion {
    pub name: String,
    #[serde(default)]
    pub preference: String,
    pub priority: Priority,
}

/// An eligibility dimension ("what I bring"), weighted by percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityCriterion {
    pub name: String,
    #[serde(default)]
    pub details: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringSettings {
    pub enabled: bool,
    pub desirability_criteria: Vec<ScoringCriterion>,
    pub eligibility_criteria: Vec<EligibilityCriterion>,
    pub desirability_weight: u32,
    pub eligibility_weight: u32,
    pub threshold: u32,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            desirability_criteria: vec![],
            eligibility_criteria: vec![],
            desirability_weight: 70,
            eligibility_weight: 30,
            threshold: 60,
        }
    }
}

impl ScoringSettings {
    /// Eligibility is only scored when it carries weight and has something to score against.
    pub fn eligibility_active(&self) -> bool {
        self.eligibility_weight > 0 && !self.eligibility_criteria.is_empty()
    }
}

/// When the service hands back a CSV blob for the extension to download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadOption {
    #[default]
    AnyScrape,
    AnyScore,
    ScrapeAndScore,
    Manual,
}

/// The action that just finished, used to decide on an automatic download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletedAction {
    Scrape,
    ScrapeAndScore,
    Score,
}

impl DownloadOption {
    pub fn downloads_after(self, action: CompletedAction) -> bool {
        match (self, action) {
            (DownloadOption::Manual, _) => false,
            (DownloadOption::AnyScrape, CompletedAction::Scrape) => true,
            (_, CompletedAction::ScrapeAndScore) => true,
            (DownloadOption::AnyScore, CompletedAction::Score) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeMeta {
    pub file_name: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Everything the extension keeps in its `sync` storage scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    pub scoring_settings: ScoringSettings,
    pub llm_scraper_settings: Option<ProviderSettings>,
    pub llm_scoring_settings: Option<ProviderSettings>,
    pub download_option: DownloadOption,
    pub resume_meta: Option<ResumeMeta>,
    pub resume_text: Option<String>,
}
