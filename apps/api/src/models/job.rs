use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::settings::Priority;

/// One scraped job posting, serialized the way the extension keeps it in its `jobs` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobRecord {
    pub source: String,
    pub url: String,
    pub title: String,
    pub company: String,
    pub locations: String,
    pub job_type: String,
    pub work_mode: String,
    pub experience_level: String,
    pub education_level: String,
    pub duration: String,
    pub salary_and_benefits: String,
    pub visa_sponsorship: String,
    /// Semicolon-joined list.
    pub responsibilities: String,
    pub required_skills: String,
    pub preferred_skills: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub desirability_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desirability_breakdown: Option<Vec<BreakdownItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desirability_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility_breakdown: Option<Vec<BreakdownItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility_summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_score_header: Option<String>,
    /// Weight split ("D:E") the cached overall fields were computed with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_score_weights: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_decision: Option<ApplyDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_reason: Option<String>,
}

/// One category in a desirability or eligibility breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownItem {
    pub category: String,
    /// Absent for eligibility entries, which carry a percentage weight instead of a tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    pub score: u32,
    pub weight: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyDecision {
    Yes,
    No,
}

impl ApplyDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyDecision::Yes => "Yes",
            ApplyDecision::No => "No",
        }
    }
}

/// The part of a stored record shown to the user when a save collides with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub title: String,
    pub company: String,
    pub scraped_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            title: self.title.clone(),
            company: self.company.clone(),
            scraped_at: self.scraped_at,
        }
    }

    /// True when extraction produced something worth saving.
    pub fn has_content(&self) -> bool {
        !self.title.trim().is_empty() || !self.description.trim().is_empty()
    }

    /// `scrapedAt` rendered like a JavaScript `toISOString()` value.
    pub fn scraped_at_iso(&self) -> String {
        self.scraped_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }

    /// Stable handle used to find the same record again after a re-read of the store.
    pub fn identity(&self) -> (String, Option<DateTime<Utc>>) {
        (self.url.clone(), self.scraped_at)
    }

    pub fn clear_overall(&mut self) {
        self.overall_score = None;
        self.overall_score_header = None;
        self.overall_score_weights = None;
        self.apply_decision = None;
        self.apply_reason = None;
    }
}
