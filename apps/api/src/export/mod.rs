//! CSV export of the job store, in the column layout spreadsheet users already rely on.

use crate::models::job::{ApplyDecision, BreakdownItem, JobRecord};
use crate::models::settings::ScoringSettings;
use crate::scoring::overall_header;

pub const CSV_FILENAME: &str = "job_listings.csv";
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const BOM: &str = "\u{FEFF}";

const BASE_HEADERS: [&str; 21] = [
    "Title",
    "Company",
    "Locations",
    "Job Type",
    "Work Mode",
    "Experience Level",
    "Education Level",
    "Duration/Start time",
    "Salary and Benefits",
    "Visa Sponsorship",
    "Responsibility",
    "Required Skills",
    "Preferred Skills",
    "Description",
    "URL",
    "Source",
    "Scraped At",
    "Desirability Score",
    "Desirability Summary",
    "Eligibility Score",
    "Eligibility Summary",
];

/// Quotes one value: `"` doubled, any line break turned into a space.
pub fn csv_field(value: &str) -> String {
    let escaped = value
        .replace('"', "\"\"")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ");
    format!("\"{escaped}\"")
}

/// `[Remote: 80, Visa: 100] summary text`, or just the summary without a breakdown.
fn summary_cell(breakdown: Option<&[BreakdownItem]>, summary: Option<&str>) -> String {
    let summary = summary.unwrap_or_default();
    match breakdown.filter(|b| !b.is_empty()) {
        Some(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|b| format!("{}: {}", b.category, b.score))
                .collect();
            format!("[{}] {summary}", parts.join(", "))
        }
        None => summary.to_string(),
    }
}

fn apply_cell(job: &JobRecord) -> String {
    match (job.apply_decision, job.apply_reason.as_deref()) {
        (Some(ApplyDecision::No), Some(reason)) if !reason.is_empty() => format!("No: {reason}"),
        (Some(decision), _) => decision.as_str().to_string(),
        (None, _) => String::new(),
    }
}

fn score_cell(score: Option<u32>) -> String {
    score.map(|s| s.to_string()).unwrap_or_default()
}

fn row(job: &JobRecord) -> Vec<String> {
    vec![
        job.title.clone(),
        job.company.clone(),
        job.locations.clone(),
        job.job_type.clone(),
        job.work_mode.clone(),
        job.experience_level.clone(),
        job.education_level.clone(),
        job.duration.clone(),
        job.salary_and_benefits.clone(),
        job.visa_sponsorship.clone(),
        job.responsibilities.clone(),
        job.required_skills.clone(),
        job.preferred_skills.clone(),
        job.description.clone(),
        job.url.clone(),
        job.source.clone(),
        job.scraped_at_iso(),
        score_cell(job.desirability_score),
        summary_cell(
            job.desirability_breakdown.as_deref(),
            job.desirability_summary.as_deref(),
        ),
        score_cell(job.eligibility_score),
        summary_cell(
            job.eligibility_breakdown.as_deref(),
            job.eligibility_summary.as_deref(),
        ),
        score_cell(job.overall_score),
        apply_cell(job),
    ]
}

/// Renders the whole store. Cached overall fields are written as stored, so
/// callers refresh them against `settings` first.
pub fn export_csv(jobs: &[JobRecord], settings: &ScoringSettings) -> String {
    let overall = overall_header(settings);
    let headers = BASE_HEADERS
        .iter()
        .copied()
        .chain([overall.as_str(), "Apply"])
        .map(csv_field)
        .collect::<Vec<_>>()
        .join(",");

    let mut lines = Vec::with_capacity(jobs.len() + 1);
    lines.push(headers);
    lines.extend(jobs.iter().map(|job| {
        row(job)
            .iter()
            .map(|v| csv_field(v))
            .collect::<Vec<_>>()
            .join(",")
    }));

    format!("{BOM}{}", lines.join("\n"))
}
