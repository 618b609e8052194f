//! Duplicate detection against the stored job list, and the save path built on it.

use chrono::Utc;
use tracing::info;

use super::{load_jobs, save_jobs, KeyValueStore, StoreError};
use crate::models::job::{JobRecord, JobSummary};

/// Trim + lowercase, the normalization every identity comparison uses.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Key a record is recognized by: its normalized URL, or the normalized
/// `title|company` pair when it has no URL.
pub fn dedup_key(job: &JobRecord) -> String {
    let url = normalize(&job.url);
    if !url.is_empty() {
        return url;
    }
    let title = normalize(&job.title);
    if title.is_empty() {
        return String::new();
    }
    format!("{title}|{}", normalize(&job.company))
}

/// First stored record with the candidate's URL, else the first with the same
/// title and company. Records without a URL or title never match on that field.
pub fn find_duplicate<'a>(jobs: &'a [JobRecord], candidate: &JobRecord) -> Option<&'a JobRecord> {
    let url = normalize(&candidate.url);
    if !url.is_empty() {
        if let Some(hit) = jobs.iter().find(|j| normalize(&j.url) == url) {
            return Some(hit);
        }
    }

    let title = normalize(&candidate.title);
    if title.is_empty() {
        return None;
    }
    let company = normalize(&candidate.company);
    jobs.iter()
        .find(|j| normalize(&j.title) == title && normalize(&j.company) == company)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SavePlan {
    Append(JobRecord),
    Duplicate {
        existing: JobSummary,
        candidate: JobRecord,
    },
}

/// Decides what saving `candidate` into `snapshot` would do. `force` skips the check.
pub fn plan_save(snapshot: &[JobRecord], candidate: JobRecord, force: bool) -> SavePlan {
    if !force {
        if let Some(existing) = find_duplicate(snapshot, &candidate) {
            return SavePlan::Duplicate {
                existing: existing.summary(),
                candidate,
            };
        }
    }
    SavePlan::Append(candidate)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Appended at `index`, with `scrapedAt` stamped.
    Saved { job: JobRecord, index: usize },
    Duplicate {
        existing: JobSummary,
        candidate: JobRecord,
    },
}

/// Re-reads the store, checks for a duplicate unless `force`, and appends.
pub async fn save_job(
    kv: &dyn KeyValueStore,
    candidate: JobRecord,
    force: bool,
) -> Result<SaveOutcome, StoreError> {
    let mut jobs = load_jobs(kv).await?;
    match plan_save(&jobs, candidate, force) {
        SavePlan::Duplicate {
            existing,
            candidate,
        } => {
            info!(key = %dedup_key(&candidate), title = %existing.title, "duplicate job, not saved");
            Ok(SaveOutcome::Duplicate {
                existing,
                candidate,
            })
        }
        SavePlan::Append(mut job) => {
            job.scraped_at = Some(Utc::now());
            jobs.push(job.clone());
            save_jobs(kv, &jobs).await?;
            info!(url = %job.url, total = jobs.len(), forced = force, "job saved");
            Ok(SaveOutcome::Saved {
                job,
                index: jobs.len() - 1,
            })
        }
    }
}
