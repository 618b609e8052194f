//! Orchestration behind the job routes: extract → dedup → save → score → download.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::errors::AppError;
use crate::export::{export_csv, CSV_FILENAME};
use crate::extraction::{ExtractOutcome, ExtractionTrace, PageSnapshot};
use crate::llm_extract::{extract_with_llm, page_context};
use crate::models::job::{JobRecord, JobSummary};
use crate::models::settings::{CompletedAction, ScoringSettings, SyncSettings};
use crate::scoring::refresh_overall;
use crate::scoring::scorer::{score_batch, score_stored, BatchReport, ItemOutcome, ScoreTarget, ScoringContext};
use crate::state::AppState;
use crate::store::dedup::{save_job, SaveOutcome};
use crate::store::{self, KeyValueStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMethod {
    /// The tiered DOM extractor.
    #[default]
    Default,
    Llm,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    #[serde(flatten)]
    pub page: PageSnapshot,
    #[serde(default)]
    pub method: ScrapeMethod,
    /// Score the record right after saving it.
    #[serde(default)]
    pub score: bool,
    /// Save even when the record duplicates a stored one.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceSaveRequest {
    pub job: JobRecord,
    #[serde(default)]
    pub score: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScoreRequest {
    pub target: ScoreTarget,
}

/// CSV content for the extension to hand to its download API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvDownload {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedJob {
    pub job: JobRecord,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<ExtractionTrace>,
    pub scored: bool,
    /// Why scoring the saved record failed. The record stays saved and unscored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<CsvDownload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ScrapeResponse {
    Saved(SavedJob),
    NotFound,
    #[serde(rename_all = "camelCase")]
    Duplicate {
        existing: JobSummary,
        candidate: JobRecord,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScoreResponse {
    #[serde(flatten)]
    pub report: BatchReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<CsvDownload>,
}

/// Brings every cached overall score in line with current weights, saves any
/// change, and renders the CSV. An empty store is `NotFound`.
pub async fn export_store(
    kv: &dyn KeyValueStore,
    settings: &ScoringSettings,
) -> Result<String, AppError> {
    let mut jobs = store::load_jobs(kv).await?;
    if jobs.is_empty() {
        return Err(AppError::NotFound("No jobs saved".to_string()));
    }
    let mut changed = 0usize;
    for job in jobs.iter_mut() {
        if refresh_overall(job, settings) {
            changed += 1;
        }
    }
    if changed > 0 {
        store::save_jobs(kv, &jobs).await?;
        info!(changed, "refreshed cached overall scores before export");
    }
    Ok(export_csv(&jobs, settings))
}

async fn download_after(
    kv: &dyn KeyValueStore,
    sync: &SyncSettings,
    action: CompletedAction,
) -> Result<Option<CsvDownload>, AppError> {
    if !sync.download_option.downloads_after(action) {
        return Ok(None);
    }
    let content = export_store(kv, &sync.scoring_settings).await?;
    Ok(Some(CsvDownload {
        filename: CSV_FILENAME.to_string(),
        content,
    }))
}

fn parse_page_url(raw: &str) -> Result<Url, AppError> {
    Url::parse(raw.trim()).map_err(|e| AppError::Validation(format!("invalid page url '{raw}': {e}")))
}

/// POST /api/v1/jobs/scrape
pub async fn scrape(state: &AppState, req: ScrapeRequest) -> Result<ScrapeResponse, AppError> {
    let url = parse_page_url(&req.page.url)?;
    let sync = store::load_settings(state.store.as_ref()).await?;
    let scoring = if req.score {
        Some(ScoringContext::resolve(state.llm.as_ref(), &sync)?)
    } else {
        None
    };

    let (job, trace) = match req.method {
        ScrapeMethod::Default => match state.extractor.extract(&url, &req.page.html) {
            ExtractOutcome::Found { job, trace } => (job, trace),
            ExtractOutcome::NotFound => {
                info!(url = %url, "no job posting found on page");
                return Ok(ScrapeResponse::NotFound);
            }
        },
        ScrapeMethod::Llm => {
            let context = page_context(&url, &req.page.html, state.config.page_text_budget);
            extract_with_llm(
                state.llm.as_ref(),
                sync.llm_scraper_settings.as_ref(),
                context,
            )
            .await?
        }
    };
    info!(url = %url, source = %trace.source, "job extracted");

    save_and_follow_up(state, &sync, scoring.as_ref(), job, Some(trace), req.force).await
}

/// POST /api/v1/jobs
pub async fn force_save(state: &AppState, req: ForceSaveRequest) -> Result<ScrapeResponse, AppError> {
    if !req.job.has_content() {
        return Err(AppError::Validation(
            "job needs a title or a description".to_string(),
        ));
    }
    let sync = store::load_settings(state.store.as_ref()).await?;
    let scoring = if req.score {
        Some(ScoringContext::resolve(state.llm.as_ref(), &sync)?)
    } else {
        None
    };
    save_and_follow_up(state, &sync, scoring.as_ref(), req.job, None, true).await
}

async fn save_and_follow_up(
    state: &AppState,
    sync: &SyncSettings,
    scoring: Option<&ScoringContext<'_>>,
    candidate: JobRecord,
    trace: Option<ExtractionTrace>,
    force: bool,
) -> Result<ScrapeResponse, AppError> {
    let kv = state.store.as_ref();
    let (mut job, index) = match save_job(kv, candidate, force).await? {
        SaveOutcome::Duplicate {
            existing,
            candidate,
        } => {
            return Ok(ScrapeResponse::Duplicate {
                existing,
                candidate,
            })
        }
        SaveOutcome::Saved { job, index } => (job, index),
    };

    let mut scored = false;
    let mut score_error = None;
    if let Some(ctx) = scoring {
        match score_stored(kv, ctx, &job.identity()).await {
            Ok(ItemOutcome::Scored(updated)) => {
                job = updated;
                scored = true;
            }
            Ok(ItemOutcome::Gone) => {
                warn!(url = %job.url, "saved job disappeared before scoring");
            }
            Err(AppError::Store(e)) => return Err(AppError::Store(e)),
            Err(e) => {
                warn!(url = %job.url, "scoring the saved job failed: {e}");
                score_error = Some(e.to_string());
            }
        }
    }

    let action = if scoring.is_some() {
        CompletedAction::ScrapeAndScore
    } else {
        CompletedAction::Scrape
    };
    let download = download_after(kv, sync, action).await?;

    Ok(ScrapeResponse::Saved(SavedJob {
        job,
        index,
        trace,
        scored,
        score_error,
        download,
    }))
}

/// POST /api/v1/jobs/score
pub async fn score(state: &AppState, req: BatchScoreRequest) -> Result<BatchScoreResponse, AppError> {
    let kv = state.store.as_ref();
    let sync = store::load_settings(kv).await?;
    let ctx = ScoringContext::resolve(state.llm.as_ref(), &sync)?;
    let report = score_batch(kv, &ctx, req.target).await?;

    let download = if report.scored > 0 {
        download_after(kv, &sync, CompletedAction::Score).await?
    } else {
        None
    };
    Ok(BatchScoreResponse { report, download })
}
