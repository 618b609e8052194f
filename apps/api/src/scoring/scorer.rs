//! Sub-score acquisition through the completion provider, single-record scoring,
//! and sequential batch scoring against the store.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::prompts::{build_desirability_prompt, build_eligibility_prompt};
use super::{calculate_eligibility_score, calculate_weighted_score, store_overall, SubScore, WeightedScore};
use crate::errors::AppError;
use crate::llm_client::{parse_json_reply, CompletionProvider, ProviderSettings};
use crate::models::job::JobRecord;
use crate::models::settings::{ScoringSettings, SyncSettings};
use crate::store::{self, KeyValueStore};

#[derive(Debug, Clone, Default, Deserialize)]
struct ScoreReply {
    #[serde(default)]
    scores: Vec<SubScore>,
    #[serde(default)]
    summary: String,
}

static PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"(?:name|category|criterion)"\s*:\s*"([^"]+)"\s*,\s*"score"\s*:\s*"?(-?\d+(?:\.\d+)?)"#)
        .expect("valid regex")
});
static SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)"summary"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex"));

/// Parses a scoring reply. When the JSON is unusable, `{"name": …, "score": …}`
/// pairs are recovered by regex. `None` when no sub-score could be recovered.
fn parse_score_reply(raw: &str) -> Option<(Vec<SubScore>, String)> {
    if let Ok(reply) = parse_json_reply::<ScoreReply>(raw) {
        if !reply.scores.is_empty() {
            return Some((reply.scores, reply.summary.trim().to_string()));
        }
    }

    let scores: Vec<SubScore> = PAIR
        .captures_iter(raw)
        .filter_map(|caps| {
            Some(SubScore {
                name: caps[1].to_string(),
                score: caps[2].parse().ok()?,
            })
        })
        .collect();
    if scores.is_empty() {
        return None;
    }
    let summary = SUMMARY
        .captures(raw)
        .map(|caps| caps[1].replace("\\\"", "\"").replace("\\n", " "))
        .unwrap_or_default();
    Some((scores, summary.trim().to_string()))
}

/// Everything one scoring run needs, resolved from the sync settings.
pub struct ScoringContext<'a> {
    pub provider: &'a dyn CompletionProvider,
    pub llm: &'a ProviderSettings,
    pub settings: &'a ScoringSettings,
    pub resume_text: Option<&'a str>,
}

impl<'a> ScoringContext<'a> {
    /// Fails with a configuration error before any network call when scoring cannot run.
    pub fn resolve(
        provider: &'a dyn CompletionProvider,
        sync: &'a SyncSettings,
    ) -> Result<Self, AppError> {
        let settings = &sync.scoring_settings;
        if !settings.enabled {
            return Err(AppError::Config("LLM scoring is not enabled".to_string()));
        }
        if settings.desirability_criteria.is_empty() {
            return Err(AppError::Config(
                "no desirability criteria are configured".to_string(),
            ));
        }
        let llm = sync
            .llm_scoring_settings
            .as_ref()
            .filter(|s| s.enabled)
            .ok_or_else(|| AppError::Config("no scoring provider is configured".to_string()))?;
        llm.check().map_err(AppError::from)?;

        Ok(Self {
            provider,
            llm,
            settings,
            resume_text: sync.resume_text.as_deref(),
        })
    }

    async fn acquire(&self, prompt: &str, pass: &str) -> Result<(Vec<SubScore>, String), AppError> {
        let raw = self.provider.complete(prompt, self.llm).await?;
        parse_score_reply(&raw)
            .ok_or_else(|| AppError::Llm(format!("{pass} reply contained no usable scores")))
    }
}

/// Result of scoring one record.
#[derive(Debug, Clone, PartialEq)]
pub struct JobScores {
    pub desirability: WeightedScore,
    pub desirability_summary: String,
    pub eligibility: Option<(WeightedScore, String)>,
}

/// Runs the desirability pass and, when eligibility is active, the eligibility pass.
///
/// All or nothing: if the eligibility pass fails the desirability result is
/// dropped too, so the record stays unscored and a "missing" batch retries both.
pub async fn score_job(ctx: &ScoringContext<'_>, job: &JobRecord) -> Result<JobScores, AppError> {
    let criteria = &ctx.settings.desirability_criteria;
    let (ai_scores, summary) = ctx
        .acquire(&build_desirability_prompt(criteria, job), "desirability")
        .await?;
    let desirability = calculate_weighted_score(criteria, &ai_scores);

    let eligibility = if ctx.settings.eligibility_active() {
        let criteria = &ctx.settings.eligibility_criteria;
        let (ai_scores, summary) = ctx
            .acquire(
                &build_eligibility_prompt(criteria, ctx.resume_text, job),
                "eligibility",
            )
            .await?;
        Some((calculate_eligibility_score(criteria, &ai_scores), summary))
    } else {
        None
    };

    Ok(JobScores {
        desirability,
        desirability_summary: summary,
        eligibility,
    })
}

/// Writes scores onto a record and recomputes its overall fields.
pub fn apply_scores(job: &mut JobRecord, scores: JobScores, settings: &ScoringSettings) {
    job.desirability_score = Some(scores.desirability.final_score);
    job.desirability_breakdown = Some(scores.desirability.breakdown);
    job.desirability_summary = Some(scores.desirability_summary);
    if let Some((eligibility, summary)) = scores.eligibility {
        job.eligibility_score = Some(eligibility.final_score);
        job.eligibility_breakdown = Some(eligibility.breakdown);
        job.eligibility_summary = Some(summary);
    }
    store_overall(job, settings);
}

// ────────────────────────────────────────────────────────────────────────────
// Store-backed scoring
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTarget {
    /// The most recently added record.
    Latest,
    /// Every record lacking a desirability score, or an eligibility score while eligibility is active.
    Missing,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub scored: usize,
    pub failed: usize,
    /// Records removed from the store while the batch was running.
    pub skipped: usize,
}

type Identity = (String, Option<DateTime<Utc>>);

fn find_index(jobs: &[JobRecord], identity: &Identity) -> Option<usize> {
    jobs.iter().position(|j| &j.identity() == identity)
}

#[derive(Debug, PartialEq)]
pub enum ItemOutcome {
    Scored(JobRecord),
    Gone,
}

/// Scores the stored record with `identity`.
///
/// The store is re-read before scoring and again before writing, so edits made
/// while the completion was in flight are kept (last writer wins per record).
pub async fn score_stored(
    kv: &dyn KeyValueStore,
    ctx: &ScoringContext<'_>,
    identity: &Identity,
) -> Result<ItemOutcome, AppError> {
    let jobs = store::load_jobs(kv).await?;
    let Some(index) = find_index(&jobs, identity) else {
        return Ok(ItemOutcome::Gone);
    };
    let scores = score_job(ctx, &jobs[index]).await?;

    let mut jobs = store::load_jobs(kv).await?;
    let Some(index) = find_index(&jobs, identity) else {
        return Ok(ItemOutcome::Gone);
    };
    apply_scores(&mut jobs[index], scores, ctx.settings);
    let scored = jobs[index].clone();
    store::save_jobs(kv, &jobs).await?;
    Ok(ItemOutcome::Scored(scored))
}

fn needs_scoring(job: &JobRecord, settings: &ScoringSettings) -> bool {
    job.desirability_score.is_none()
        || (settings.eligibility_active() && job.eligibility_score.is_none())
}

/// Scores the targeted records one at a time. A failing record is logged and
/// left unscored; store failures abort the batch.
pub async fn score_batch(
    kv: &dyn KeyValueStore,
    ctx: &ScoringContext<'_>,
    target: ScoreTarget,
) -> Result<BatchReport, AppError> {
    let jobs = store::load_jobs(kv).await?;
    let targets: Vec<Identity> = match target {
        ScoreTarget::Latest => jobs.last().map(JobRecord::identity).into_iter().collect(),
        ScoreTarget::Missing => jobs
            .iter()
            .filter(|j| needs_scoring(j, ctx.settings))
            .map(JobRecord::identity)
            .collect(),
    };
    info!(mode = ?target, count = targets.len(), "starting batch scoring");

    let mut report = BatchReport::default();
    for identity in &targets {
        match score_stored(kv, ctx, identity).await {
            Ok(ItemOutcome::Scored(_)) => report.scored += 1,
            Ok(ItemOutcome::Gone) => report.skipped += 1,
            Err(AppError::Store(e)) => return Err(AppError::Store(e)),
            Err(e) => {
                warn!(url = %identity.0, "scoring failed, leaving record unscored: {e}");
                report.failed += 1;
            }
        }
    }

    info!(
        scored = report.scored,
        failed = report.failed,
        skipped = report.skipped,
        "batch scoring finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm_client::{LlmError, ProviderKind};
    use crate::models::settings::{EligibilityCriterion, Priority, ScoringCriterion};
    use crate::store::MemoryStore;
    use crate::testing::FakeProvider;
    use async_trait::async_trait;
    use chrono::TimeZone;

    /// Replies with `DESIRABLE` after applying `edit` to the stored jobs, the
    /// way a popup action would while a completion is in flight.
    struct EditingProvider {
        kv: Arc<MemoryStore>,
        edit: fn(&mut Vec<JobRecord>),
    }

    #[async_trait]
    impl CompletionProvider for EditingProvider {
        async fn complete(&self, _prompt: &str, _settings: &ProviderSettings) -> Result<String, LlmError> {
            let mut jobs = store::load_jobs(self.kv.as_ref()).await.unwrap();
            (self.edit)(&mut jobs);
            store::save_jobs(self.kv.as_ref(), &jobs).await.unwrap();
            Ok(DESIRABLE.to_string())
        }

        async fn verify_key(&self, _settings: &ProviderSettings) -> Result<(), LlmError> {
            Ok(())
        }
    }

    fn sync_settings(eligibility: bool) -> SyncSettings {
        SyncSettings {
            scoring_settings: ScoringSettings {
                enabled: true,
                desirability_criteria: vec![
                    ScoringCriterion {
                        name: "Remote".to_string(),
                        preference: "remote only".to_string(),
                        priority: Priority::High,
                    },
                    ScoringCriterion {
                        name: "Visa".to_string(),
                        preference: "needs sponsorship".to_string(),
                        priority: Priority::Mandatory,
                    },
                ],
                eligibility_criteria: if eligibility {
                    vec![
                        EligibilityCriterion {
                            name: "Skills".to_string(),
                            details: "Rust, Go".to_string(),
                            weight: 60,
                        },
                        EligibilityCriterion {
                            name: "Experience".to_string(),
                            details: "6 years".to_string(),
                            weight: 40,
                        },
                    ]
                } else {
                    vec![]
                },
                ..Default::default()
            },
            llm_scoring_settings: Some(ProviderSettings {
                enabled: true,
                provider: ProviderKind::Anthropic,
                api_key: "key".to_string(),
                model: "claude-3-5-haiku-latest".to_string(),
                endpoint: None,
            }),
            ..Default::default()
        }
    }

    fn job(n: u32) -> JobRecord {
        JobRecord {
            url: format!("https://jobs.example.com/{n}"),
            title: format!("Job {n}"),
            scraped_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, n).unwrap()),
            ..Default::default()
        }
    }

    const DESIRABLE: &str =
        r#"{"scores": [{"name": "Remote", "score": 80}, {"name": "Visa", "score": 100}], "summary": "Good fit."}"#;

    #[test]
    fn test_parse_score_reply_json() {
        let (scores, summary) = parse_score_reply(DESIRABLE).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(summary, "Good fit.");
    }

    #[test]
    fn test_parse_score_reply_regex_fallback() {
        let raw = r##"Here: {"scores": [{"name": "Remote", "score": 70}, {"name": "Visa", "score": "0"}, ], "summary": "Needs \"visa\"." "##;
        let (scores, summary) = parse_score_reply(raw).unwrap();
        assert_eq!(scores[0].score, 70.0);
        assert_eq!(scores[1].score, 0.0);
        assert_eq!(summary, r#"Needs "visa"."#);
    }

    #[test]
    fn test_parse_score_reply_nothing_recovered() {
        assert!(parse_score_reply("I cannot help with that.").is_none());
        assert!(parse_score_reply(r#"{"scores": [], "summary": "n/a"}"#).is_none());
    }

    #[test]
    fn test_resolve_requires_enabled_settings() {
        let fake = FakeProvider::new(vec![]);
        let mut sync = sync_settings(false);
        sync.scoring_settings.enabled = false;
        assert!(matches!(
            ScoringContext::resolve(&fake, &sync),
            Err(AppError::Config(_))
        ));

        let mut sync = sync_settings(false);
        sync.llm_scoring_settings = None;
        assert!(matches!(
            ScoringContext::resolve(&fake, &sync),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_score_job_both_passes() {
        let fake = FakeProvider::new(vec![
            Ok(DESIRABLE.to_string()),
            Ok(r#"{"scores": [{"name": "Skills", "score": 90}, {"name": "Experience", "score": 50}], "summary": "Strong."}"#.to_string()),
        ]);
        let sync = SyncSettings {
            resume_text: Some("Rust developer".to_string()),
            ..sync_settings(true)
        };
        let ctx = ScoringContext::resolve(&fake, &sync).unwrap();
        let scores = score_job(&ctx, &job(1)).await.unwrap();
        assert_eq!(scores.desirability.final_score, 80);
        let (eligibility, summary) = scores.eligibility.clone().unwrap();
        assert_eq!(eligibility.final_score, 74);
        assert_eq!(summary, "Strong.");
        assert!(fake.prompts()[1].contains("Rust developer"));

        let mut record = job(1);
        apply_scores(&mut record, scores, ctx.settings);
        // 80·0.7 + 74·0.3 = 78.2
        assert_eq!(record.overall_score, Some(78));
        assert_eq!(record.apply_reason.as_deref(), Some("meets threshold"));
    }

    #[tokio::test]
    async fn test_batch_missing_skips_failures_and_keeps_going() {
        let kv = MemoryStore::new();
        let mut already = job(2);
        already.desirability_score = Some(40);
        store::save_jobs(&kv, &[job(1), already, job(3)]).await.unwrap();

        let fake = FakeProvider::new(vec![
            Err(LlmError::Api {
                status: 500,
                message: "overloaded".to_string(),
            }),
            Ok(DESIRABLE.to_string()),
        ]);
        let sync = sync_settings(false);
        let ctx = ScoringContext::resolve(&fake, &sync).unwrap();

        let report = score_batch(&kv, &ctx, ScoreTarget::Missing).await.unwrap();
        assert_eq!(report.scored, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(fake.prompts().len(), 2);

        let jobs = store::load_jobs(&kv).await.unwrap();
        assert_eq!(jobs[0].desirability_score, None);
        assert_eq!(jobs[1].desirability_score, Some(40));
        assert_eq!(jobs[2].desirability_score, Some(80));
        assert_eq!(jobs[2].overall_score_weights.as_deref(), Some("70:30"));
    }

    #[tokio::test]
    async fn test_batch_latest_scores_only_last_record() {
        let kv = MemoryStore::new();
        store::save_jobs(&kv, &[job(1), job(2)]).await.unwrap();
        let fake = FakeProvider::new(vec![Ok(DESIRABLE.to_string())]);
        let sync = sync_settings(false);
        let ctx = ScoringContext::resolve(&fake, &sync).unwrap();

        let report = score_batch(&kv, &ctx, ScoreTarget::Latest).await.unwrap();
        assert_eq!(report.scored, 1);
        let jobs = store::load_jobs(&kv).await.unwrap();
        assert!(jobs[0].desirability_score.is_none());
        assert!(jobs[1].desirability_score.is_some());
    }

    #[tokio::test]
    async fn test_score_stored_record_removed_is_gone() {
        let kv = MemoryStore::new();
        let fake = FakeProvider::new(vec![]);
        let sync = sync_settings(false);
        let ctx = ScoringContext::resolve(&fake, &sync).unwrap();
        let outcome = score_stored(&kv, &ctx, &job(9).identity()).await.unwrap();
        assert_eq!(outcome, ItemOutcome::Gone);
    }

    #[tokio::test]
    async fn test_score_stored_record_removed_mid_flight_is_gone() {
        let kv = Arc::new(MemoryStore::new());
        store::save_jobs(kv.as_ref(), &[job(1), job(2)]).await.unwrap();
        let provider = EditingProvider {
            kv: kv.clone(),
            edit: |jobs| jobs.retain(|j| j.url != job(1).url),
        };
        let sync = sync_settings(false);
        let ctx = ScoringContext::resolve(&provider, &sync).unwrap();

        let outcome = score_stored(kv.as_ref(), &ctx, &job(1).identity()).await.unwrap();
        assert_eq!(outcome, ItemOutcome::Gone);
        let jobs = store::load_jobs(kv.as_ref()).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, job(2).url);
        assert!(jobs[0].desirability_score.is_none());
    }

    #[tokio::test]
    async fn test_score_stored_keeps_records_added_mid_flight() {
        let kv = Arc::new(MemoryStore::new());
        store::save_jobs(kv.as_ref(), &[job(1)]).await.unwrap();
        let provider = EditingProvider {
            kv: kv.clone(),
            edit: |jobs| {
                jobs[0].company = "Renamed Co".to_string();
                jobs.push(job(2));
            },
        };
        let sync = sync_settings(false);
        let ctx = ScoringContext::resolve(&provider, &sync).unwrap();

        let outcome = score_stored(kv.as_ref(), &ctx, &job(1).identity()).await.unwrap();
        let ItemOutcome::Scored(scored) = outcome else {
            panic!("expected the record to be scored");
        };
        assert_eq!(scored.desirability_score, Some(80));

        let jobs = store::load_jobs(kv.as_ref()).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].desirability_score, Some(80));
        assert_eq!(jobs[0].company, "Renamed Co");
        assert_eq!(jobs[1].url, job(2).url);
        assert!(jobs[1].desirability_score.is_none());
    }

    #[tokio::test]
    async fn test_failed_eligibility_pass_leaves_record_unscored() {
        let kv = MemoryStore::new();
        store::save_jobs(&kv, &[job(1)]).await.unwrap();
        let fake = FakeProvider::new(vec![
            Ok(DESIRABLE.to_string()),
            Err(LlmError::Api {
                status: 503,
                message: "unavailable".to_string(),
            }),
        ]);
        let sync = SyncSettings {
            resume_text: Some("Rust developer".to_string()),
            ..sync_settings(true)
        };
        let ctx = ScoringContext::resolve(&fake, &sync).unwrap();

        let report = score_batch(&kv, &ctx, ScoreTarget::Missing).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(fake.prompts().len(), 2);

        let stored = &store::load_jobs(&kv).await.unwrap()[0];
        assert!(stored.desirability_score.is_none());
        assert!(stored.eligibility_score.is_none());
        assert!(stored.overall_score.is_none());
        assert!(needs_scoring(stored, ctx.settings));
    }
}
