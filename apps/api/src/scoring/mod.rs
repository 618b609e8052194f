//! Scoring engine: weighted desirability and eligibility passes, the mandatory
//! gate, and the cached overall score with its apply decision.
//!
//! Everything in this file is pure. Acquiring sub-scores from a model lives in
//! `scorer`, settings checks in `validation`.

use serde::{Deserialize, Serialize};

use crate::models::job::{ApplyDecision, BreakdownItem, JobRecord};
use crate::models::settings::{EligibilityCriterion, Priority, ScoringCriterion, ScoringSettings};

pub mod prompts;
pub mod scorer;
pub mod validation;

/// Sub-score assumed for a criterion the model did not return.
pub const MISSING_SUB_SCORE: u32 = 50;

// ────────────────────────────────────────────────────────────────────────────
// Aggregation
// ────────────────────────────────────────────────────────────────────────────

/// One `{name, score}` pair as returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    #[serde(alias = "category", alias = "criterion")]
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedScore {
    pub final_score: u32,
    pub breakdown: Vec<BreakdownItem>,
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Looks up a criterion's sub-score by normalized name, clamped to 0–100.
/// Non-finite values count as 0; a missing criterion gets [`MISSING_SUB_SCORE`].
fn raw_sub_score(name: &str, ai_scores: &[SubScore]) -> f64 {
    let wanted = normalize_name(name);
    ai_scores
        .iter()
        .find(|s| normalize_name(&s.name) == wanted)
        .map(|s| {
            if s.score.is_finite() {
                s.score.clamp(0.0, 100.0)
            } else {
                0.0
            }
        })
        .unwrap_or(f64::from(MISSING_SUB_SCORE))
}

fn sub_score_for(name: &str, ai_scores: &[SubScore]) -> u32 {
    raw_sub_score(name, ai_scores).round() as u32
}

fn weighted_average(items: impl Iterator<Item = (u32, u32)>) -> u32 {
    let (sum, total_weight) = items.fold((0u64, 0u64), |(sum, total), (score, weight)| {
        (sum + u64::from(score) * u64::from(weight), total + u64::from(weight))
    });
    if total_weight == 0 {
        0
    } else {
        (sum as f64 / total_weight as f64).round() as u32
    }
}

/// Desirability aggregation.
///
/// - `exclude` criteria are dropped entirely (no breakdown entry).
/// - `mandatory` criteria carry weight 0 and act as a gate: any mandatory
///   sub-score of exactly 0 (before rounding) forces the final score to 0.
///   A mandatory criterion that passes the gate is recorded as at least 1, so
///   a 0 in the breakdown always means the gate tripped.
/// - Everything else is `round(Σ score·weight / Σ weight)`, 0 when the total weight is 0.
pub fn calculate_weighted_score(criteria: &[ScoringCriterion], ai_scores: &[SubScore]) -> WeightedScore {
    let mut gate_failed = false;
    let breakdown: Vec<BreakdownItem> = criteria
        .iter()
        .filter(|c| c.priority != Priority::Exclude)
        .map(|c| {
            let raw = raw_sub_score(&c.name, ai_scores);
            let mut score = raw.round() as u32;
            if c.priority == Priority::Mandatory {
                if raw == 0.0 {
                    gate_failed = true;
                } else {
                    score = score.max(1);
                }
            }
            BreakdownItem {
                category: c.name.clone(),
                priority: Some(c.priority),
                score,
                weight: c.priority.weight(),
            }
        })
        .collect();

    let final_score = if gate_failed {
        0
    } else {
        weighted_average(
            breakdown
                .iter()
                .filter(|b| b.priority != Some(Priority::Mandatory))
                .map(|b| (b.score, b.weight)),
        )
    };

    WeightedScore {
        final_score,
        breakdown,
    }
}

/// Eligibility aggregation: each criterion weighs its configured percentage. No gate.
pub fn calculate_eligibility_score(
    criteria: &[EligibilityCriterion],
    ai_scores: &[SubScore],
) -> WeightedScore {
    let breakdown: Vec<BreakdownItem> = criteria
        .iter()
        .map(|c| BreakdownItem {
            category: c.name.clone(),
            priority: None,
            score: sub_score_for(&c.name, ai_scores),
            weight: c.weight,
        })
        .collect();

    WeightedScore {
        final_score: weighted_average(breakdown.iter().map(|b| (b.score, b.weight))),
        breakdown,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Overall score & apply decision
// ────────────────────────────────────────────────────────────────────────────

/// `"D:E"`, e.g. `"70:30"`. Cached overall fields are valid only for this split.
pub fn weight_fingerprint(settings: &ScoringSettings) -> String {
    format!("{}:{}", settings.desirability_weight, settings.eligibility_weight)
}

pub fn overall_header(settings: &ScoringSettings) -> String {
    format!("Overall Score ({})", weight_fingerprint(settings))
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverallScore {
    pub score: u32,
    pub decision: ApplyDecision,
    pub reason: String,
}

/// `round(d·dw/100 + e·ew/100)`, a missing pass counting as 0, then the apply decision.
pub fn compute_overall(job: &JobRecord, settings: &ScoringSettings) -> OverallScore {
    let d = f64::from(job.desirability_score.unwrap_or(0));
    let e = f64::from(job.eligibility_score.unwrap_or(0));
    let score = (d * f64::from(settings.desirability_weight) / 100.0
        + e * f64::from(settings.eligibility_weight) / 100.0)
        .round() as u32;

    let failed_mandatory = job
        .desirability_breakdown
        .iter()
        .flatten()
        .find(|b| b.priority == Some(Priority::Mandatory) && b.score == 0);

    let (decision, reason) = if score < settings.threshold {
        (ApplyDecision::No, "below threshold".to_string())
    } else if let Some(failed) = failed_mandatory {
        (
            ApplyDecision::No,
            format!("failed mandatory criterion: {}", failed.category),
        )
    } else {
        (ApplyDecision::Yes, "meets threshold".to_string())
    };

    OverallScore {
        score,
        decision,
        reason,
    }
}

/// Brings the cached overall fields in line with `settings`.
///
/// Unscored records carry no overall fields. Scored records are recomputed when
/// the cache is missing or was computed with a different weight split.
/// Returns whether the record changed.
pub fn refresh_overall(job: &mut JobRecord, settings: &ScoringSettings) -> bool {
    if job.desirability_score.is_none() && job.eligibility_score.is_none() {
        let had_cache = job.overall_score.is_some() || job.overall_score_weights.is_some();
        job.clear_overall();
        return had_cache;
    }

    let fingerprint = weight_fingerprint(settings);
    if job.overall_score.is_some() && job.overall_score_weights.as_deref() == Some(&fingerprint) {
        return false;
    }

    store_overall(job, settings);
    true
}

/// Recomputes and stores the overall fields unconditionally.
pub fn store_overall(job: &mut JobRecord, settings: &ScoringSettings) {
    let overall = compute_overall(job, settings);
    job.overall_score = Some(overall.score);
    job.overall_score_header = Some(overall_header(settings));
    job.overall_score_weights = Some(weight_fingerprint(settings));
    job.apply_decision = Some(overall.decision);
    job.apply_reason = Some(overall.reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crit(name: &str, priority: Priority) -> ScoringCriterion {
        ScoringCriterion {
            name: name.to_string(),
            preference: String::new(),
            priority,
        }
    }

    fn sub(name: &str, score: f64) -> SubScore {
        SubScore {
            name: name.to_string(),
            score,
        }
    }

    fn elig(name: &str, weight: u32) -> EligibilityCriterion {
        EligibilityCriterion {
            name: name.to_string(),
            details: String::new(),
            weight,
        }
    }

    #[test]
    fn test_empty_criteria_scores_zero() {
        let result = calculate_weighted_score(&[], &[sub("anything", 90.0)]);
        assert_eq!(result.final_score, 0);
        assert!(result.breakdown.is_empty());
    }

    #[test]
    fn test_mandatory_zero_forces_zero() {
        let criteria = [crit("A", Priority::High), crit("B", Priority::Mandatory)];
        let result = calculate_weighted_score(&criteria, &[sub("A", 80.0), sub("B", 0.0)]);
        assert_eq!(result.final_score, 0);
        assert_eq!(result.breakdown.len(), 2);
        assert_eq!(result.breakdown[1].weight, 0);
    }

    #[test]
    fn test_mandatory_zero_beats_perfect_scores() {
        let criteria = [
            crit("Remote", Priority::High),
            crit("Salary", Priority::Medium),
            crit("Visa", Priority::Mandatory),
        ];
        let scores = [sub("Remote", 100.0), sub("Salary", 100.0), sub("Visa", 0.0)];
        assert_eq!(calculate_weighted_score(&criteria, &scores).final_score, 0);
    }

    #[test]
    fn test_mandatory_gate_uses_unrounded_score() {
        let criteria = [crit("A", Priority::High), crit("Visa", Priority::Mandatory)];
        let result = calculate_weighted_score(&criteria, &[sub("A", 80.0), sub("Visa", 0.4)]);
        assert_eq!(result.final_score, 80);
        assert_eq!(result.breakdown[1].score, 1);

        let job = JobRecord {
            desirability_score: Some(result.final_score),
            desirability_breakdown: Some(result.breakdown),
            ..Default::default()
        };
        let settings = ScoringSettings {
            desirability_weight: 100,
            eligibility_weight: 0,
            ..Default::default()
        };
        assert_eq!(compute_overall(&job, &settings).reason, "meets threshold");

        // negative values clamp to a real 0 and still trip the gate
        let result = calculate_weighted_score(&criteria, &[sub("A", 80.0), sub("Visa", -3.0)]);
        assert_eq!(result.final_score, 0);
    }

    #[test]
    fn test_passing_mandatory_does_not_weigh() {
        let criteria = [crit("A", Priority::High), crit("B", Priority::Mandatory)];
        let result = calculate_weighted_score(&criteria, &[sub("A", 80.0), sub("B", 100.0)]);
        assert_eq!(result.final_score, 80);
    }

    #[test]
    fn test_weighted_mix_and_missing_default() {
        // high 90 (w3), medium missing → 50 (w2), low 20 (w1): (270 + 100 + 20) / 6 = 65
        let criteria = [
            crit("Remote", Priority::High),
            crit("Team", Priority::Medium),
            crit("Perks", Priority::Low),
        ];
        let result = calculate_weighted_score(&criteria, &[sub("remote ", 90.0), sub("PERKS", 20.0)]);
        assert_eq!(result.final_score, 65);
        assert_eq!(result.breakdown[1].score, MISSING_SUB_SCORE);
    }

    #[test]
    fn test_excluded_criteria_are_dropped() {
        let criteria = [crit("A", Priority::Low), crit("B", Priority::Exclude)];
        let result = calculate_weighted_score(&criteria, &[sub("A", 40.0), sub("B", 0.0)]);
        assert_eq!(result.final_score, 40);
        assert_eq!(result.breakdown.len(), 1);
    }

    #[test]
    fn test_only_mandatory_criteria_total_weight_zero() {
        let criteria = [crit("A", Priority::Mandatory)];
        let result = calculate_weighted_score(&criteria, &[sub("A", 100.0)]);
        assert_eq!(result.final_score, 0);
    }

    #[test]
    fn test_scores_are_clamped_and_rounded() {
        let criteria = [crit("A", Priority::High), crit("B", Priority::Low)];
        let result = calculate_weighted_score(&criteria, &[sub("A", 140.0), sub("B", 49.6)]);
        assert_eq!(result.breakdown[0].score, 100);
        assert_eq!(result.breakdown[1].score, 50);
        // (300 + 50) / 4 = 87.5 → 88
        assert_eq!(result.final_score, 88);
    }

    #[test]
    fn test_aggregation_ignores_criterion_order() {
        let criteria = vec![
            crit("A", Priority::High),
            crit("B", Priority::Medium),
            crit("C", Priority::Low),
            crit("D", Priority::Mandatory),
        ];
        let scores = [sub("A", 73.0), sub("B", 41.0), sub("C", 12.0), sub("D", 60.0)];
        let forward = calculate_weighted_score(&criteria, &scores).final_score;
        let mut reversed = criteria.clone();
        reversed.reverse();
        assert_eq!(calculate_weighted_score(&reversed, &scores).final_score, forward);
        let mut rotated = criteria;
        rotated.rotate_left(2);
        assert_eq!(calculate_weighted_score(&rotated, &scores).final_score, forward);
    }

    #[test]
    fn test_eligibility_weighted_by_percentage() {
        let criteria = [elig("X", 60), elig("Y", 40)];
        let result = calculate_eligibility_score(&criteria, &[sub("X", 90.0), sub("Y", 50.0)]);
        assert_eq!(result.final_score, 74);
        assert_eq!(result.breakdown[0].priority, None);
    }

    #[test]
    fn test_eligibility_zero_weights() {
        let result = calculate_eligibility_score(&[elig("X", 0)], &[sub("X", 90.0)]);
        assert_eq!(result.final_score, 0);
    }

    fn scored_job(d: u32, e: Option<u32>) -> JobRecord {
        JobRecord {
            title: "Engineer".to_string(),
            desirability_score: Some(d),
            eligibility_score: e,
            ..Default::default()
        }
    }

    #[test]
    fn test_overall_and_decision() {
        let settings = ScoringSettings::default(); // 70:30, threshold 60
        let overall = compute_overall(&scored_job(80, Some(50)), &settings);
        assert_eq!(overall.score, 71);
        assert_eq!(overall.decision, ApplyDecision::Yes);

        let overall = compute_overall(&scored_job(80, None), &settings);
        assert_eq!(overall.score, 56);
        assert_eq!(overall.decision, ApplyDecision::No);
        assert_eq!(overall.reason, "below threshold");
    }

    #[test]
    fn test_failed_mandatory_named_in_reason() {
        let settings = ScoringSettings {
            threshold: 0,
            ..Default::default()
        };
        let mut job = scored_job(0, Some(90));
        job.desirability_breakdown = Some(vec![BreakdownItem {
            category: "Visa sponsorship".to_string(),
            priority: Some(Priority::Mandatory),
            score: 0,
            weight: 0,
        }]);
        let overall = compute_overall(&job, &settings);
        assert_eq!(overall.decision, ApplyDecision::No);
        assert_eq!(overall.reason, "failed mandatory criterion: Visa sponsorship");
    }

    #[test]
    fn test_weight_change_invalidates_cache() {
        let mut settings = ScoringSettings::default();
        let mut job = scored_job(80, Some(50));
        assert!(refresh_overall(&mut job, &settings));
        assert_eq!(job.overall_score, Some(71));
        assert_eq!(job.overall_score_header.as_deref(), Some("Overall Score (70:30)"));
        assert!(!refresh_overall(&mut job, &settings));

        settings.desirability_weight = 50;
        settings.eligibility_weight = 50;
        assert!(refresh_overall(&mut job, &settings));
        assert_eq!(job.overall_score, Some(65));
        assert_eq!(job.overall_score_weights.as_deref(), Some("50:50"));
    }

    #[test]
    fn test_unscored_record_has_no_overall() {
        let mut job = JobRecord {
            overall_score: Some(10),
            ..Default::default()
        };
        assert!(refresh_overall(&mut job, &ScoringSettings::default()));
        assert_eq!(job.overall_score, None);
        assert_eq!(job.apply_decision, None);
    }
}
