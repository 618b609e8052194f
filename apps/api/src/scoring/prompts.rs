// Prompts for desirability and eligibility scoring.
// Both ask for the same reply shape: {"scores": [{"name", "score"}], "summary"}.

use crate::extraction::page::truncate_chars;
use crate::llm_client::prompts::JSON_ONLY_FOOTER;
use crate::models::job::JobRecord;
use crate::models::settings::{EligibilityCriterion, Priority, ScoringCriterion};

/// Characters of description and resume text sent with a scoring prompt.
const TEXT_BUDGET: usize = 6000;

const REPLY_SHAPE: &str = r#"Return a JSON object with this EXACT structure:
{
  "scores": [
    {"name": "<criterion name exactly as given>", "score": 0}
  ],
  "summary": "Two or three sentences explaining the scores."
}
Every criterion listed above must appear in "scores" exactly once. Scores are integers from 0 to 100."#;

/// Replace: {criteria}, {job}, {reply_shape}, {footer}
pub const DESIRABILITY_PROMPT_TEMPLATE: &str = r#"You are evaluating how desirable a job posting is for a job seeker, judged against the seeker's own preferences.

PREFERENCES:
{criteria}

Score each preference from 0 (the job is the opposite of what the seeker wants) to 100 (a perfect match).
Preferences marked MANDATORY are deal-breakers: score 0 only when the posting clearly violates it; when the posting does not say, score 50.

JOB POSTING:
{job}

{reply_shape}

{footer}"#;

/// Replace: {criteria}, {resume}, {job}, {reply_shape}, {footer}
pub const ELIGIBILITY_PROMPT_TEMPLATE: &str = r#"You are evaluating how well a candidate meets the requirements of a job posting.

ELIGIBILITY DIMENSIONS (with what the candidate brings):
{criteria}

CANDIDATE BACKGROUND:
{resume}

Score each dimension from 0 (the candidate clearly does not qualify) to 100 (the candidate fully qualifies), based on the job's requirements for that dimension.

JOB POSTING:
{job}

{reply_shape}

{footer}"#;

pub fn render_job(job: &JobRecord) -> String {
    let fields = [
        ("Title", job.title.as_str()),
        ("Company", job.company.as_str()),
        ("Locations", job.locations.as_str()),
        ("Job Type", job.job_type.as_str()),
        ("Work Mode", job.work_mode.as_str()),
        ("Experience Level", job.experience_level.as_str()),
        ("Education Level", job.education_level.as_str()),
        ("Duration", job.duration.as_str()),
        ("Salary and Benefits", job.salary_and_benefits.as_str()),
        ("Visa Sponsorship", job.visa_sponsorship.as_str()),
        ("Responsibilities", job.responsibilities.as_str()),
        ("Required Skills", job.required_skills.as_str()),
        ("Preferred Skills", job.preferred_skills.as_str()),
    ];
    let mut out: Vec<String> = fields
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(label, v)| format!("{label}: {v}"))
        .collect();
    if !job.description.trim().is_empty() {
        out.push(format!(
            "Description:\n{}",
            truncate_chars(job.description.trim(), TEXT_BUDGET)
        ));
    }
    out.join("\n")
}

pub fn build_desirability_prompt(criteria: &[ScoringCriterion], job: &JobRecord) -> String {
    let lines = criteria
        .iter()
        .filter(|c| c.priority != Priority::Exclude)
        .map(|c| {
            let tier = if c.priority == Priority::Mandatory {
                "MANDATORY".to_string()
            } else {
                format!("priority: {}", c.priority.as_str())
            };
            format!("- {} ({tier}): {}", c.name, c.preference.trim())
        })
        .collect::<Vec<_>>()
        .join("\n");

    DESIRABILITY_PROMPT_TEMPLATE
        .replace("{criteria}", &lines)
        .replace("{reply_shape}", REPLY_SHAPE)
        .replace("{footer}", JSON_ONLY_FOOTER)
        .replace("{job}", &render_job(job))
}

pub fn build_eligibility_prompt(
    criteria: &[EligibilityCriterion],
    resume_text: Option<&str>,
    job: &JobRecord,
) -> String {
    let lines = criteria
        .iter()
        .map(|c| {
            let details = if c.details.trim().is_empty() {
                "see candidate background"
            } else {
                c.details.trim()
            };
            format!("- {} (weight {}%): {details}", c.name, c.weight)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let resume = resume_text
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| truncate_chars(r, TEXT_BUDGET))
        .unwrap_or_else(|| "(no resume provided)".to_string());

    ELIGIBILITY_PROMPT_TEMPLATE
        .replace("{criteria}", &lines)
        .replace("{reply_shape}", REPLY_SHAPE)
        .replace("{footer}", JSON_ONLY_FOOTER)
        .replace("{resume}", &resume)
        .replace("{job}", &render_job(job))
}
