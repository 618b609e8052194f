//! Derived-field pass: keyword and regex matching over the resolved description.

use std::sync::LazyLock;

use regex::Regex;

use super::{ExtractionTrace, Tier};
use crate::models::job::JobRecord;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static FULL_TIME: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(full-time|full time)\b"));
static PART_TIME: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(part-time|part time)\b"));
static CONTRACT: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(contract|freelance)\b"));
static INTERNSHIP: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(internship|intern)\b"));

static REMOTE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(remote|work from home|wfh)\b"));
static HYBRID: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bhybrid\b"));
static ON_SITE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(on-site|onsite|in office)\b"));

static YEARS_RANGE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)(\d{1,2})\s*(\+|-|to)\s*(\d{1,2})?\s*years?"));
static YEARS: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)(\d{1,2})\+?\s*years?"));
static ENTRY_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(entry-level|entry level|graduate|student)\b"));
static SENIOR_LEVEL: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(senior-level|senior level)\b"));

static BACHELOR: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(undergraduate|bachelor's|bachelor|bs|ba)\b"));
static MASTER: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(master's|master|ms|ma)\b"));
static PHD: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(phd|doctorate)\b"));

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)(\d+\s*(months?|years?)\s*contract|\b(internship|contract)\b\s*for\s*\d+\s*months?|\b(\w+)-(week|month|year)\s+internship\b)")
});

static SALARY: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)(\$|€|£|CAD)\s?[\d,.]+\s*-\s*(\$|€|£|CAD)?\s?[\d,.]+"));

static VISA: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(visa|sponsorship)\b"));
static NO_VISA: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(no|not|unable to)\s+(visa|sponsorship)\b"));

static ANY_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(responsibilities|what you'll do|your role|qualifications|requirements|skills|preferred|nice to have|education|experience|who can apply)\b")
});
static RESPONSIBILITIES: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(responsibilities|what you'll do|your role|the role|day-to-day)\b")
});
static REQUIRED: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(basic qualifications|requirements|required skills|minimum qualifications|experience|skills|who can apply)\b")
});
static PREFERRED: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(preferred qualifications|preferred skills|nice to have|bonus points)\b")
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Details {
    pub job_type: String,
    pub work_mode: String,
    pub experience_level: String,
    pub education_level: String,
    pub duration: String,
    pub salary_and_benefits: String,
    pub visa_sponsorship: String,
    pub responsibilities: String,
    pub required_skills: String,
    pub preferred_skills: String,
}

fn first_label(text: &str, rules: &[(&Regex, &str)]) -> String {
    rules
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, label)| label.to_string())
        .unwrap_or_default()
}

fn first_match(text: &str, re: &Regex) -> String {
    re.find(text).map(|m| m.as_str().to_string()).unwrap_or_default()
}

/// Text after the first `start` heading up to the next heading of any kind.
fn section(text: &str, start: &Regex) -> String {
    let Some(m) = start.find(text) else {
        return String::new();
    };
    let rest = &text[m.end()..];
    let end = ANY_HEADING.find(rest).map(|e| e.start()).unwrap_or(rest.len());
    rest[..end].trim().to_string()
}

pub fn derive(text: &str) -> Details {
    if text.is_empty() {
        return Details::default();
    }

    let experience_level = YEARS_RANGE
        .find(text)
        .or_else(|| YEARS.find(text))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| {
            first_label(
                text,
                &[(&*ENTRY_LEVEL, "Entry-level"), (&*SENIOR_LEVEL, "Senior")],
            )
        });

    let visa_sponsorship = if NO_VISA.is_match(text) {
        "Not available".to_string()
    } else if VISA.is_match(text) {
        "Possibly available".to_string()
    } else {
        String::new()
    };

    Details {
        job_type: first_label(
            text,
            &[
                (&*FULL_TIME, "Full-time"),
                (&*PART_TIME, "Part-time"),
                (&*CONTRACT, "Contract"),
                (&*INTERNSHIP, "Internship"),
            ],
        ),
        work_mode: first_label(
            text,
            &[(&*REMOTE, "Remote"), (&*HYBRID, "Hybrid"), (&*ON_SITE, "On-site")],
        ),
        experience_level,
        education_level: first_label(
            text,
            &[
                (&*BACHELOR, "Bachelor's Degree"),
                (&*MASTER, "Master's Degree"),
                (&*PHD, "PhD"),
            ],
        ),
        duration: first_match(text, &DURATION),
        salary_and_benefits: first_match(text, &SALARY),
        visa_sponsorship,
        responsibilities: section(text, &RESPONSIBILITIES),
        required_skills: section(text, &REQUIRED),
        preferred_skills: section(text, &PREFERRED),
    }
}

/// Fills the derived fields from the description and records their provenance.
pub fn apply(job: &mut JobRecord, trace: &mut ExtractionTrace) {
    let details = derive(&job.description);
    let slots: [(&str, &mut String, String); 10] = [
        ("jobType", &mut job.job_type, details.job_type),
        ("workMode", &mut job.work_mode, details.work_mode),
        ("experienceLevel", &mut job.experience_level, details.experience_level),
        ("educationLevel", &mut job.education_level, details.education_level),
        ("duration", &mut job.duration, details.duration),
        ("salaryAndBenefits", &mut job.salary_and_benefits, details.salary_and_benefits),
        ("visaSponsorship", &mut job.visa_sponsorship, details.visa_sponsorship),
        ("responsibilities", &mut job.responsibilities, details.responsibilities),
        ("requiredSkills", &mut job.required_skills, details.required_skills),
        ("preferredSkills", &mut job.preferred_skills, details.preferred_skills),
    ];
    for (name, slot, value) in slots {
        if !value.is_empty() {
            *slot = value;
            trace.record(name, Tier::Derived, "description");
        }
    }
}
