//! Field Extractor: turns a DOM snapshot into a `JobRecord` plus a provenance trace.
//!
//! Resolution is tiered and first-match-wins per field:
//! platform rules → JSON-LD `JobPosting` → head metadata → body heuristics,
//! followed by a derived regex pass over the description.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::models::job::JobRecord;

pub mod details;
pub mod heuristics;
pub mod meta;
pub mod page;
pub mod platforms;
pub mod schema;

pub use page::Page;
use platforms::PlatformRule;

/// What the extension captured from the active tab.
#[derive(Debug, Clone, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    #[serde(rename = "platform-specific")]
    Platform,
    #[serde(rename = "schema")]
    Schema,
    #[serde(rename = "head-meta")]
    HeadMeta,
    #[serde(rename = "body")]
    Body,
    #[serde(rename = "derived")]
    Derived,
    #[serde(rename = "llm")]
    Llm,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Platform => "platform-specific",
            Tier::Schema => "schema",
            Tier::HeadMeta => "head-meta",
            Tier::Body => "body",
            Tier::Derived => "derived",
            Tier::Llm => "llm",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSource {
    pub tier: Tier,
    pub selector: String,
}

/// Which tier and selector produced each field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionTrace {
    pub source: String,
    pub tiers: Vec<Tier>,
    pub fields: BTreeMap<String, FieldSource>,
}

impl ExtractionTrace {
    pub fn record(&mut self, field: &str, tier: Tier, selector: impl Into<String>) {
        if !self.tiers.contains(&tier) {
            self.tiers.push(tier);
        }
        self.fields.insert(
            field.to_string(),
            FieldSource {
                tier,
                selector: selector.into(),
            },
        );
    }

    fn joined_tiers(&self) -> String {
        let joined = self
            .tiers
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join("+");
        if joined.is_empty() {
            "html".to_string()
        } else {
            joined
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractOutcome {
    Found { job: JobRecord, trace: ExtractionTrace },
    NotFound,
}

/// The four fields the lookup tiers compete for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobField {
    Title,
    Company,
    Locations,
    Description,
}

impl JobField {
    pub fn as_str(self) -> &'static str {
        match self {
            JobField::Title => "title",
            JobField::Company => "company",
            JobField::Locations => "locations",
            JobField::Description => "description",
        }
    }

    fn slot(self, job: &mut JobRecord) -> &mut String {
        match self {
            JobField::Title => &mut job.title,
            JobField::Company => &mut job.company,
            JobField::Locations => &mut job.locations,
            JobField::Description => &mut job.description,
        }
    }
}

/// A lookup hit: the value and a label for the selector that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Found {
    pub value: String,
    pub selector: String,
}

impl Found {
    pub fn new(value: impl Into<String>, selector: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self {
                value: value.trim().to_string(),
                selector: selector.into(),
            })
        }
    }
}

pub type Lookup = fn(&Page) -> Option<Found>;

/// Generic tiers after JSON-LD, in resolution order.
const GENERIC_PLAN: &[(JobField, Tier, &[Lookup])] = &[
    (JobField::Title, Tier::HeadMeta, &[meta::title as Lookup]),
    (JobField::Company, Tier::HeadMeta, &[meta::company as Lookup]),
    (JobField::Locations, Tier::HeadMeta, &[meta::locations as Lookup]),
    (JobField::Description, Tier::HeadMeta, &[meta::description as Lookup]),
    (JobField::Title, Tier::Body, &[heuristics::title as Lookup]),
    (
        JobField::Company,
        Tier::Body,
        &[
            heuristics::company_container as Lookup,
            heuristics::company_selector as Lookup,
            heuristics::company_meta_line as Lookup,
        ],
    ),
    (
        JobField::Locations,
        Tier::Body,
        &[
            heuristics::location_container as Lookup,
            heuristics::location_selector as Lookup,
        ],
    ),
    (JobField::Description, Tier::Body, &[heuristics::description as Lookup]),
];

/// Runs lookups in order, first `Some` wins.
pub fn first_match(lookups: &[Lookup], page: &Page) -> Option<Found> {
    lookups.iter().find_map(|lookup| lookup(page))
}

/// DOM extractor. Platform rules are pluggable; the generic tiers are fixed.
pub struct Extractor {
    platforms: Vec<PlatformRule>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            platforms: platforms::default_rules(),
        }
    }
}

impl Extractor {
    pub fn with_platforms(platforms: Vec<PlatformRule>) -> Self {
        Self { platforms }
    }

    pub fn extract(&self, url: &Url, html: &str) -> ExtractOutcome {
        let page = Page::new(url.clone(), html);

        let resolved = self
            .platform_pass(&page)
            .or_else(|| Some(generic_pass(&page)))
            .filter(|(job, _)| job.has_content());

        match resolved {
            Some((mut job, mut trace)) => {
                details::apply(&mut job, &mut trace);
                debug!(url = %url, source = %trace.source, "extracted job fields");
                ExtractOutcome::Found { job, trace }
            }
            None => ExtractOutcome::NotFound,
        }
    }

    /// A platform rule that yields a title or description wins outright for the page.
    fn platform_pass(&self, page: &Page) -> Option<(JobRecord, ExtractionTrace)> {
        let rule = self
            .platforms
            .iter()
            .find(|rule| page.host.contains(rule.host_fragment))?;
        let hit = (rule.scrape)(page)?;

        let mut job = base_record(page);
        let mut trace = ExtractionTrace {
            source: format!("{}-specific", rule.name),
            tiers: vec![Tier::Platform],
            ..Default::default()
        };
        for (field, found) in hit.fields {
            *field.slot(&mut job) = found.value;
            trace.record(field.as_str(), Tier::Platform, found.selector);
        }
        if job.has_content() {
            Some((job, trace))
        } else {
            None
        }
    }
}

fn base_record(page: &Page) -> JobRecord {
    JobRecord {
        source: page.host.clone(),
        url: page.url.to_string(),
        ..Default::default()
    }
}

fn generic_pass(page: &Page) -> (JobRecord, ExtractionTrace) {
    let mut job = base_record(page);
    let mut trace = ExtractionTrace::default();

    if let Some(posting) = schema::find_job_posting(page) {
        trace.tiers.push(Tier::Schema);
        if let Some(url) = posting.url.filter(|u| !u.trim().is_empty()) {
            job.url = url;
            trace.record("url", Tier::Schema, "schema");
        }
        for (field, value) in [
            (JobField::Title, posting.title),
            (JobField::Company, posting.company),
            (JobField::Locations, posting.location),
            (JobField::Description, posting.description),
        ] {
            if !value.trim().is_empty() {
                *field.slot(&mut job) = value.trim().to_string();
                trace.record(field.as_str(), Tier::Schema, "schema");
            }
        }
    }

    for (field, tier, lookups) in GENERIC_PLAN {
        if !field.slot(&mut job).is_empty() {
            continue;
        }
        if let Some(found) = first_match(lookups, page) {
            *field.slot(&mut job) = found.value;
            trace.record(field.as_str(), *tier, found.selector);
        }
    }

    trace.source = trace.joined_tiers();
    (job, trace)
}
