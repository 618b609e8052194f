//! Hostname-keyed rules for job boards whose markup defeats the generic tiers.

use super::page::{formatted_text, inline_text, Page};
use super::{Found, JobField};

pub struct PlatformRule {
    /// Short name used in the trace source, e.g. `indeed-specific`.
    pub name: &'static str,
    pub host_fragment: &'static str,
    pub scrape: fn(&Page) -> Option<PlatformHit>,
}

#[derive(Debug, Default)]
pub struct PlatformHit {
    pub fields: Vec<(JobField, Found)>,
}

impl PlatformHit {
    fn push(&mut self, field: JobField, found: Option<Found>) {
        if let Some(found) = found {
            self.fields.push((field, found));
        }
    }

    fn has(&self, field: JobField) -> bool {
        self.fields.iter().any(|(f, _)| *f == field)
    }

    /// Only a title or description makes the page count as this platform's job page.
    fn into_hit(self) -> Option<Self> {
        if self.has(JobField::Title) || self.has(JobField::Description) {
            Some(self)
        } else {
            None
        }
    }
}

pub fn default_rules() -> Vec<PlatformRule> {
    vec![
        PlatformRule {
            name: "indeed",
            host_fragment: "indeed.com",
            scrape: indeed,
        },
        PlatformRule {
            name: "linkedin",
            host_fragment: "linkedin.com",
            scrape: linkedin,
        },
    ]
}

// ── Indeed ──────────────────────────────────────────────────────────────────

fn indeed(page: &Page) -> Option<PlatformHit> {
    let mut hit = PlatformHit::default();

    if let Some(header) = page.select_first(r#".ia-JobHeader-information, [class*="JobHeader"]"#) {
        let h1 = scraper::Selector::parse("h1").ok()?;
        if let Some(title) = header.select(&h1).next() {
            hit.push(JobField::Title, Found::new(inline_text(title), "indeed:h1"));
        }

        // "Company - Location"
        let span = scraper::Selector::parse(r#"span[class*="css-"]"#).ok()?;
        if let Some(el) = header.select(&span).next() {
            let text = inline_text(el);
            let parts: Vec<&str> = text.split('-').map(str::trim).collect();
            if parts.len() >= 2 {
                hit.push(JobField::Company, Found::new(parts[0], "indeed:span-split"));
                hit.push(
                    JobField::Locations,
                    Found::new(parts[1..].join(" - "), "indeed:span-split"),
                );
            } else {
                hit.push(JobField::Company, Found::new(text.as_str(), "indeed:span"));
            }
        }
    }

    if let Some(desc) = page.select_first(".ia-JobDescription") {
        hit.push(
            JobField::Description,
            Found::new(formatted_text(desc), "indeed:.ia-JobDescription"),
        );
    }

    hit.into_hit()
}

// ── LinkedIn ────────────────────────────────────────────────────────────────

const LINKEDIN_DESCRIPTION_SELECTORS: &[&str] = &[
    "#job-details > div > p",
    "div.jobs-description__content",
    "div.jobs-description__container",
    "section.jobs-description",
    "div[data-test-description]",
    r#"div[class*="jobs-description"]"#,
    r#"p[dir="ltr"]"#,
];

fn linkedin(page: &Page) -> Option<PlatformHit> {
    let mut hit = PlatformHit::default();

    let title = page
        .select_first(
            ".job-details-jobs-unified-top-card__job-title h1, h1.jobs-unified-top-card__job-title",
        )
        .and_then(|el| Found::new(inline_text(el), "linkedin:h1"))
        .or_else(|| {
            page.select_first(r#"[data-test-app-aware-link][href*="/jobs/view/"]"#)
                .and_then(|el| {
                    Found::new(inline_text(el), "linkedin:app-aware-link /jobs/view/")
                })
        });
    hit.push(JobField::Title, title);

    let company = page
        .select_first(".job-details-jobs-unified-top-card__company-name a")
        .and_then(|el| Found::new(inline_text(el), "linkedin:company-link"))
        .or_else(|| {
            page.select_first(
                ".topcard__org-name-link, .jobs-unified-top-card__company-name, \
                 .jobs-unified-top-card__subtitle-primary-group a",
            )
            .and_then(|el| Found::new(inline_text(el), "linkedin:company-container"))
        });
    hit.push(JobField::Company, company);

    let locations = page
        .select_first(".job-details-jobs-unified-top-card__primary-description-container span")
        .and_then(|el| Found::new(inline_text(el), "linkedin:top-card-bullet"))
        .or_else(|| {
            page.select_first("[data-test-topcard-location]")
                .and_then(|el| Found::new(inline_text(el), "linkedin:[data-test-topcard-location]"))
        });
    hit.push(JobField::Locations, locations);

    let description = LINKEDIN_DESCRIPTION_SELECTORS.iter().find_map(|sel| {
        page.select_first(sel)
            .and_then(|el| Found::new(formatted_text(el), format!("linkedin:{sel}")))
    });
    hit.push(JobField::Description, description);

    hit.into_hit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page(url: &str, html: &str) -> Page {
        Page::new(Url::parse(url).unwrap(), html)
    }

    fn value(hit: &PlatformHit, field: JobField) -> Option<&str> {
        hit.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, found)| found.value.as_str())
    }

    #[test]
    fn test_indeed_company_without_location() {
        let p = page(
            "https://www.indeed.com/viewjob",
            r#"<div class="ia-JobHeader-information"><h1>QA Analyst</h1><span class="css-x">Hooli</span></div>"#,
        );
        let hit = indeed(&p).unwrap();
        assert_eq!(value(&hit, JobField::Title), Some("QA Analyst"));
        assert_eq!(value(&hit, JobField::Company), Some("Hooli"));
        assert_eq!(value(&hit, JobField::Locations), None);
    }

    #[test]
    fn test_indeed_location_keeps_later_dashes() {
        let p = page(
            "https://www.indeed.com/viewjob",
            r#"<div class="ia-JobHeader-information"><h1>Dev</h1><span class="css-y">Hooli - Winston-Salem, NC</span></div>"#,
        );
        let hit = indeed(&p).unwrap();
        assert_eq!(value(&hit, JobField::Locations), Some("Winston - Salem, NC"));
    }

    #[test]
    fn test_indeed_header_only_company_is_no_hit() {
        let p = page(
            "https://www.indeed.com/viewjob",
            r#"<div class="ia-JobHeader-information"><span class="css-x">Hooli</span></div>"#,
        );
        assert!(indeed(&p).is_none());
    }

    #[test]
    fn test_linkedin_top_card() {
        let p = page(
            "https://www.linkedin.com/jobs/view/123",
            r#"<div class="job-details-jobs-unified-top-card__job-title"><h1>ML Engineer</h1></div>
               <div class="job-details-jobs-unified-top-card__company-name"><a href="/company/x">Pied Piper</a></div>
               <div class="job-details-jobs-unified-top-card__primary-description-container"><span>Palo Alto, CA</span></div>
               <div class="jobs-description__content"><p>Train models.</p></div>"#,
        );
        let hit = linkedin(&p).unwrap();
        assert_eq!(value(&hit, JobField::Title), Some("ML Engineer"));
        assert_eq!(value(&hit, JobField::Company), Some("Pied Piper"));
        assert_eq!(value(&hit, JobField::Locations), Some("Palo Alto, CA"));
        assert_eq!(value(&hit, JobField::Description), Some("Train models."));
        let desc_selector = &hit
            .fields
            .iter()
            .find(|(f, _)| *f == JobField::Description)
            .unwrap()
            .1
            .selector;
        assert_eq!(desc_selector, "linkedin:div.jobs-description__content");
    }

    #[test]
    fn test_linkedin_title_anchor_fallback() {
        let p = page(
            "https://www.linkedin.com/jobs/view/123",
            r#"<a data-test-app-aware-link href="/jobs/view/123">Backend Dev</a>"#,
        );
        let hit = linkedin(&p).unwrap();
        assert_eq!(value(&hit, JobField::Title), Some("Backend Dev"));
    }
}
