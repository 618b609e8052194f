//! Body heuristics: ordered selector lists and container scans, tried only
//! for fields the earlier tiers left empty.

use std::sync::OnceLock;

use regex::Regex;
use scraper::ElementRef;

use super::page::{clean_icon_tokens, formatted_text, inline_text, Page};
use super::Found;

const MAX_COMPANY_CHARS: usize = 200;
const MAX_LOCATION_CHARS: usize = 300;

const TITLE_SELECTORS: &[&str] = &[
    "h1",
    ".job-title",
    ".jobTitle",
    "job_title",
    "[data-job-title]",
    r#"[data-qa="job-title"]"#,
    "h1.title",
    ".title",
    ".position-title",
    ".job-name",
    r#"[itemprop="title"]"#,
    ".posting-title",
];

const COMPANY_CONTAINERS: &str =
    r#"[class*="company"], [class*="employer"], [class*="organization"], [data-company]"#;

const COMPANY_SELECTORS: &[&str] = &[
    ".company",
    ".job-company",
    ".jobCompany",
    "[data-company]",
    ".employer",
    ".organization",
    ".company-name",
    ".employer-name",
];

const LOCATION_CONTAINERS: &str = r#"[class*="location"], [class*="city"], [class*="address"], [data-location], [data-testid="location"]"#;

const LOCATION_SELECTORS: &[&str] = &[
    ".location",
    ".job-location",
    ".jobLocation",
    "[data-location]",
    r#"[data-qa="location"]"#,
    ".city",
    ".place",
    ".job-place",
    ".address",
    ".job-address",
    r#"[itemprop="jobLocation"]"#,
    ".location-text",
    r#"[data-testid="location"]"#,
];

const DESCRIPTION_CONTAINERS: &[&str] = &[
    "#job-description",
    ".job-details-content",
    r#"[itemprop="description"]"#,
    ".job-description",
    ".jobDescription",
    "article.job-details",
    r#"[class*="description"]"#,
    r#"[class*="details"]"#,
    "article",
    "main",
];

fn first_by_selector(
    page: &Page,
    selectors: &[&str],
    read: fn(ElementRef<'_>) -> String,
) -> Option<Found> {
    selectors.iter().find_map(|sel| {
        page.select_first(sel)
            .and_then(|el| Found::new(read(el), format!("body:{sel}")))
    })
}

/// Scans every element matching `containers` and takes the first whose
/// icon-cleaned text is non-empty and shorter than `max_chars`.
fn container_scan(
    page: &Page,
    containers: &str,
    max_chars: usize,
    label: fn(ElementRef<'_>) -> String,
) -> Option<Found> {
    page.select_all(containers).into_iter().find_map(|el| {
        let text = clean_icon_tokens(&inline_text(el));
        if text.is_empty() || text.chars().count() >= max_chars {
            return None;
        }
        Found::new(text, format!("body:container:{}", label(el)))
    })
}

fn class_or_tag(el: ElementRef<'_>) -> String {
    el.value()
        .attr("class")
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.trim().to_string())
        .unwrap_or_else(|| el.value().name().to_string())
}

fn class_testid_or_tag(el: ElementRef<'_>) -> String {
    el.value()
        .attr("class")
        .or_else(|| el.value().attr("data-testid"))
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.trim().to_string())
        .unwrap_or_else(|| el.value().name().to_string())
}

fn icon_cleaned_text(el: ElementRef<'_>) -> String {
    clean_icon_tokens(&inline_text(el))
}

pub fn title(page: &Page) -> Option<Found> {
    first_by_selector(page, TITLE_SELECTORS, inline_text)
}

pub fn company_container(page: &Page) -> Option<Found> {
    container_scan(page, COMPANY_CONTAINERS, MAX_COMPANY_CHARS, class_or_tag)
}

pub fn company_selector(page: &Page) -> Option<Found> {
    first_by_selector(page, COMPANY_SELECTORS, inline_text)
}

/// Meta lines such as `Job ID: 3059253 | Amazon.com Services LLC` or `Company: Acme`.
pub fn company_meta_line(page: &Page) -> Option<Found> {
    static PIPE: OnceLock<Regex> = OnceLock::new();
    static LABEL: OnceLock<Regex> = OnceLock::new();
    let pipe = PIPE.get_or_init(|| Regex::new(r"\|\s*(.+)$").expect("valid regex"));
    let label = LABEL.get_or_init(|| Regex::new(r"(?i)Company\s*:\s*(.+)$").expect("valid regex"));

    let el = page.select_first(r#"p.meta, .meta, [class*="meta"]"#)?;
    let text = inline_text(el);

    if let Some(caps) = pipe.captures(&text) {
        return Found::new(&caps[1], "body:meta-pipe");
    }
    label
        .captures(&text)
        .and_then(|caps| Found::new(&caps[1], "body:meta-label"))
}

pub fn location_container(page: &Page) -> Option<Found> {
    container_scan(page, LOCATION_CONTAINERS, MAX_LOCATION_CHARS, class_testid_or_tag)
}

pub fn location_selector(page: &Page) -> Option<Found> {
    first_by_selector(page, LOCATION_SELECTORS, icon_cleaned_text)
}

/// First description container with any text, walked with block line breaks.
pub fn description(page: &Page) -> Option<Found> {
    first_by_selector(page, DESCRIPTION_CONTAINERS, formatted_text)
}
