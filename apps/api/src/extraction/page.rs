//! Parsed page snapshot plus the text-walking helpers every tier shares.
//!
//! `scraper::Html` is neither `Send` nor `Sync`, so a `Page` lives only inside
//! one synchronous extraction call and never crosses an `.await`.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{node::Node, ElementRef, Html, Selector};
use url::Url;

/// Elements whose text never belongs to a field value.
pub const NOISE_TAGS: &[&str] = &[
    "script", "style", "link", "button", "input", "noscript", "nav", "footer", "header", "iframe",
    "svg",
];

/// Elements after which the description walker emits a line break.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "h1", "h2", "h3", "h4", "h5", "h6", "br", "hr", "tr", "table", "ul", "ol",
];

pub struct Page {
    pub url: Url,
    pub host: String,
    doc: Html,
}

impl Page {
    pub fn new(url: Url, html: &str) -> Self {
        let host = url.host_str().unwrap_or_default().to_string();
        Self {
            url,
            host,
            doc: Html::parse_document(html),
        }
    }

    pub fn select_first(&self, css: &str) -> Option<ElementRef<'_>> {
        let selector = Selector::parse(css).ok()?;
        self.doc.select(&selector).next()
    }

    pub fn select_all(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(selector) => self.doc.select(&selector).collect(),
            Err(_) => vec![],
        }
    }

    /// `<title>` text, used as context in the LLM prompt.
    pub fn document_title(&self) -> String {
        self.select_first("head > title")
            .map(inline_text)
            .unwrap_or_default()
    }

    pub fn json_ld_blocks(&self) -> Vec<String> {
        self.select_all(r#"script[type="application/ld+json"]"#)
            .into_iter()
            .map(|el| el.text().collect::<String>())
            .collect()
    }

    /// The main content container, or `<body>` when none matches.
    pub fn main_content(&self) -> Option<ElementRef<'_>> {
        self.select_first(
            r#"main, article, [role="main"], .content, #content, .job-description, .job-details"#,
        )
        .or_else(|| self.select_first("body"))
    }
}

/// Text of an element with whitespace collapsed, skipping noise subtrees.
/// `<meta>` elements yield their `content` attribute.
pub fn inline_text(el: ElementRef<'_>) -> String {
    if el.value().name() == "meta" {
        return el.value().attr("content").unwrap_or_default().trim().to_string();
    }
    let mut raw = String::new();
    collect_text(el, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(element) if NOISE_TAGS.contains(&element.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of an element with block elements turned into line breaks and
/// runs of blank lines collapsed to one empty line.
pub fn formatted_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    walk_formatted(el, &mut out);
    collapse_blank_lines(&out)
}

fn walk_formatted(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
                out.push_str(text);
            }
            Node::Element(element) => {
                let name = element.name();
                if NOISE_TAGS.contains(&name) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    walk_formatted(child_el, out);
                }
                if BLOCK_TAGS.contains(&name) && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn collapse_blank_lines(text: &str) -> String {
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    let re = BLANK_RUNS.get_or_init(|| Regex::new(r"(\n\s*){2,}").expect("valid regex"));
    re.replace_all(text, "\n\n").trim().to_string()
}

/// Renders an HTML fragment (e.g. a JSON-LD description) as formatted text.
pub fn html_fragment_to_text(fragment: &str) -> String {
    let html = Html::parse_fragment(fragment);
    formatted_text(html.root_element())
}

/// Removes Material icon ligature names that leak into container text.
pub fn clean_icon_tokens(text: &str) -> String {
    static ICON_TOKENS: OnceLock<Regex> = OnceLock::new();
    let re = ICON_TOKENS.get_or_init(|| {
        Regex::new(r"(?i)\b(location_on|place|work|business|apartment|map|room)\b")
            .expect("valid regex")
    });
    collapse_whitespace(&re.replace_all(text, ""))
}

/// Truncates to `budget` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> Page {
        Page::new(Url::parse("https://careers.example.com/jobs/42").unwrap(), html)
    }

    #[test]
    fn test_inline_text_skips_noise_and_collapses() {
        let p = page(
            "<div id=x>  Senior\n  <b>Engineer</b><script>var a = 1;</script><button>Apply</button></div>",
        );
        assert_eq!(inline_text(p.select_first("#x").unwrap()), "Senior Engineer");
    }

    #[test]
    fn test_inline_text_reads_meta_content() {
        let p = page(r#"<html><head><meta property="og:title" content=" Data Analyst "></head></html>"#);
        let el = p.select_first(r#"meta[property="og:title"]"#).unwrap();
        assert_eq!(inline_text(el), "Data Analyst");
    }

    #[test]
    fn test_formatted_text_keeps_block_breaks() {
        let p = page(
            "<div id=d><h2>About</h2><p>We build tools.</p><ul><li>Rust</li><li>SQL</li></ul><p></p><p></p><p>Apply now</p></div>",
        );
        let text = formatted_text(p.select_first("#d").unwrap());
        assert_eq!(text, "About\nWe build tools.\nRust\nSQL\nApply now");
    }

    #[test]
    fn test_formatted_text_collapses_blank_runs() {
        assert_eq!(collapse_blank_lines("a\n\n\n  \nb\n"), "a\n\nb");
    }

    #[test]
    fn test_html_fragment_to_text() {
        assert_eq!(
            html_fragment_to_text("<p>Build <strong>APIs</strong></p><p>Ship often</p>"),
            "Build APIs\nShip often"
        );
    }

    #[test]
    fn test_clean_icon_tokens() {
        assert_eq!(clean_icon_tokens("location_on Berlin, Germany"), "Berlin, Germany");
        assert_eq!(clean_icon_tokens("Workday Inc"), "Workday Inc");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("ééé", 2), "éé...");
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        let p = page("<p>x</p>");
        assert!(p.select_first("p[[").is_none());
        assert!(p.select_all("p[[").is_empty());
    }
}
