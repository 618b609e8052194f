use serde_json::Value;
use tracing::debug;

use super::page::{html_fragment_to_text, Page};

/// Fields taken from a schema.org `JobPosting` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: Option<String>,
}

/// First `JobPosting` across all JSON-LD blocks. Blocks that fail to parse are skipped.
pub fn find_job_posting(page: &Page) -> Option<SchemaPosting> {
    page.json_ld_blocks().iter().find_map(|raw| {
        let data: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                debug!("skipping malformed JSON-LD block: {e}");
                return None;
            }
        };
        find_posting_value(&data).map(to_posting)
    })
}

/// The raw JSON text of the first block that contains a `JobPosting`.
pub fn job_posting_block(page: &Page) -> Option<String> {
    page.json_ld_blocks().into_iter().find(|raw| {
        serde_json::from_str::<Value>(raw)
            .map(|data| find_posting_value(&data).is_some())
            .unwrap_or(false)
    })
}

fn find_posting_value(data: &Value) -> Option<&Value> {
    let candidates: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("@graph") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => vec![data],
        },
        _ => vec![],
    };
    candidates.into_iter().find(|item| is_job_posting(item))
}

fn is_job_posting(item: &Value) -> bool {
    match item.get("@type") {
        Some(Value::String(t)) => t == "JobPosting",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("JobPosting")),
        _ => false,
    }
}

fn to_posting(item: &Value) -> SchemaPosting {
    let text = |v: Option<&Value>| v.and_then(Value::as_str).unwrap_or_default().trim().to_string();

    let location = match item.get("jobLocation") {
        Some(Value::Array(places)) => places.first(),
        other => other,
    }
    .and_then(|place| place.get("address"))
    .and_then(|addr| addr.get("addressLocality"));

    SchemaPosting {
        title: text(item.get("title")),
        company: text(item.get("hiringOrganization").and_then(|o| o.get("name"))),
        location: text(location),
        description: html_fragment_to_text(item.get("description").and_then(Value::as_str).unwrap_or_default()),
        url: item.get("url").and_then(Value::as_str).map(str::to_string),
    }
}
