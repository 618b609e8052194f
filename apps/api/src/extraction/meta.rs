use super::page::{inline_text, Page};
use super::Found;

const TITLE: &[&str] = &[
    r#"meta[property="og:title"]"#,
    r#"meta[name="twitter:title"]"#,
    "head > title",
];
const COMPANY: &[&str] = &[
    r#"meta[property="og:site_name"]"#,
    r#"meta[name="twitter:site"]"#,
];
const LOCATIONS: &[&str] = &[
    r#"meta[property="og:locality"]"#,
    r#"meta[name="geo.placename"]"#,
];
const DESCRIPTION: &[&str] = &[
    r#"meta[property="og:description"]"#,
    r#"meta[name="twitter:description"]"#,
    r#"meta[name="description"]"#,
];

fn first_meta(page: &Page, selectors: &[&str]) -> Option<Found> {
    selectors.iter().find_map(|sel| {
        page.select_first(sel)
            .and_then(|el| Found::new(inline_text(el), format!("meta:{sel}")))
    })
}

pub fn title(page: &Page) -> Option<Found> {
    first_meta(page, TITLE)
}

pub fn company(page: &Page) -> Option<Found> {
    first_meta(page, COMPANY)
}

pub fn locations(page: &Page) -> Option<Found> {
    first_meta(page, LOCATIONS)
}

pub fn description(page: &Page) -> Option<Found> {
    first_meta(page, DESCRIPTION)
}
