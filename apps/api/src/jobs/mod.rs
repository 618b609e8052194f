//! Job routes: scraping, the saved-job list, batch scoring and CSV export.

pub mod handlers;
pub mod service;
