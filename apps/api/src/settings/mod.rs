//! Settings routes: scoring/provider configuration and the resume used for eligibility.

pub mod handlers;
