pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::jobs::handlers as jobs;
use crate::settings::handlers as settings;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs
        .route(
            "/api/v1/jobs",
            get(jobs::handle_list_jobs)
                .post(jobs::handle_force_save)
                .delete(jobs::handle_clear_jobs),
        )
        .route("/api/v1/jobs/:index", delete(jobs::handle_remove_job))
        .route("/api/v1/jobs/scrape", post(jobs::handle_scrape))
        .route("/api/v1/jobs/score", post(jobs::handle_score))
        .route("/api/v1/jobs/export", get(jobs::handle_export))
        // Settings
        .route(
            "/api/v1/settings",
            get(settings::handle_get_settings).put(settings::handle_put_settings),
        )
        .route(
            "/api/v1/settings/resume",
            post(settings::handle_upload_resume).delete(settings::handle_delete_resume),
        )
        .route("/api/v1/settings/validate-key", post(settings::handle_validate_key))
        .with_state(state)
}
