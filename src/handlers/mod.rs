pub mod health;
pub mod jobs;
pub mod stats;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Job endpoints
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id/status", get(jobs::get_job_status))
        .route("/jobs/ingest", post(jobs::trigger_ingest))
        .route("/jobs/aggregate", post(jobs::trigger_aggregate))
        .route("/jobs/digest", post(jobs::trigger_digest))
        .route("/jobs/newsletter", post(jobs::trigger_newsletter))

        // Snapshot endpoints
        .route("/users/:user_id/weekly-distribution", get(stats::weekly_distribution))
        .route("/users/:user_id/genre-distribution", get(stats::genre_distribution))
}
