use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{entities::jobs, enums::JobType, repositories::JobRepository},
    error::{AppError, Result},
    state::AppState,
};

#[derive(Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub job_type: String,
    pub status: String,
    pub total_items: Option<i32>,
    pub processed_items: Option<i32>,
    pub failed_items: Option<i32>,
    pub error_message: Option<String>,
    pub report: Option<serde_json::Value>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

impl From<jobs::Model> for JobResponse {
    fn from(j: jobs::Model) -> Self {
        Self {
            id: j.id,
            job_type: j.job_type,
            status: j.status,
            total_items: j.total_items,
            processed_items: j.processed_items,
            failed_items: j.failed_items,
            error_message: j.error_message,
            report: j.report.and_then(|r| serde_json::from_str(&r).ok()),
            started_at: j.started_at.map(|dt| dt.to_rfc3339()),
            completed_at: j.completed_at.map(|dt| dt.to_rfc3339()),
            created_at: j.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct JobCreatedResponse {
    pub job_id: Uuid,
    pub status: String,
}

pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobResponse>>> {
    let jobs = JobRepository::new(state.db.clone()).find_recent(50).await?;
    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}

pub async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>> {
    let job = JobRepository::new(state.db.clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

    Ok(Json(job.into()))
}

async fn trigger(state: &AppState, job_type: JobType) -> Result<Json<JobCreatedResponse>> {
    let job = state
        .job_queue
        .submit(&state.db, job_type, state.clock.now())
        .await?;

    Ok(Json(JobCreatedResponse {
        job_id: job.id,
        status: job.status,
    }))
}

pub async fn trigger_ingest(State(state): State<AppState>) -> Result<Json<JobCreatedResponse>> {
    trigger(&state, JobType::IngestCycle).await
}

pub async fn trigger_aggregate(
    State(state): State<AppState>,
) -> Result<Json<JobCreatedResponse>> {
    trigger(&state, JobType::AggregateCycle).await
}

pub async fn trigger_digest(State(state): State<AppState>) -> Result<Json<JobCreatedResponse>> {
    trigger(&state, JobType::DigestCycle).await
}

pub async fn trigger_newsletter(
    State(state): State<AppState>,
) -> Result<Json<JobCreatedResponse>> {
    trigger(&state, JobType::Newsletter).await
}
