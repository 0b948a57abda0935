use sea_orm::Set;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    db::{
        entities::jobs,
        enums::{JobStatus, JobType},
        repositories::JobRepository,
    },
    error::{AppError, Result},
    jobs::queue::JobMessage,
    report::{BatchReport, DeliveryReport, DigestReport},
    state::AppState,
    tasks::digest::run_digest_cycle,
};

/// Counts and serialized report of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub report: String,
}

impl JobOutcome {
    fn new(total: usize, processed: usize, failed: usize, report: &impl Serialize) -> Result<Self> {
        Ok(Self {
            total,
            processed,
            failed,
            report: serde_json::to_string(report)?,
        })
    }

    pub fn from_batch(report: &BatchReport) -> Result<Self> {
        Self::new(report.total(), report.succeeded.len(), report.failed.len(), report)
    }

    pub fn from_delivery(report: &DeliveryReport) -> Result<Self> {
        let handled = report.sent.len() + report.skipped.len();
        Self::new(handled + report.failed.len(), handled, report.failed.len(), report)
    }

    pub fn from_digest(report: &DigestReport) -> Result<Self> {
        let failed = report.cycle.failed.len() + report.delivery.failed.len();
        Self::new(
            report.cycle.total(),
            report.delivery.sent.len() + report.delivery.skipped.len(),
            failed,
            report,
        )
    }
}

/// Background job executor that processes jobs from the queue
pub struct JobExecutor {
    state: AppState,
    receiver: mpsc::UnboundedReceiver<JobMessage>,
}

impl JobExecutor {
    pub fn new(state: AppState, receiver: mpsc::UnboundedReceiver<JobMessage>) -> Self {
        Self { state, receiver }
    }

    /// Start the job executor loop
    pub async fn start(mut self) {
        tracing::info!("Job executor started");

        while let Some(message) = self.receiver.recv().await {
            tracing::info!(
                "Processing job {} ({})",
                message.job_id,
                message.job_type.as_str()
            );

            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::execute_job(state, message).await {
                    tracing::error!("Job execution failed: {}", e);
                }
            });
        }

        tracing::warn!("Job executor stopped - queue closed");
    }

    /// Run one job and record how it ended.
    pub async fn execute_job(state: AppState, message: JobMessage) -> Result<()> {
        let job_id = message.job_id;
        let repo = JobRepository::new(state.db.clone());

        if let Err(e) = Self::mark_running(&state, &repo, job_id).await {
            tracing::error!("Failed to update job status to running: {}", e);
        }

        match Self::run(&state, message.job_type).await {
            Ok(outcome) => {
                tracing::info!(
                    job_id = %job_id,
                    total = outcome.total,
                    failed = outcome.failed,
                    "Job completed"
                );
                Self::finish(&state, &repo, job_id, JobStatus::Completed, Some(outcome), None).await
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, "Job failed: {}", e);
                Self::finish(&state, &repo, job_id, JobStatus::Failed, None, Some(e.to_string()))
                    .await
            }
        }
    }

    async fn run(state: &AppState, job_type: JobType) -> Result<JobOutcome> {
        match job_type {
            JobType::IngestCycle => {
                let report = state.batch_driver()?.run_ingest_cycle().await?;
                JobOutcome::from_batch(&report)
            }
            JobType::AggregateCycle => {
                let report = state.batch_driver()?.run_aggregate_cycle().await?;
                JobOutcome::from_batch(&report)
            }
            JobType::DigestCycle => {
                let driver = state.batch_driver()?;
                let newsletter = state.newsletter()?;
                let report = run_digest_cycle(&driver, &newsletter).await?;
                JobOutcome::from_digest(&report)
            }
            JobType::Newsletter => {
                let report = state.newsletter()?.send_to_all().await?;
                JobOutcome::from_delivery(&report)
            }
        }
    }

    async fn load(repo: &JobRepository, job_id: Uuid) -> Result<jobs::Model> {
        repo.find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job not found: {}", job_id)))
    }

    async fn mark_running(state: &AppState, repo: &JobRepository, job_id: Uuid) -> Result<()> {
        let now = state.clock.now();
        let mut active: jobs::ActiveModel = Self::load(repo, job_id).await?.into();
        active.status = Set(JobStatus::Running.into());
        active.started_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        repo.update(active).await?;
        Ok(())
    }

    async fn finish(
        state: &AppState,
        repo: &JobRepository,
        job_id: Uuid,
        status: JobStatus,
        outcome: Option<JobOutcome>,
        error_message: Option<String>,
    ) -> Result<()> {
        let now = state.clock.now();
        let mut active: jobs::ActiveModel = Self::load(repo, job_id).await?.into();
        active.status = Set(status.into());
        active.completed_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());

        if let Some(outcome) = outcome {
            active.total_items = Set(Some(outcome.total as i32));
            active.processed_items = Set(Some(outcome.processed as i32));
            active.failed_items = Set(Some(outcome.failed as i32));
            active.report = Set(Some(outcome.report));
        }
        if let Some(msg) = error_message {
            active.error_message = Set(Some(msg));
        }

        repo.update(active).await?;
        Ok(())
    }
}
