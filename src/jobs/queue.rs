use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    db::{
        entities::jobs,
        enums::{JobStatus, JobType},
        repositories::JobRepository,
    },
    error::{AppError, Result},
};

/// Message sent to the job queue
#[derive(Debug, Clone)]
pub struct JobMessage {
    pub job_id: Uuid,
    pub job_type: JobType,
}

/// Job queue for async background task processing
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<JobMessage>,
}

impl JobQueue {
    /// Create a new job queue and return (queue, receiver)
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Record a pending job and hand it to the executor.
    pub async fn submit(
        &self,
        db: &DatabaseConnection,
        job_type: JobType,
        now: DateTime<Utc>,
    ) -> Result<jobs::Model> {
        let repo = JobRepository::new(db.clone());
        let job = repo
            .create(jobs::ActiveModel {
                id: Set(Uuid::new_v4()),
                job_type: Set(job_type.into()),
                status: Set(JobStatus::Pending.into()),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
                ..Default::default()
            })
            .await?;

        if let Err(e) = self.send(JobMessage {
            job_id: job.id,
            job_type,
        }) {
            let mut active: jobs::ActiveModel = job.into();
            active.status = Set(JobStatus::Failed.into());
            active.error_message = Set(Some(e.to_string()));
            active.completed_at = Set(Some(now.into()));
            repo.update(active).await?;
            return Err(e);
        }

        Ok(job)
    }

    fn send(&self, message: JobMessage) -> Result<()> {
        tracing::info!(
            "Job {} ({}) submitted to queue",
            message.job_id,
            message.job_type.as_str()
        );

        self.sender
            .send(message)
            .map_err(|e| AppError::Internal(format!("Failed to submit job: {}", e)))
    }
}
