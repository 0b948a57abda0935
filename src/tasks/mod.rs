use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{db::enums::JobType, state::AppState};

pub mod aggregate;
pub mod batch;
pub mod digest;
pub mod ingest;

pub use aggregate::WeeklyAggregator;
pub use batch::{BatchDriver, CycleKind};
pub use ingest::{EventIngestor, IngestLimits};

/// Register the daily ingest and weekly digest cycles. Each tick only
/// submits a job; the executor does the work.
pub async fn start_scheduler(state: AppState) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let ingest_schedule = state.config.ingest_schedule.clone();
    scheduler
        .add(scheduled_submit(state.clone(), &ingest_schedule, JobType::IngestCycle)?)
        .await?;
    tracing::info!("Ingest cycle scheduled: {}", ingest_schedule);

    let digest_schedule = state.config.digest_schedule.clone();
    scheduler
        .add(scheduled_submit(state.clone(), &digest_schedule, JobType::DigestCycle)?)
        .await?;
    tracing::info!("Digest cycle scheduled: {}", digest_schedule);

    scheduler.start().await?;

    Ok(scheduler)
}

fn scheduled_submit(state: AppState, schedule: &str, job_type: JobType) -> Result<Job> {
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let state = state.clone();
        Box::pin(async move {
            if let Err(e) = state
                .job_queue
                .submit(&state.db, job_type, state.clock.now())
                .await
            {
                tracing::error!("Failed to submit scheduled {} job: {}", job_type.as_str(), e);
            }
        })
    })?;

    Ok(job)
}
