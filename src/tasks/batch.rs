use futures::{stream, StreamExt};
use sea_orm::DatabaseConnection;
use tracing::Instrument;

use crate::{
    clock::SharedClock,
    config::Config,
    db::repositories::UserRepository,
    error::{AppError, Result},
    report::{BatchReport, Stage, UserFailure},
    services::{SpotifyService, TokenRefresher},
    tasks::{
        aggregate::WeeklyAggregator,
        ingest::{EventIngestor, IngestLimits},
    },
};

/// Which stages a cycle runs for each user. Stages always run in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// refresh -> ingest
    Ingest,
    /// aggregate
    Aggregate,
    /// refresh -> ingest -> aggregate
    Full,
}

impl CycleKind {
    fn stages(&self) -> &'static [Stage] {
        match self {
            Self::Ingest => &[Stage::Refresh, Stage::Ingest],
            Self::Aggregate => &[Stage::Aggregate],
            Self::Full => &[Stage::Refresh, Stage::Ingest, Stage::Aggregate],
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Self::Ingest => "ingest",
            Self::Aggregate => "aggregate",
            Self::Full => "full",
        }
    }
}

/// Runs pipeline cycles over every known user with a bounded worker pool.
pub struct BatchDriver {
    users: UserRepository,
    refresher: TokenRefresher,
    spotify: SpotifyService,
    ingestor: EventIngestor,
    aggregator: WeeklyAggregator,
    concurrency: usize,
}

impl BatchDriver {
    pub fn new(
        db: DatabaseConnection,
        spotify: SpotifyService,
        clock: SharedClock,
        config: &Config,
    ) -> Result<Self> {
        let offset = config
            .report_offset()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        Ok(Self {
            users: UserRepository::new(db.clone()),
            refresher: TokenRefresher::new(db.clone(), spotify.clone(), clock.clone()),
            spotify,
            ingestor: EventIngestor::new(db.clone(), clock.clone(), IngestLimits::from_config(config)),
            aggregator: WeeklyAggregator::new(db, clock, offset),
            concurrency: config.sync_concurrency.max(1),
        })
    }

    pub async fn run_cycle(&self) -> Result<BatchReport> {
        self.run(CycleKind::Full).await
    }

    pub async fn run_ingest_cycle(&self) -> Result<BatchReport> {
        self.run(CycleKind::Ingest).await
    }

    pub async fn run_aggregate_cycle(&self) -> Result<BatchReport> {
        self.run(CycleKind::Aggregate).await
    }

    /// Only a failure to load the user list is returned as an error. Per-user
    /// failures are recorded in the report.
    pub async fn run(&self, kind: CycleKind) -> Result<BatchReport> {
        let user_ids = self.users.list_ids().await?;

        tracing::info!(
            cycle = kind.as_str(),
            users = user_ids.len(),
            concurrency = self.concurrency,
            "Starting batch cycle"
        );

        let outcomes: Vec<(String, std::result::Result<(), UserFailure>)> = stream::iter(user_ids)
            .map(|user_id| async move {
                let outcome = self.process_user(&user_id, kind).await;
                (user_id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (user_id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded.push(user_id),
                Err(failure) => report.failed.push(failure),
            }
        }
        report.normalize();

        tracing::info!(
            cycle = kind.as_str(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Batch cycle finished"
        );

        Ok(report)
    }

    /// The first failing stage ends processing for the user.
    async fn process_user(
        &self,
        user_id: &str,
        kind: CycleKind,
    ) -> std::result::Result<(), UserFailure> {
        let mut token: Option<String> = None;

        for &stage in kind.stages() {
            let span = tracing::info_span!("user_stage", user_id, stage = stage.as_str());
            let result = self
                .run_stage(user_id, stage, &mut token)
                .instrument(span)
                .await;

            if let Err(e) = result {
                tracing::error!(
                    user_id,
                    stage = stage.as_str(),
                    error_kind = e.kind().as_str(),
                    "Stage failed: {}",
                    error_chain(&e)
                );
                return Err(UserFailure::new(user_id, stage, &e));
            }
        }

        Ok(())
    }

    async fn run_stage(
        &self,
        user_id: &str,
        stage: Stage,
        token: &mut Option<String>,
    ) -> Result<()> {
        match stage {
            Stage::Refresh => {
                *token = Some(self.refresher.get_valid_token(user_id).await?);
            }
            Stage::Ingest => {
                let access_token = match token.take() {
                    Some(t) => t,
                    None => self.refresher.get_valid_token(user_id).await?,
                };
                let client = self.spotify.for_token(access_token);
                self.ingestor.ingest(user_id, &client).await?;
            }
            Stage::Aggregate => {
                self.aggregator.aggregate(user_id).await?;
            }
            Stage::Deliver => {
                return Err(AppError::Internal(
                    "delivery is not a batch cycle stage".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Error message followed by its sources.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(
            CycleKind::Full.stages(),
            &[Stage::Refresh, Stage::Ingest, Stage::Aggregate]
        );
        assert_eq!(CycleKind::Ingest.stages(), &[Stage::Refresh, Stage::Ingest]);
        assert_eq!(CycleKind::Aggregate.stages(), &[Stage::Aggregate]);
    }

    #[test]
    fn test_error_chain_skips_repeated_text() {
        let err = AppError::ingest(AppError::ExternalApi("Spotify API error (500)".into()));
        let chain = error_chain(&err);
        assert_eq!(chain, "Ingestion failed: External API error: Spotify API error (500)");
    }
}
