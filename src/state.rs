use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{
    clock::SharedClock,
    config::Config,
    error::Result,
    jobs::JobQueue,
    services::{ChartRenderer, Mailer, NewsletterService, NewsletterSettings, SpotifyService},
    tasks::BatchDriver,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub clock: SharedClock,
    pub spotify: SpotifyService,
    pub charts: Arc<dyn ChartRenderer>,
    pub mailer: Arc<dyn Mailer>,
    pub job_queue: JobQueue,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        config: Config,
        clock: SharedClock,
        spotify: SpotifyService,
        charts: Arc<dyn ChartRenderer>,
        mailer: Arc<dyn Mailer>,
        job_queue: JobQueue,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            clock,
            spotify,
            charts,
            mailer,
            job_queue,
        }
    }

    pub fn batch_driver(&self) -> Result<BatchDriver> {
        BatchDriver::new(
            self.db.clone(),
            self.spotify.clone(),
            self.clock.clone(),
            &self.config,
        )
    }

    pub fn newsletter(&self) -> Result<NewsletterService> {
        Ok(NewsletterService::new(
            self.db.clone(),
            self.charts.clone(),
            self.mailer.clone(),
            self.clock.clone(),
            NewsletterSettings::from_config(&self.config)?,
        ))
    }
}
