use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use sea_orm::DatabaseConnection;
use std::{collections::HashMap, sync::Arc};
use tracing::Instrument;

use crate::{
    clock::SharedClock,
    config::Config,
    db::repositories::{EventRepository, SnapshotRepository, UserRepository},
    error::{AppError, Result},
    models::{weekday_labels, GenreSnapshot, ListeningEvent, TrackPlayCount, WeeklySnapshot},
    report::{DeliveryReport, SkipReason, SkippedDelivery, Stage, UserFailure},
    services::{
        charts::{ChartArtifact, ChartRenderer},
        mailer::{ComposedMessage, InlineAttachment, Mailer},
    },
    templates::newsletter::{newsletter_page, NewsletterView, GENRE_CHART_CID, WEEKLY_CHART_CID},
};

pub const SUBJECT: &str = "Your Weekly Spotify Insights";
pub const FALLBACK_DISPLAY_NAME: &str = "Spotify Listener";
const TOP_TRACK_COUNT: usize = 5;

/// The calendar week a newsletter reports on, Monday through Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// The Monday..Sunday week before the one containing `now` in `offset`.
pub fn reporting_period(now: DateTime<Utc>, offset: FixedOffset) -> ReportingPeriod {
    let today = now.with_timezone(&offset).date_naive();
    let days_back = i64::from(today.weekday().num_days_from_monday()) + 7;
    let start = today - Duration::days(days_back);
    ReportingPeriod {
        start,
        end: start + Duration::days(6),
    }
}

/// Most played tracks, by play count then track name.
pub fn top_tracks(events: &[ListeningEvent], limit: usize) -> Vec<TrackPlayCount> {
    let mut counts: HashMap<&str, TrackPlayCount> = HashMap::new();
    for event in events {
        counts
            .entry(event.track_id.as_str())
            .or_insert_with(|| TrackPlayCount {
                track_id: event.track_id.clone(),
                track_name: event.track_name.clone(),
                artist_name: event.artist_name.clone(),
                play_count: 0,
            })
            .play_count += 1;
    }

    let mut ranked: Vec<TrackPlayCount> = counts.into_values().collect();
    ranked.sort_by(|a, b| {
        b.play_count
            .cmp(&a.play_count)
            .then_with(|| a.track_name.cmp(&b.track_name))
            .then_with(|| a.track_id.cmp(&b.track_id))
    });
    ranked.truncate(limit);
    ranked
}

pub struct NewsletterInput {
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub weekly: WeeklySnapshot,
    pub genres: Option<GenreSnapshot>,
    pub top_tracks: Vec<TrackPlayCount>,
    pub period: ReportingPeriod,
    pub weekly_chart: Option<ChartArtifact>,
    pub genre_chart: Option<ChartArtifact>,
    pub from: String,
    pub dashboard_url: String,
    pub created_at: DateTime<Utc>,
}

pub fn compose_newsletter(input: NewsletterInput) -> ComposedMessage {
    let display_name = input
        .display_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(FALLBACK_DISPLAY_NAME);

    let html = newsletter_page(&NewsletterView {
        display_name,
        period_start: input.period.start,
        period_end: input.period.end,
        total_hours: input.weekly.total_hours(),
        top_tracks: &input.top_tracks,
        has_weekly_chart: input.weekly_chart.is_some(),
        has_genre_chart: input.genre_chart.is_some(),
        dashboard_url: &input.dashboard_url,
    })
    .into_string();

    let attachments = [
        (WEEKLY_CHART_CID, input.weekly_chart),
        (GENRE_CHART_CID, input.genre_chart),
    ]
    .into_iter()
    .filter_map(|(cid, artifact)| {
        artifact.map(|a| InlineAttachment {
            content_id: cid.to_string(),
            content_type: a.content_type,
            path: a.path,
        })
    })
    .collect();

    ComposedMessage {
        user_id: input.user_id,
        to: input.email,
        from: input.from,
        subject: SUBJECT.to_string(),
        html,
        attachments,
        created_at: input.created_at,
    }
}

#[derive(Debug, Clone)]
pub struct NewsletterSettings {
    pub from: String,
    pub dashboard_url: String,
    pub offset: FixedOffset,
}

impl NewsletterSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let offset = config
            .report_offset()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        Ok(Self {
            from: config.mail_from.clone(),
            dashboard_url: config.dashboard_url.clone(),
            offset,
        })
    }
}

enum Delivery {
    Sent,
    Skipped(SkipReason),
}

pub struct NewsletterService {
    users: UserRepository,
    events: EventRepository,
    snapshots: SnapshotRepository,
    charts: Arc<dyn ChartRenderer>,
    mailer: Arc<dyn Mailer>,
    clock: SharedClock,
    settings: NewsletterSettings,
}

impl NewsletterService {
    pub fn new(
        db: DatabaseConnection,
        charts: Arc<dyn ChartRenderer>,
        mailer: Arc<dyn Mailer>,
        clock: SharedClock,
        settings: NewsletterSettings,
    ) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            events: EventRepository::new(db.clone()),
            snapshots: SnapshotRepository::new(db),
            charts,
            mailer,
            clock,
            settings,
        }
    }

    pub async fn send_to_all(&self) -> Result<DeliveryReport> {
        let user_ids = self.users.list_ids().await?;
        Ok(self.send_for_users(&user_ids).await)
    }

    /// One user's failure or skip never prevents delivery to the others.
    pub async fn send_for_users(&self, user_ids: &[String]) -> DeliveryReport {
        tracing::info!("Sending newsletters to {} users", user_ids.len());

        let mut report = DeliveryReport::default();
        for user_id in user_ids {
            let span = tracing::info_span!("deliver", user_id = %user_id, stage = "deliver");
            match self.send_one(user_id).instrument(span).await {
                Ok(Delivery::Sent) => report.sent.push(user_id.clone()),
                Ok(Delivery::Skipped(reason)) => {
                    tracing::info!(user_id = %user_id, ?reason, "Skipping newsletter");
                    report.skipped.push(SkippedDelivery {
                        user_id: user_id.clone(),
                        reason,
                    });
                }
                Err(e) => {
                    let e = match e {
                        e @ (AppError::Delivery(_) | AppError::NotFound(_)) => e,
                        other => AppError::Delivery(other.to_string()),
                    };
                    tracing::error!(
                        user_id = %user_id,
                        stage = "deliver",
                        error_kind = e.kind().as_str(),
                        "Newsletter failed: {}",
                        e
                    );
                    report
                        .failed
                        .push(UserFailure::new(user_id.clone(), Stage::Deliver, &e));
                }
            }
        }

        tracing::info!(
            sent = report.sent.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Newsletter run finished"
        );
        report
    }

    async fn send_one(&self, user_id: &str) -> Result<Delivery> {
        let user = self.users.get(user_id).await?;

        let email = match user.email.filter(|e| !e.trim().is_empty()) {
            Some(email) => email,
            None => return Ok(Delivery::Skipped(SkipReason::NoEmail)),
        };

        let weekly = match self.snapshots.weekly(user_id).await? {
            Some(snapshot) => snapshot,
            None => return Ok(Delivery::Skipped(SkipReason::NoSnapshot)),
        };
        let genres = self.snapshots.genres(user_id).await?;

        let now = self.clock.now();
        let events = self
            .events
            .events_in_window(user_id, now - Duration::days(7), now)
            .await?;

        let weekly_chart = self
            .charts
            .render_weekly(user_id, &weekly.hours, &weekday_labels())
            .await?;
        let genre_chart = match &genres {
            Some(snapshot) => self.charts.render_genres(user_id, &snapshot.genres).await?,
            None => None,
        };

        let message = compose_newsletter(NewsletterInput {
            user_id: user_id.to_string(),
            email,
            display_name: user.display_name,
            weekly,
            genres,
            top_tracks: top_tracks(&events, TOP_TRACK_COUNT),
            period: reporting_period(now, self.settings.offset),
            weekly_chart,
            genre_chart,
            from: self.settings.from.clone(),
            dashboard_url: self.settings.dashboard_url.clone(),
            created_at: now,
        });

        self.mailer.deliver(&message).await?;
        Ok(Delivery::Sent)
    }
}
