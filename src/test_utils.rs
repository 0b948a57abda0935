//! Test utilities for Beat Digest
//!
//! Provides helpers for creating isolated test environments with:
//! - In-memory SQLite databases (one per test)
//! - A pinned clock
//! - AppState factories pointed at a mock music service
//! - Test data generators

use chrono::{DateTime, Duration, TimeZone, Utc};
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use std::{path::Path, sync::Arc};

use crate::{
    clock::FixedClock,
    config::Config,
    db::{
        entities::{jobs, recent_tracks, top_artists, users},
        enums::{JobStatus, JobType, TimeRange},
    },
    jobs::{JobMessage, JobQueue},
    services::{OutboxMailer, SpotifyService, SvgChartRenderer},
    state::AppState,
};

/// Setup an in-memory SQLite database with all migrations applied
///
/// Each call creates a fresh, isolated database perfect for parallel testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Wednesday 2024-01-10 12:00 UTC
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0)
        .single()
        .expect("valid test timestamp")
}

/// Create a test configuration with sensible defaults
pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 3000,
        spotify_client_id: "test_client_id".to_string(),
        spotify_client_secret: Some("test_client_secret".to_string()),
        spotify_accounts_url: "http://127.0.0.1:9".to_string(),
        spotify_api_url: "http://127.0.0.1:9/v1".to_string(),
        http_timeout_secs: 5,
        top_items_limit: 20,
        recent_plays_limit: 50,
        sync_concurrency: 4,
        report_utc_offset_minutes: 0,
        ingest_schedule: "0 0 3 * * *".to_string(),
        digest_schedule: "0 0 9 * * Mon".to_string(),
        charts_dir: "charts".to_string(),
        mail_from: "digest@example.com".to_string(),
        mail_relay_url: None,
        mail_relay_token: None,
        mail_outbox_dir: "outbox".to_string(),
        dashboard_url: "http://localhost:5174".to_string(),
    }
}

/// Config whose music service endpoints point at `server_uri` (a mock server)
pub fn test_config_for(server_uri: &str) -> Config {
    Config {
        spotify_accounts_url: server_uri.to_string(),
        spotify_api_url: format!("{}/v1", server_uri),
        ..test_config()
    }
}

/// Create a complete test AppState
///
/// The music service is `server_uri`, the clock is pinned to [`test_now`],
/// charts and mail go under `work_dir`. The returned receiver must be kept
/// alive for job submission to succeed.
pub async fn setup_test_app_state_in(
    server_uri: &str,
    work_dir: &Path,
) -> (AppState, tokio::sync::mpsc::UnboundedReceiver<JobMessage>, Arc<FixedClock>) {
    let db = setup_test_db().await;
    let mut config = test_config_for(server_uri);
    config.charts_dir = work_dir.join("charts").to_string_lossy().into_owned();
    config.mail_outbox_dir = work_dir.join("outbox").to_string_lossy().into_owned();

    let clock = Arc::new(FixedClock::new(test_now()));
    let spotify = SpotifyService::from_config(&config).expect("Failed to build Spotify client");
    let charts = Arc::new(SvgChartRenderer::new(&config.charts_dir));
    let mailer = Arc::new(OutboxMailer::new(&config.mail_outbox_dir));
    let (job_queue, receiver) = JobQueue::new();

    let state = AppState::new(db, config, clock.clone(), spotify, charts, mailer, job_queue);
    (state, receiver, clock)
}

/// AppState with its work files under the system temp directory
pub async fn setup_test_app_state(
    server_uri: &str,
) -> (AppState, tokio::sync::mpsc::UnboundedReceiver<JobMessage>) {
    let work_dir = std::env::temp_dir().join(format!("beat-digest-{}", uuid::Uuid::new_v4()));
    let (state, receiver, _clock) = setup_test_app_state_in(server_uri, &work_dir).await;
    (state, receiver)
}

// ============================================================================
// Test Data Factories
// ============================================================================

/// Create a test user whose access token expires at `expires_at`
pub async fn create_test_user(
    db: &DatabaseConnection,
    user_id: &str,
    email: Option<&str>,
    expires_at: DateTime<Utc>,
) -> users::Model {
    let now = test_now().into();
    let user = users::ActiveModel {
        user_id: Set(user_id.to_string()),
        display_name: Set(Some(format!("{} name", user_id))),
        email: Set(email.map(|e| e.to_string())),
        access_token: Set(format!("access-{}", user_id)),
        refresh_token: Set(format!("refresh-{}", user_id)),
        token_expires_at: Set(expires_at.into()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    user.insert(db).await.expect("Failed to insert test user")
}

/// Create a user whose stored token is still valid at [`test_now`]
pub async fn create_fresh_test_user(
    db: &DatabaseConnection,
    user_id: &str,
    email: Option<&str>,
) -> users::Model {
    create_test_user(db, user_id, email, test_now() + Duration::hours(1)).await
}

/// Create a stored play event
pub async fn create_test_recent_track(
    db: &DatabaseConnection,
    user_id: &str,
    track_id: &str,
    artist_name: &str,
    played_at: DateTime<Utc>,
    duration_ms: i64,
) -> recent_tracks::Model {
    let event = recent_tracks::ActiveModel {
        user_id: Set(user_id.to_string()),
        track_id: Set(track_id.to_string()),
        track_name: Set(format!("Track {}", track_id)),
        artist_name: Set(artist_name.to_string()),
        album_name: Set("Test Album".to_string()),
        played_at: Set(played_at.into()),
        duration_ms: Set(duration_ms),
        ingested_at: Set(test_now().into()),
        ..Default::default()
    };

    event.insert(db).await.expect("Failed to insert test recent track")
}

/// Create a stored top artist with its genre list
pub async fn create_test_top_artist(
    db: &DatabaseConnection,
    user_id: &str,
    artist_id: &str,
    artist_name: &str,
    genres: &[&str],
) -> top_artists::Model {
    let genres: Vec<String> = genres.iter().map(|g| g.to_string()).collect();
    let artist = top_artists::ActiveModel {
        user_id: Set(user_id.to_string()),
        artist_id: Set(artist_id.to_string()),
        artist_name: Set(artist_name.to_string()),
        genres: Set(top_artists::join_genres(&genres)),
        time_range: Set(TimeRange::Short.into()),
        fetched_at: Set(test_now().into()),
        ..Default::default()
    };

    artist.insert(db).await.expect("Failed to insert test top artist")
}

/// Create a test job in the database
pub async fn create_test_job(
    db: &DatabaseConnection,
    job_type: JobType,
    status: JobStatus,
) -> jobs::Model {
    let now = test_now().into();
    let job = jobs::ActiveModel {
        id: Set(uuid::Uuid::new_v4()),
        job_type: Set(job_type.as_str().to_string()),
        status: Set(status.as_str().to_string()),
        total_items: Set(None),
        processed_items: Set(None),
        failed_items: Set(None),
        error_message: Set(None),
        report: Set(None),
        started_at: Set(None),
        completed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    job.insert(db).await.expect("Failed to insert test job")
}
