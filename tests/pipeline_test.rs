//! Integration tests for the sync-and-aggregate pipeline
//!
//! Runs the token refresher, ingestor, aggregator and batch driver against
//! an in-memory database and a mocked music service to verify:
//! - Stored tokens are only refreshed once expired
//! - Re-ingesting the same data never duplicates rows
//! - Weekday buckets account for every event in the window
//! - One user's failure never affects the others

mod common;

use chrono::{Duration, FixedOffset, TimeZone, Utc};
use pretty_assertions::assert_eq;
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};
use std::sync::Arc;
use wiremock::MockServer;

use beat_digest::{
    clock::{Clock, FixedClock, SharedClock},
    db::{
        entities::{recent_tracks, top_artists, top_tracks, users},
        repositories::{EventRepository, SnapshotRepository},
    },
    error::{AppError, ErrorKind},
    models::{GenreCounts, IngestBatch, ListeningEvent, WeeklyAggregate},
    report::Stage,
    services::{SpotifyService, TokenRefresher},
    tasks::{EventIngestor, IngestLimits, WeeklyAggregator},
    test_utils::*,
};
use common::*;

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

fn spotify_for(server: &MockServer) -> SpotifyService {
    SpotifyService::from_config(&test_config_for(&server.uri())).unwrap()
}

fn clock_at(now: chrono::DateTime<Utc>) -> (Arc<FixedClock>, SharedClock) {
    let clock = Arc::new(FixedClock::new(now));
    let shared: SharedClock = clock.clone();
    (clock, shared)
}

fn event(
    user_id: &str,
    track_id: &str,
    played_at: chrono::DateTime<Utc>,
    duration_ms: i64,
) -> ListeningEvent {
    ListeningEvent {
        user_id: user_id.into(),
        track_id: track_id.into(),
        track_name: format!("Track {}", track_id),
        artist_name: "Band".into(),
        album_name: "Album".into(),
        played_at,
        duration_ms,
    }
}

// ============================================================================
// Token refresher
// ============================================================================

#[tokio::test]
async fn test_fresh_token_is_returned_without_refresh() {
    let server = MockServer::start().await;
    mount_refresh(&server, "refresh-u1", "new-u1", None, 0).await;

    let db = setup_test_db().await;
    create_fresh_test_user(&db, "u1", None).await;
    let (_, clock) = clock_at(test_now());

    let refresher = TokenRefresher::new(db.clone(), spotify_for(&server), clock);
    let token = refresher.get_valid_token("u1").await.unwrap();

    assert_eq!(token, "access-u1");
}

#[tokio::test]
async fn test_expired_token_is_refreshed_exactly_once() {
    let server = MockServer::start().await;
    mount_refresh(&server, "refresh-u1", "new-u1", Some("rotated-u1"), 1).await;

    let db = setup_test_db().await;
    // Expiry equal to now counts as expired
    create_test_user(&db, "u1", None, test_now()).await;
    let (_, clock) = clock_at(test_now());

    let refresher = TokenRefresher::new(db.clone(), spotify_for(&server), clock);
    assert_eq!(refresher.get_valid_token("u1").await.unwrap(), "new-u1");

    let stored = users::Entity::find_by_id("u1".to_string())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "new-u1");
    assert_eq!(stored.refresh_token, "rotated-u1");
    assert_eq!(stored.token_expires_at.to_utc(), test_now() + Duration::seconds(3600));

    // Now fresh: no second exchange
    assert_eq!(refresher.get_valid_token("u1").await.unwrap(), "new-u1");
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token_when_not_rotated() {
    let server = MockServer::start().await;
    mount_refresh(&server, "refresh-u1", "new-u1", None, 1).await;

    let db = setup_test_db().await;
    create_test_user(&db, "u1", None, test_now() - Duration::minutes(5)).await;
    let (_, clock) = clock_at(test_now());

    TokenRefresher::new(db.clone(), spotify_for(&server), clock)
        .get_valid_token("u1")
        .await
        .unwrap();

    let stored = users::Entity::find_by_id("u1".to_string())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.refresh_token, "refresh-u1");
}

#[tokio::test]
async fn test_rejected_refresh_is_a_refresh_error() {
    let server = MockServer::start().await;
    mount_rejected_refresh(&server, "refresh-u1").await;

    let db = setup_test_db().await;
    create_test_user(&db, "u1", None, test_now() - Duration::hours(1)).await;
    let (_, clock) = clock_at(test_now());

    let err = TokenRefresher::new(db.clone(), spotify_for(&server), clock)
        .get_valid_token("u1")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Refresh { ref user_id, .. } if user_id == "u1"));
    assert_eq!(err.kind(), ErrorKind::Refresh);

    let stored = users::Entity::find_by_id("u1".to_string())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "access-u1");
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let server = MockServer::start().await;
    let db = setup_test_db().await;
    let (_, clock) = clock_at(test_now());

    let err = TokenRefresher::new(db, spotify_for(&server), clock)
        .get_valid_token("ghost")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_unusable_token_lifetime_is_a_refresh_error() {
    for expires_in in [-60, 9_000_000_000_000_000] {
        let server = MockServer::start().await;
        mount_refresh_with_lifetime(&server, "refresh-u1", "new-u1", expires_in).await;

        let db = setup_test_db().await;
        create_test_user(&db, "u1", None, test_now()).await;
        let (_, clock) = clock_at(test_now());

        let err = TokenRefresher::new(db.clone(), spotify_for(&server), clock)
            .get_valid_token("u1")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Refresh, "expires_in {}", expires_in);
        assert!(err.to_string().contains("invalid expires_in"));

        let stored = users::Entity::find_by_id("u1".to_string())
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token, "access-u1");
    }
}

#[tokio::test]
async fn test_failed_token_write_is_a_refresh_error() {
    let server = MockServer::start().await;
    mount_refresh(&server, "refresh-u1", "new-u1", None, 1).await;

    let db = setup_test_db().await;
    create_test_user(&db, "u1", None, test_now()).await;
    db.execute_unprepared(
        "CREATE TRIGGER users_read_only BEFORE UPDATE ON users \
         BEGIN SELECT RAISE(ABORT, 'users are read only'); END;",
    )
    .await
    .unwrap();
    let (_, clock) = clock_at(test_now());

    let err = TokenRefresher::new(db.clone(), spotify_for(&server), clock)
        .get_valid_token("u1")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Refresh);
    assert!(err.to_string().contains("could not store refreshed token"));
}

// ============================================================================
// Event ingestor
// ============================================================================

fn sample_api() -> UserApi {
    let t1 = track_json(Some("t1"), "One", "Band", 180_000);
    let t2 = track_json(Some("t2"), "Two", "Band", 240_000);
    let local = track_json(None, "Demo", "Me", 60_000);

    UserApi {
        top_tracks: vec![t1.clone(), local.clone()],
        top_artists: vec![artist_json("ar1", "Band", &["zouk", "afrobeat"])],
        recent: vec![
            play_json(t1.clone(), "2024-01-08T10:00:00Z"),
            play_json(t1, "2024-01-08T10:00:00Z"),
            play_json(t2, "2024-01-09T09:00:00Z"),
            play_json(local, "2024-01-09T10:00:00Z"),
        ],
        email: Some("u1@example.com".into()),
    }
}

#[tokio::test]
async fn test_ingest_twice_stores_each_identity_once() {
    let server = MockServer::start().await;
    mount_user_api(&server, "access-u1", sample_api()).await;

    let db = setup_test_db().await;
    create_fresh_test_user(&db, "u1", None).await;
    let (_, clock) = clock_at(test_now());

    let spotify = spotify_for(&server);
    let client = spotify.for_token("access-u1");
    let ingestor = EventIngestor::new(db.clone(), clock, IngestLimits::default());

    let first = ingestor.ingest("u1", &client).await.unwrap();
    assert_eq!(first.recent.inserted, 2);
    assert_eq!(first.recent.skipped, 1);
    // One track and one artist, once per time range
    assert_eq!(first.top_tracks.inserted, 3);
    assert_eq!(first.top_artists.inserted, 3);

    let second = ingestor.ingest("u1", &client).await.unwrap();
    assert_eq!(second.recent.inserted, 0);
    assert_eq!(second.top_tracks.inserted, 0);
    assert_eq!(second.top_artists.inserted, 0);

    assert_eq!(recent_tracks::Entity::find().count(&db).await.unwrap(), 2);
    assert_eq!(top_tracks::Entity::find().count(&db).await.unwrap(), 3);
    assert_eq!(top_artists::Entity::find().count(&db).await.unwrap(), 3);

    let artist = top_artists::Entity::find().one(&db).await.unwrap().unwrap();
    assert_eq!(artist.genres, "zouk,afrobeat");
}

#[tokio::test]
async fn test_ingest_backfills_missing_email() {
    let server = MockServer::start().await;
    mount_user_api(&server, "access-u1", sample_api()).await;

    let db = setup_test_db().await;
    create_fresh_test_user(&db, "u1", None).await;
    let (_, clock) = clock_at(test_now());

    let spotify = spotify_for(&server);
    EventIngestor::new(db.clone(), clock, IngestLimits::default())
        .ingest("u1", &spotify.for_token("access-u1"))
        .await
        .unwrap();

    let user = users::Entity::find_by_id("u1".to_string())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.email.as_deref(), Some("u1@example.com"));
    // Existing display name is kept
    assert_eq!(user.display_name.as_deref(), Some("u1 name"));
}

#[tokio::test]
async fn test_failed_fetch_stores_nothing() {
    let server = MockServer::start().await;
    mount_failing_user_api(&server, "access-u1").await;

    let db = setup_test_db().await;
    create_fresh_test_user(&db, "u1", None).await;
    let (_, clock) = clock_at(test_now());

    let spotify = spotify_for(&server);
    let err = EventIngestor::new(db.clone(), clock, IngestLimits::default())
        .ingest("u1", &spotify.for_token("access-u1"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Ingest);
    assert!(err.to_string().contains("500"));
    assert_eq!(recent_tracks::Entity::find().count(&db).await.unwrap(), 0);
    assert_eq!(top_tracks::Entity::find().count(&db).await.unwrap(), 0);
}

// ============================================================================
// Weekly aggregator
// ============================================================================

#[tokio::test]
async fn test_dedup_and_weekday_buckets() {
    let db = setup_test_db().await;
    create_fresh_test_user(&db, "u1", None).await;
    create_test_top_artist(&db, "u1", "ar1", "Band", &["rock", "indie"]).await;

    let monday = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    let tuesday = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
    let batch = IngestBatch {
        recent: vec![
            event("u1", "t1", monday, 180_000),
            event("u1", "t1", monday, 180_000),
            event("u1", "t2", tuesday, 240_000),
        ],
        ..Default::default()
    };
    let summary = EventRepository::new(db.clone())
        .store_batch(&batch, test_now())
        .await
        .unwrap();
    assert_eq!(summary.recent.inserted, 2);
    assert_eq!(recent_tracks::Entity::find().count(&db).await.unwrap(), 2);

    let (_, clock) = clock_at(Utc.with_ymd_and_hms(2024, 1, 7, 12, 0, 0).unwrap());
    let aggregate = WeeklyAggregator::new(db.clone(), clock, utc())
        .aggregate("u1")
        .await
        .unwrap();

    assert!((aggregate.hours[0] - 0.05).abs() < 1e-9);
    assert!((aggregate.hours[1] - 0.0667).abs() < 1e-4);
    assert!(aggregate.hours[2..].iter().all(|h| *h == 0.0));
    assert_eq!(
        aggregate.genres,
        GenreCounts::from([("indie".to_string(), 2), ("rock".to_string(), 2)])
    );

    let stored = SnapshotRepository::new(db.clone())
        .weekly("u1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.hours, aggregate.hours);
}

#[tokio::test]
async fn test_window_is_right_exclusive() {
    let db = setup_test_db().await;
    create_fresh_test_user(&db, "u1", None).await;

    let now = test_now();
    create_test_recent_track(&db, "u1", "start", "Band", now - Duration::days(7), 3_600_000).await;
    let just_before = now - Duration::days(7) - Duration::seconds(1);
    create_test_recent_track(&db, "u1", "too-old", "Band", just_before, 3_600_000).await;
    create_test_recent_track(&db, "u1", "at-now", "Band", now, 3_600_000).await;

    let (_, clock) = clock_at(now);
    let aggregate = WeeklyAggregator::new(db, clock, utc())
        .aggregate("u1")
        .await
        .unwrap();

    assert_eq!(aggregate.event_count, 1);
    assert_eq!(aggregate.total_hours(), 1.0);
}

#[tokio::test]
async fn test_bucket_sum_matches_window_total() {
    let db = setup_test_db().await;
    create_fresh_test_user(&db, "u1", None).await;

    let now = test_now();
    let mut expected = 0.0;
    for i in 0..20 {
        let played_at = now - Duration::hours(3 + i * 8);
        let duration_ms = 90_000 + i * 7_000;
        create_test_recent_track(&db, "u1", &format!("t{}", i), "Band", played_at, duration_ms).await;
        expected += duration_ms as f64 / 3_600_000.0;
    }

    let (_, clock) = clock_at(now);
    let aggregate = WeeklyAggregator::new(db, clock, FixedOffset::east_opt(330 * 60).unwrap())
        .aggregate("u1")
        .await
        .unwrap();

    assert_eq!(aggregate.event_count, 20);
    assert!((aggregate.total_hours() - expected).abs() < 1e-9);
}

#[tokio::test]
async fn test_empty_window_still_replaces_snapshot() {
    let db = setup_test_db().await;
    create_fresh_test_user(&db, "u1", None).await;

    let snapshots = SnapshotRepository::new(db.clone());
    snapshots
        .replace(
            "u1",
            &WeeklyAggregate {
                hours: [1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                genres: GenreCounts::from([("rock".to_string(), 4)]),
                event_count: 5,
                computed_at: test_now() - Duration::days(7),
            },
        )
        .await
        .unwrap();

    let (clock, shared) = clock_at(test_now());
    WeeklyAggregator::new(db.clone(), shared, utc())
        .aggregate("u1")
        .await
        .unwrap();

    let weekly = snapshots.weekly("u1").await.unwrap().unwrap();
    let genres = snapshots.genres("u1").await.unwrap().unwrap();
    assert_eq!(weekly.hours, [0.0; 7]);
    assert_eq!(weekly.computed_at, clock.now());
    assert!(genres.genres.is_empty());
}

// ============================================================================
// Batch driver
// ============================================================================

#[tokio::test]
async fn test_one_failing_user_does_not_affect_others() {
    let server = MockServer::start().await;
    mount_user_api(&server, "access-u1", sample_api()).await;
    mount_failing_user_api(&server, "access-u2").await;
    mount_user_api(&server, "access-u3", sample_api()).await;

    let dir = tempfile::tempdir().unwrap();
    let (state, _receiver, _clock) = setup_test_app_state_in(&server.uri(), dir.path()).await;
    for user_id in ["u1", "u2", "u3"] {
        create_fresh_test_user(&state.db, user_id, None).await;
    }

    let report = state.batch_driver().unwrap().run_cycle().await.unwrap();

    assert_eq!(report.succeeded, vec!["u1", "u3"]);
    assert_eq!(report.failed.len(), 1);
    let failure = report.failure_for("u2").unwrap();
    assert_eq!(failure.stage, Stage::Ingest);
    assert_eq!(failure.kind, ErrorKind::Ingest);

    let snapshots = SnapshotRepository::new(state.db.clone());
    assert!(snapshots.weekly("u1").await.unwrap().is_some());
    assert!(snapshots.weekly("u2").await.unwrap().is_none());
    assert!(snapshots.weekly("u3").await.unwrap().is_some());

    // u1 and u3 each stored their two distinct plays
    assert_eq!(recent_tracks::Entity::find().count(&state.db).await.unwrap(), 4);
}

#[tokio::test]
async fn test_refresh_failure_skips_ingest_and_keeps_snapshot() {
    let server = MockServer::start().await;
    mount_rejected_refresh(&server, "refresh-u1").await;
    forbid_user_api(&server, "access-u1").await;
    mount_user_api(&server, "access-u2", sample_api()).await;

    let dir = tempfile::tempdir().unwrap();
    let (state, _receiver, _clock) = setup_test_app_state_in(&server.uri(), dir.path()).await;
    create_test_user(&state.db, "u1", None, test_now() - Duration::hours(2)).await;
    create_fresh_test_user(&state.db, "u2", None).await;

    let previous = WeeklyAggregate {
        hours: [0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        genres: GenreCounts::from([("jazz".to_string(), 1)]),
        event_count: 1,
        computed_at: test_now() - Duration::days(7),
    };
    let snapshots = SnapshotRepository::new(state.db.clone());
    snapshots.replace("u1", &previous).await.unwrap();

    let report = state.batch_driver().unwrap().run_cycle().await.unwrap();

    assert_eq!(report.succeeded, vec!["u2"]);
    let failure = report.failure_for("u1").unwrap();
    assert_eq!(failure.stage, Stage::Refresh);
    assert_eq!(failure.kind, ErrorKind::Refresh);

    let kept = snapshots.weekly("u1").await.unwrap().unwrap();
    assert_eq!(kept.hours, previous.hours);
    assert_eq!(kept.computed_at, previous.computed_at);
}

#[tokio::test]
async fn test_aggregate_cycle_makes_no_external_calls() {
    let server = MockServer::start().await;
    forbid_user_api(&server, "access-u1").await;

    let dir = tempfile::tempdir().unwrap();
    let (state, _receiver, _clock) = setup_test_app_state_in(&server.uri(), dir.path()).await;
    create_test_user(&state.db, "u1", None, test_now() - Duration::hours(2)).await;
    create_test_recent_track(&state.db, "u1", "t1", "Band", test_now() - Duration::days(1), 600_000).await;

    let report = state.batch_driver().unwrap().run_aggregate_cycle().await.unwrap();

    assert_eq!(report.succeeded, vec!["u1"]);
    let weekly = SnapshotRepository::new(state.db.clone())
        .weekly("u1")
        .await
        .unwrap()
        .unwrap();
    assert!((weekly.total_hours() - 600_000.0 / 3_600_000.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_ingest_cycle_does_not_aggregate() {
    let server = MockServer::start().await;
    mount_user_api(&server, "access-u1", sample_api()).await;

    let dir = tempfile::tempdir().unwrap();
    let (state, _receiver, _clock) = setup_test_app_state_in(&server.uri(), dir.path()).await;
    create_fresh_test_user(&state.db, "u1", None).await;

    let report = state.batch_driver().unwrap().run_ingest_cycle().await.unwrap();

    assert_eq!(report.succeeded, vec!["u1"]);
    assert_eq!(recent_tracks::Entity::find().count(&state.db).await.unwrap(), 2);
    assert!(SnapshotRepository::new(state.db.clone())
        .weekly("u1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_unusable_token_lifetime_fails_only_that_user() {
    let server = MockServer::start().await;
    mount_refresh_with_lifetime(&server, "refresh-u1", "new-u1", 9_000_000_000_000_000).await;
    forbid_user_api(&server, "access-u1").await;
    forbid_user_api(&server, "new-u1").await;
    mount_user_api(&server, "access-u2", sample_api()).await;

    let dir = tempfile::tempdir().unwrap();
    let (state, _receiver, _clock) = setup_test_app_state_in(&server.uri(), dir.path()).await;
    create_test_user(&state.db, "u1", None, test_now()).await;
    create_fresh_test_user(&state.db, "u2", None).await;

    let report = state.batch_driver().unwrap().run_cycle().await.unwrap();

    assert_eq!(report.succeeded, vec!["u2"]);
    let failure = report.failure_for("u1").unwrap();
    assert_eq!(failure.stage, Stage::Refresh);
    assert_eq!(failure.kind, ErrorKind::Refresh);
    assert!(failure.message.contains("invalid expires_in"));
}

#[tokio::test]
async fn test_failed_snapshot_write_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let (state, _receiver, _clock) = setup_test_app_state_in(&server.uri(), dir.path()).await;
    create_fresh_test_user(&state.db, "u1", None).await;
    let played_at = test_now() - Duration::days(1);
    create_test_recent_track(&state.db, "u1", "t1", "Band", played_at, 600_000).await;

    let previous = WeeklyAggregate {
        hours: [0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        genres: GenreCounts::from([("jazz".to_string(), 1)]),
        event_count: 1,
        computed_at: test_now() - Duration::days(7),
    };
    let snapshots = SnapshotRepository::new(state.db.clone());
    snapshots.replace("u1", &previous).await.unwrap();

    // The genre upsert runs after the weekly one inside the same transaction
    state
        .db
        .execute_unprepared("DROP TABLE genre_distribution")
        .await
        .unwrap();

    let report = state.batch_driver().unwrap().run_aggregate_cycle().await.unwrap();

    assert!(report.succeeded.is_empty());
    let failure = report.failure_for("u1").unwrap();
    assert_eq!(failure.stage, Stage::Aggregate);
    assert_eq!(failure.kind, ErrorKind::Aggregation);

    let kept = snapshots.weekly("u1").await.unwrap().unwrap();
    assert_eq!(kept.hours, previous.hours);
    assert_eq!(kept.computed_at, previous.computed_at);
}
