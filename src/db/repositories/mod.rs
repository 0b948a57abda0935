use chrono::{DateTime, Utc};
use sea_orm::{
    prelude::DateTimeWithTimeZone, sea_query::OnConflict, ActiveModelTrait, ColumnTrait,
    ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait, TryInsertResult,
};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::db::entities::{
    genre_distribution, jobs, recent_tracks, top_artists, top_tracks, users, weekly_distribution,
};
use crate::error::{AppError, Result};
use crate::models::{
    GenreCounts, GenreSnapshot, IngestBatch, IngestSummary, ListeningEvent, TopArtistRecord,
    TopTrackRecord, WeeklyAggregate, WeeklySnapshot,
};

fn inserted(result: TryInsertResult<u64>) -> bool {
    match result {
        TryInsertResult::Inserted(rows) => rows > 0,
        TryInsertResult::Conflicted | TryInsertResult::Empty => false,
    }
}

pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<users::Model>> {
        Ok(users::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?)
    }

    pub async fn get(&self, user_id: &str) -> Result<users::Model> {
        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User not found: {}", user_id)))
    }

    /// Snapshot of every known user id, in a stable order.
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        Ok(users::Entity::find()
            .select_only()
            .column(users::Column::UserId)
            .order_by_asc(users::Column::UserId)
            .into_tuple()
            .all(&self.db)
            .await?)
    }

    /// Persist a refreshed access token and the expiry that belongs to it.
    pub async fn store_token(
        &self,
        user: users::Model,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<users::Model> {
        let mut active: users::ActiveModel = user.into();
        active.access_token = Set(access_token);
        if let Some(rotated) = refresh_token {
            active.refresh_token = Set(rotated);
        }
        active.token_expires_at = Set(expires_at.into());
        active.updated_at = Set(now.into());
        Ok(active.update(&self.db).await?)
    }

    /// Fill in profile fields that were never recorded. Existing values win.
    pub async fn backfill_profile(
        &self,
        user_id: &str,
        display_name: Option<String>,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let user = self.get(user_id).await?;
        let fill_name = user.display_name.is_none() && display_name.is_some();
        let fill_email = user.email.is_none() && email.is_some();
        if !fill_name && !fill_email {
            return Ok(());
        }

        let mut active: users::ActiveModel = user.into();
        if fill_name {
            active.display_name = Set(display_name);
        }
        if fill_email {
            active.email = Set(email);
        }
        active.updated_at = Set(now.into());
        active.update(&self.db).await?;
        Ok(())
    }
}

pub struct EventRepository {
    db: DatabaseConnection,
}

impl EventRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Write a user's fetched batch in one transaction. Rows whose identity
    /// already exists are left untouched.
    pub async fn store_batch(
        &self,
        batch: &IngestBatch,
        now: DateTime<Utc>,
    ) -> Result<IngestSummary> {
        let txn = self.db.begin().await?;
        let mut summary = IngestSummary::default();

        for event in &batch.recent {
            summary.recent.record(insert_event(&txn, event, now).await?);
        }
        for track in &batch.top_tracks {
            summary.top_tracks.record(insert_top_track(&txn, track, now).await?);
        }
        for artist in &batch.top_artists {
            summary.top_artists.record(insert_top_artist(&txn, artist, now).await?);
        }

        txn.commit().await?;
        Ok(summary)
    }

    /// Play events with `played_at` in `[start, end)`.
    pub async fn events_in_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ListeningEvent>> {
        let start: DateTimeWithTimeZone = start.into();
        let end: DateTimeWithTimeZone = end.into();
        let rows = recent_tracks::Entity::find()
            .filter(recent_tracks::Column::UserId.eq(user_id))
            .filter(recent_tracks::Column::PlayedAt.gte(start))
            .filter(recent_tracks::Column::PlayedAt.lt(end))
            .order_by_asc(recent_tracks::Column::PlayedAt)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ListeningEvent {
                user_id: row.user_id,
                track_id: row.track_id,
                track_name: row.track_name,
                artist_name: row.artist_name,
                album_name: row.album_name,
                played_at: row.played_at.to_utc(),
                duration_ms: row.duration_ms,
            })
            .collect())
    }

    /// Genre list per artist name. The first stored record (lowest id) wins
    /// when several users have the same artist.
    pub async fn genres_for_artists(
        &self,
        artist_names: &HashSet<String>,
    ) -> Result<HashMap<String, Vec<String>>> {
        if artist_names.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = top_artists::Entity::find()
            .filter(top_artists::Column::ArtistName.is_in(artist_names.iter().cloned()))
            .order_by_asc(top_artists::Column::Id)
            .all(&self.db)
            .await?;

        let mut genres = HashMap::new();
        for row in rows {
            let list = row.genre_list();
            genres.entry(row.artist_name).or_insert(list);
        }
        Ok(genres)
    }
}

async fn insert_event<C: ConnectionTrait>(
    conn: &C,
    event: &ListeningEvent,
    now: DateTime<Utc>,
) -> Result<bool> {
    let model = recent_tracks::ActiveModel {
        user_id: Set(event.user_id.clone()),
        track_id: Set(event.track_id.clone()),
        track_name: Set(event.track_name.clone()),
        artist_name: Set(event.artist_name.clone()),
        album_name: Set(event.album_name.clone()),
        played_at: Set(event.played_at.into()),
        duration_ms: Set(event.duration_ms),
        ingested_at: Set(now.into()),
        ..Default::default()
    };

    let result = recent_tracks::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                recent_tracks::Column::UserId,
                recent_tracks::Column::TrackId,
                recent_tracks::Column::PlayedAt,
            ])
            .do_nothing()
            .to_owned(),
        )
        .do_nothing()
        .exec_without_returning(conn)
        .await?;

    Ok(inserted(result))
}

async fn insert_top_track<C: ConnectionTrait>(
    conn: &C,
    track: &TopTrackRecord,
    now: DateTime<Utc>,
) -> Result<bool> {
    let model = top_tracks::ActiveModel {
        user_id: Set(track.user_id.clone()),
        track_id: Set(track.track_id.clone()),
        track_name: Set(track.track_name.clone()),
        artist_name: Set(track.artist_name.clone()),
        album_name: Set(track.album_name.clone()),
        time_range: Set(track.time_range.into()),
        fetched_at: Set(now.into()),
        ..Default::default()
    };

    let result = top_tracks::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                top_tracks::Column::UserId,
                top_tracks::Column::TrackId,
                top_tracks::Column::TimeRange,
            ])
            .do_nothing()
            .to_owned(),
        )
        .do_nothing()
        .exec_without_returning(conn)
        .await?;

    Ok(inserted(result))
}

async fn insert_top_artist<C: ConnectionTrait>(
    conn: &C,
    artist: &TopArtistRecord,
    now: DateTime<Utc>,
) -> Result<bool> {
    let model = top_artists::ActiveModel {
        user_id: Set(artist.user_id.clone()),
        artist_id: Set(artist.artist_id.clone()),
        artist_name: Set(artist.artist_name.clone()),
        genres: Set(top_artists::join_genres(&artist.genres)),
        time_range: Set(artist.time_range.into()),
        fetched_at: Set(now.into()),
        ..Default::default()
    };

    let result = top_artists::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                top_artists::Column::UserId,
                top_artists::Column::ArtistId,
                top_artists::Column::TimeRange,
            ])
            .do_nothing()
            .to_owned(),
        )
        .do_nothing()
        .exec_without_returning(conn)
        .await?;

    Ok(inserted(result))
}

pub struct SnapshotRepository {
    db: DatabaseConnection,
}

impl SnapshotRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Replace both snapshots for a user. Either both rows change or neither.
    pub async fn replace(&self, user_id: &str, aggregate: &WeeklyAggregate) -> Result<()> {
        let weekly_json = serde_json::to_string(&aggregate.hours)?;
        let genre_json = serde_json::to_string(&aggregate.genres)?;
        let computed_at = aggregate.computed_at;

        let txn = self.db.begin().await?;

        weekly_distribution::Entity::insert(weekly_distribution::ActiveModel {
            user_id: Set(user_id.to_string()),
            distribution: Set(weekly_json),
            computed_at: Set(computed_at.into()),
        })
        .on_conflict(
            OnConflict::column(weekly_distribution::Column::UserId)
                .update_columns([
                    weekly_distribution::Column::Distribution,
                    weekly_distribution::Column::ComputedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

        genre_distribution::Entity::insert(genre_distribution::ActiveModel {
            user_id: Set(user_id.to_string()),
            distribution: Set(genre_json),
            computed_at: Set(computed_at.into()),
        })
        .on_conflict(
            OnConflict::column(genre_distribution::Column::UserId)
                .update_columns([
                    genre_distribution::Column::Distribution,
                    genre_distribution::Column::ComputedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

        txn.commit().await?;
        Ok(())
    }

    pub async fn weekly(&self, user_id: &str) -> Result<Option<WeeklySnapshot>> {
        let Some(row) = weekly_distribution::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let hours: [f64; 7] = serde_json::from_str(&row.distribution)?;
        Ok(Some(WeeklySnapshot {
            user_id: row.user_id,
            hours,
            computed_at: row.computed_at.to_utc(),
        }))
    }

    pub async fn genres(&self, user_id: &str) -> Result<Option<GenreSnapshot>> {
        let Some(row) = genre_distribution::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let genres: GenreCounts = serde_json::from_str(&row.distribution)?;
        Ok(Some(GenreSnapshot {
            user_id: row.user_id,
            genres,
            computed_at: row.computed_at.to_utc(),
        }))
    }
}

pub struct JobRepository {
    db: DatabaseConnection,
}

impl JobRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, job: jobs::ActiveModel) -> Result<jobs::Model> {
        Ok(job.insert(&self.db).await?)
    }

    pub async fn update(&self, job: jobs::ActiveModel) -> Result<jobs::Model> {
        Ok(job.update(&self.db).await?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<jobs::Model>> {
        Ok(jobs::Entity::find_by_id(id).one(&self.db).await?)
    }

    pub async fn find_recent(&self, limit: u64) -> Result<Vec<jobs::Model>> {
        Ok(jobs::Entity::find()
            .order_by_desc(jobs::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?)
    }
}
