use sea_orm::DatabaseConnection;

use crate::{
    clock::SharedClock,
    config::Config,
    db::{
        enums::TimeRange,
        repositories::{EventRepository, UserRepository},
    },
    error::{AppError, Result},
    models::{IngestBatch, IngestSummary, ListeningEvent, TopArtistRecord, TopTrackRecord},
    services::spotify::{PlayHistoryItem, SpotifyArtist, SpotifyTrack, UserClient},
};

#[derive(Debug, Clone, Copy)]
pub struct IngestLimits {
    pub top_items: u32,
    pub recent_plays: u32,
}

impl IngestLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_items: config.top_items_limit,
            recent_plays: config.recent_plays_limit,
        }
    }
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            top_items: 20,
            recent_plays: 50,
        }
    }
}

/// Pulls a user's top items and recent plays and stores them with
/// insert-if-absent semantics.
pub struct EventIngestor {
    events: EventRepository,
    users: UserRepository,
    clock: SharedClock,
    limits: IngestLimits,
}

impl EventIngestor {
    pub fn new(db: DatabaseConnection, clock: SharedClock, limits: IngestLimits) -> Self {
        Self {
            events: EventRepository::new(db.clone()),
            users: UserRepository::new(db),
            clock,
            limits,
        }
    }

    /// Fetch everything first, then write it in a single transaction. Any
    /// fetch or storage failure leaves the user's stored data unchanged.
    pub async fn ingest(&self, user_id: &str, client: &UserClient) -> Result<IngestSummary> {
        let batch = self.fetch(user_id, client).await.map_err(AppError::ingest)?;

        let summary = self
            .events
            .store_batch(&batch, self.clock.now())
            .await
            .map_err(AppError::ingest)?;

        tracing::debug!(
            user_id,
            recent_inserted = summary.recent.inserted,
            recent_skipped = summary.recent.skipped,
            top_tracks_inserted = summary.top_tracks.inserted,
            top_artists_inserted = summary.top_artists.inserted,
            "Stored ingestion batch"
        );

        self.backfill_profile(user_id, client).await;

        Ok(summary)
    }

    pub async fn fetch(&self, user_id: &str, client: &UserClient) -> Result<IngestBatch> {
        let mut batch = IngestBatch::default();

        for range in TimeRange::ALL {
            let tracks = client.top_tracks(range, self.limits.top_items).await?;
            batch
                .top_tracks
                .extend(tracks.iter().filter_map(|t| to_top_track(user_id, t, range)));

            let artists = client.top_artists(range, self.limits.top_items).await?;
            batch
                .top_artists
                .extend(artists.iter().map(|a| to_top_artist(user_id, a, range)));
        }

        let recent = client.recently_played(self.limits.recent_plays).await?;
        batch
            .recent
            .extend(recent.iter().filter_map(|item| to_listening_event(user_id, item)));

        tracing::debug!(
            user_id,
            recent = batch.recent.len(),
            top_tracks = batch.top_tracks.len(),
            top_artists = batch.top_artists.len(),
            "Fetched listening data"
        );

        Ok(batch)
    }

    async fn backfill_profile(&self, user_id: &str, client: &UserClient) {
        let profile = match client.current_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(user_id, "Could not fetch profile: {}", e);
                return;
            }
        };

        if let Err(e) = self
            .users
            .backfill_profile(user_id, profile.display_name, profile.email, self.clock.now())
            .await
        {
            tracing::warn!(user_id, "Could not update profile: {}", e);
        }
    }
}

pub fn to_listening_event(user_id: &str, item: &PlayHistoryItem) -> Option<ListeningEvent> {
    let track_id = item.track.id.clone()?;
    Some(ListeningEvent {
        user_id: user_id.to_string(),
        track_id,
        track_name: item.track.name.clone(),
        artist_name: item.track.primary_artist().to_string(),
        album_name: item.track.album.name.clone(),
        played_at: item.played_at,
        duration_ms: item.track.duration_ms,
    })
}

pub fn to_top_track(user_id: &str, track: &SpotifyTrack, range: TimeRange) -> Option<TopTrackRecord> {
    let track_id = track.id.clone()?;
    Some(TopTrackRecord {
        user_id: user_id.to_string(),
        track_id,
        track_name: track.name.clone(),
        artist_name: track.primary_artist().to_string(),
        album_name: track.album.name.clone(),
        time_range: range,
    })
}

pub fn to_top_artist(user_id: &str, artist: &SpotifyArtist, range: TimeRange) -> TopArtistRecord {
    TopArtistRecord {
        user_id: user_id.to_string(),
        artist_id: artist.id.clone(),
        artist_name: artist.name.clone(),
        genres: artist.genres.clone(),
        time_range: range,
    }
}
