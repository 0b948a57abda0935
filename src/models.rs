//! Normalized records passed between the ingestor, the store and the
//! aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::enums::TimeRange;

/// Bucket labels, index 0 = Monday.
pub const WEEKDAY_LABELS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub fn weekday_labels() -> [String; 7] {
    WEEKDAY_LABELS.map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningEvent {
    pub user_id: String,
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub played_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTrackRecord {
    pub user_id: String,
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopArtistRecord {
    pub user_id: String,
    pub artist_id: String,
    pub artist_name: String,
    pub genres: Vec<String>,
    pub time_range: TimeRange,
}

/// Everything fetched for one user in one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestBatch {
    pub recent: Vec<ListeningEvent>,
    pub top_tracks: Vec<TopTrackRecord>,
    pub top_artists: Vec<TopArtistRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteCounts {
    pub inserted: u64,
    pub skipped: u64,
}

impl WriteCounts {
    pub fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.skipped += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub recent: WriteCounts,
    pub top_tracks: WriteCounts,
    pub top_artists: WriteCounts,
}

pub type GenreCounts = BTreeMap<String, u64>;

/// Result of one aggregation run, before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    pub hours: [f64; 7],
    pub genres: GenreCounts,
    pub event_count: usize,
    pub computed_at: DateTime<Utc>,
}

impl WeeklyAggregate {
    pub fn total_hours(&self) -> f64 {
        self.hours.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySnapshot {
    pub user_id: String,
    pub hours: [f64; 7],
    pub computed_at: DateTime<Utc>,
}

impl WeeklySnapshot {
    pub fn total_hours(&self) -> f64 {
        self.hours.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreSnapshot {
    pub user_id: String,
    pub genres: GenreCounts,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackPlayCount {
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub play_count: u32,
}
