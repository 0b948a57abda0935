use chrono::{Datelike, Duration, FixedOffset};
use sea_orm::DatabaseConnection;
use std::collections::{HashMap, HashSet};

use crate::{
    clock::SharedClock,
    db::repositories::{EventRepository, SnapshotRepository},
    error::{AppError, Result},
    models::{GenreCounts, ListeningEvent, WeeklyAggregate},
};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Bucket index of an event: its weekday in `offset`, 0 = Monday.
pub fn bucket_index(event: &ListeningEvent, offset: FixedOffset) -> usize {
    event
        .played_at
        .with_timezone(&offset)
        .weekday()
        .num_days_from_monday() as usize
}

/// Listening hours per weekday bucket. Every event lands in exactly one bucket.
pub fn bucket_hours(events: &[ListeningEvent], offset: FixedOffset) -> [f64; 7] {
    let mut hours = [0.0; 7];
    for event in events {
        hours[bucket_index(event, offset)] += event.duration_ms as f64 / MS_PER_HOUR;
    }
    hours
}

/// One increment per genre of the event's artist, per event. Artists
/// without a stored genre list contribute nothing.
pub fn count_genres(
    events: &[ListeningEvent],
    artist_genres: &HashMap<String, Vec<String>>,
) -> GenreCounts {
    let mut counts = GenreCounts::new();
    for event in events {
        let Some(genres) = artist_genres.get(&event.artist_name) else {
            continue;
        };
        for genre in genres {
            *counts.entry(genre.clone()).or_insert(0) += 1;
        }
    }
    counts
}

pub struct WeeklyAggregator {
    events: EventRepository,
    snapshots: SnapshotRepository,
    clock: SharedClock,
    offset: FixedOffset,
}

impl WeeklyAggregator {
    pub fn new(db: DatabaseConnection, clock: SharedClock, offset: FixedOffset) -> Self {
        Self {
            events: EventRepository::new(db.clone()),
            snapshots: SnapshotRepository::new(db),
            clock,
            offset,
        }
    }

    /// Recompute both distributions over `[now - 7d, now)` and replace the
    /// stored snapshots. Nothing is written until both are computed.
    pub async fn aggregate(&self, user_id: &str) -> Result<WeeklyAggregate> {
        let aggregate = self.compute(user_id).await.map_err(AppError::aggregation)?;

        self.snapshots
            .replace(user_id, &aggregate)
            .await
            .map_err(AppError::aggregation)?;

        tracing::debug!(
            user_id,
            events = aggregate.event_count,
            total_hours = aggregate.total_hours(),
            genres = aggregate.genres.len(),
            "Replaced distribution snapshots"
        );

        Ok(aggregate)
    }

    pub async fn compute(&self, user_id: &str) -> Result<WeeklyAggregate> {
        let now = self.clock.now();
        let events = self
            .events
            .events_in_window(user_id, now - Duration::days(7), now)
            .await?;

        let artists: HashSet<String> = events.iter().map(|e| e.artist_name.clone()).collect();
        let artist_genres = self.events.genres_for_artists(&artists).await?;

        Ok(WeeklyAggregate {
            hours: bucket_hours(&events, self.offset),
            genres: count_genres(&events, &artist_genres),
            event_count: events.len(),
            computed_at: now,
        })
    }
}
