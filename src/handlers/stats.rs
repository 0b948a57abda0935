use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    db::repositories::{SnapshotRepository, UserRepository},
    error::{AppError, Result},
    models::{weekday_labels, GenreCounts},
    state::AppState,
};

#[derive(Serialize)]
pub struct WeeklyDistributionResponse {
    pub user_id: String,
    pub labels: [String; 7],
    pub hours: [f64; 7],
    pub computed_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct GenreDistributionResponse {
    pub user_id: String,
    pub genres: GenreCounts,
    pub computed_at: DateTime<Utc>,
}

async fn ensure_user(state: &AppState, user_id: &str) -> Result<()> {
    UserRepository::new(state.db.clone()).get(user_id).await?;
    Ok(())
}

pub async fn weekly_distribution(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<WeeklyDistributionResponse>> {
    ensure_user(&state, &user_id).await?;

    let snapshot = SnapshotRepository::new(state.db.clone())
        .weekly(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No weekly distribution yet".to_string()))?;

    Ok(Json(WeeklyDistributionResponse {
        user_id: snapshot.user_id,
        labels: weekday_labels(),
        hours: snapshot.hours,
        computed_at: snapshot.computed_at,
    }))
}

pub async fn genre_distribution(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<GenreDistributionResponse>> {
    ensure_user(&state, &user_id).await?;

    let snapshot = SnapshotRepository::new(state.db.clone())
        .genres(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No genre distribution yet".to_string()))?;

    Ok(Json(GenreDistributionResponse {
        user_id: snapshot.user_id,
        genres: snapshot.genres,
        computed_at: snapshot.computed_at,
    }))
}
