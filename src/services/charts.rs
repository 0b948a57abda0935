use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;

use crate::{
    error::Result,
    models::GenreCounts,
    templates::charts::{genre_distribution_svg, weekly_listening_svg},
};

const GENRE_CHART_LIMIT: usize = 10;

/// Opaque handle to a rendered chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartArtifact {
    pub path: PathBuf,
    pub content_type: String,
}

/// Consumer of the distribution snapshots. Empty input yields `None`.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render_weekly(
        &self,
        user_id: &str,
        hours: &[f64; 7],
        labels: &[String; 7],
    ) -> Result<Option<ChartArtifact>>;

    async fn render_genres(
        &self,
        user_id: &str,
        genres: &GenreCounts,
    ) -> Result<Option<ChartArtifact>>;
}

/// Writes SVG charts into a directory, one file per user and chart.
pub struct SvgChartRenderer {
    dir: PathBuf,
}

impl SvgChartRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn write(&self, file_name: String, svg: String) -> Result<ChartArtifact> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        fs::write(&path, svg).await?;

        tracing::debug!("Chart written to {:?}", path);

        Ok(ChartArtifact {
            path,
            content_type: "image/svg+xml".to_string(),
        })
    }
}

/// Keep user ids from escaping the chart directory.
pub fn safe_file_stem(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[async_trait]
impl ChartRenderer for SvgChartRenderer {
    async fn render_weekly(
        &self,
        user_id: &str,
        hours: &[f64; 7],
        labels: &[String; 7],
    ) -> Result<Option<ChartArtifact>> {
        if hours.iter().all(|h| *h <= 0.0) {
            return Ok(None);
        }

        let svg = weekly_listening_svg(hours, labels).into_string();
        let file_name = format!("{}_weekly_listening.svg", safe_file_stem(user_id));
        Ok(Some(self.write(file_name, svg).await?))
    }

    async fn render_genres(
        &self,
        user_id: &str,
        genres: &GenreCounts,
    ) -> Result<Option<ChartArtifact>> {
        if genres.values().all(|count| *count == 0) {
            return Ok(None);
        }

        let svg = genre_distribution_svg(genres, GENRE_CHART_LIMIT).into_string();
        let file_name = format!("{}_genre_distribution.svg", safe_file_stem(user_id));
        Ok(Some(self.write(file_name, svg).await?))
    }
}
