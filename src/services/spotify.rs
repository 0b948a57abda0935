use chrono::{DateTime, Utc};
use governor::{
    clock::DefaultClock, state::direct::NotKeyed, state::InMemoryState, Quota, RateLimiter,
};
use nonzero_ext::nonzero;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    config::Config,
    db::enums::TimeRange,
    error::{AppError, Result},
};

/// Shared, cheaply cloneable handle to the Spotify Web API.
///
/// Holds no user credentials; per-user calls go through a [`UserClient`]
/// built with [`SpotifyService::for_token`].
#[derive(Clone)]
pub struct SpotifyService {
    client: Client,
    client_id: String,
    client_secret: Option<String>,
    accounts_url: String,
    api_url: String,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyArtistRef {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyAlbumRef {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTrack {
    /// `None` for local files, which have no stable identifier.
    pub id: Option<String>,
    pub name: String,
    pub duration_ms: i64,
    pub album: SpotifyAlbumRef,
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub artists: Vec<SpotifyArtistRef>,
}

impl SpotifyTrack {
    /// Name of the first credited artist, as the rest of the pipeline keys on it.
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayHistoryItem {
    pub track: SpotifyTrack,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Page<T> {
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    items: Vec<T>,
}

/// Deserialize null or missing as empty vec
fn deserialize_null_as_empty_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    let opt: Option<Vec<T>> = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

impl SpotifyService {
    pub fn from_config(config: &Config) -> Result<Self> {
        // Rate limiter: 2 requests per second to stay under Spotify's ~3 req/sec limit
        let quota = Quota::per_second(nonzero!(2u32));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let client = Client::builder().timeout(config.http_timeout()).build()?;

        Ok(Self {
            client,
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
            accounts_url: config.spotify_accounts_url.trim_end_matches('/').to_string(),
            api_url: config.spotify_api_url.trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.rate_limiter.until_ready().await;

        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let response = self
            .client
            .post(format!("{}/api/token", self.accounts_url))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::ExternalApi(format!(
                "Token exchange rejected ({}): {}",
                status, error_text
            )));
        }

        Ok(response.json().await?)
    }

    /// The underlying HTTP client, shared with other outbound callers.
    pub fn http_client(&self) -> Client {
        self.client.clone()
    }

    /// Client bound to one user's freshly validated access token.
    pub fn for_token(&self, access_token: impl Into<String>) -> UserClient {
        UserClient {
            service: self.clone(),
            access_token: access_token.into(),
        }
    }
}

pub struct UserClient {
    service: SpotifyService,
    access_token: String,
}

impl UserClient {
    pub async fn top_tracks(&self, range: TimeRange, limit: u32) -> Result<Vec<SpotifyTrack>> {
        let page: Page<SpotifyTrack> = self
            .get_json(
                "/me/top/tracks",
                &[
                    ("time_range", range.api_value().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(page.items)
    }

    pub async fn top_artists(&self, range: TimeRange, limit: u32) -> Result<Vec<SpotifyArtist>> {
        let page: Page<SpotifyArtist> = self
            .get_json(
                "/me/top/artists",
                &[
                    ("time_range", range.api_value().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(page.items)
    }

    pub async fn recently_played(&self, limit: u32) -> Result<Vec<PlayHistoryItem>> {
        let page: Page<PlayHistoryItem> = self
            .get_json("/me/player/recently-played", &[("limit", limit.to_string())])
            .await?;
        Ok(page.items)
    }

    pub async fn current_profile(&self) -> Result<SpotifyProfile> {
        self.get_json("/me", &[]).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        self.service.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.service.api_url, path);
        let response = self
            .service
            .client
            .get(&url)
            .query(query)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::ExternalApi(format!(
                "Spotify API error ({}): {}",
                status, error_text
            )));
        }

        // Get raw text first to enable better error messages
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!("Failed to parse response from {} at column {}: {}", path, e.column(), e);
            AppError::ExternalApi(format!("Failed to parse Spotify response from {}: {}", path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_history_parses_local_file_without_id() {
        let raw = r#"{
            "items": [{
                "track": {
                    "id": null,
                    "name": "Demo Take",
                    "duration_ms": 120000,
                    "album": {"id": null, "name": "Local Files"},
                    "artists": [{"id": null, "name": "Me"}]
                },
                "played_at": "2024-01-01T10:00:00.123Z"
            }]
        }"#;

        let page: Page<PlayHistoryItem> = serde_json::from_str(raw).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.items[0].track.id.is_none());
        assert_eq!(page.items[0].track.primary_artist(), "Me");
        assert_eq!(
            page.items[0].played_at.to_rfc3339(),
            "2024-01-01T10:00:00.123+00:00"
        );
    }

    fn parse_page<T: DeserializeOwned>(raw: &str) -> Page<T> {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_pages_of_any_item_type_accept_null_or_missing_items() {
        assert!(parse_page::<SpotifyTrack>(r#"{"items": null}"#).items.is_empty());
        assert!(parse_page::<SpotifyArtist>(r#"{}"#).items.is_empty());
        assert!(parse_page::<PlayHistoryItem>(r#"{"items": []}"#).items.is_empty());

        let artists: Page<SpotifyArtist> =
            parse_page(r#"{"items": [{"id": "a1", "name": "Band", "genres": ["rock"]}]}"#);
        assert_eq!(artists.items[0].genres, vec!["rock"]);
    }

    #[test]
    fn test_artist_genres_null_becomes_empty() {
        let raw = r#"{"id": "a1", "name": "Nameless", "genres": null}"#;
        let artist: SpotifyArtist = serde_json::from_str(raw).unwrap();
        assert!(artist.genres.is_empty());
    }

    #[test]
    fn test_primary_artist_defaults_to_empty() {
        let track = SpotifyTrack {
            id: Some("t1".into()),
            name: "Untitled".into(),
            duration_ms: 1000,
            album: SpotifyAlbumRef {
                id: None,
                name: "Unknown".into(),
            },
            artists: vec![],
        };
        assert_eq!(track.primary_artist(), "");
    }
}
