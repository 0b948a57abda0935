use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::{env, str::FromStr, time::Duration};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub spotify_client_id: String,
    pub spotify_client_secret: Option<String>,
    pub spotify_accounts_url: String,
    pub spotify_api_url: String,
    pub http_timeout_secs: u64,
    pub top_items_limit: u32,
    pub recent_plays_limit: u32,
    pub sync_concurrency: usize,
    pub report_utc_offset_minutes: i32,
    pub ingest_schedule: String,
    pub digest_schedule: String,
    pub charts_dir: String,
    pub mail_from: String,
    pub mail_relay_url: Option<String>,
    pub mail_relay_token: Option<String>,
    pub mail_outbox_dir: String,
    pub dashboard_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SERVER_PORT", 3000)
                .context("SERVER_PORT must be a valid port number")?,
            spotify_client_id: env::var("SPOTIFY_CLIENT_ID")
                .context("SPOTIFY_CLIENT_ID must be set")?,
            spotify_client_secret: env::var("SPOTIFY_CLIENT_SECRET").ok(),
            spotify_accounts_url: env::var("SPOTIFY_ACCOUNTS_URL")
                .unwrap_or_else(|_| "https://accounts.spotify.com".to_string()),
            spotify_api_url: env::var("SPOTIFY_API_URL")
                .unwrap_or_else(|_| "https://api.spotify.com/v1".to_string()),
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", 15)
                .context("HTTP_TIMEOUT_SECS must be a number of seconds")?,
            top_items_limit: parse_var("TOP_ITEMS_LIMIT", 20)
                .context("TOP_ITEMS_LIMIT must be a positive integer")?,
            recent_plays_limit: parse_var("RECENT_PLAYS_LIMIT", 50)
                .context("RECENT_PLAYS_LIMIT must be a positive integer")?,
            sync_concurrency: parse_var("SYNC_CONCURRENCY", 4)
                .context("SYNC_CONCURRENCY must be a positive integer")?,
            report_utc_offset_minutes: parse_var("REPORT_UTC_OFFSET_MINUTES", 0)
                .context("REPORT_UTC_OFFSET_MINUTES must be an integer")?,
            ingest_schedule: env::var("INGEST_SCHEDULE")
                .unwrap_or_else(|_| "0 0 3 * * *".to_string()),
            digest_schedule: env::var("DIGEST_SCHEDULE")
                .unwrap_or_else(|_| "0 0 9 * * Mon".to_string()),
            charts_dir: env::var("CHARTS_DIR").unwrap_or_else(|_| "charts".to_string()),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "digest@localhost".to_string()),
            mail_relay_url: env::var("MAIL_RELAY_URL").ok(),
            mail_relay_token: env::var("MAIL_RELAY_TOKEN").ok(),
            mail_outbox_dir: env::var("MAIL_OUTBOX_DIR")
                .unwrap_or_else(|_| "outbox".to_string()),
            dashboard_url: env::var("DASHBOARD_URL")
                .unwrap_or_else(|_| "http://localhost:5174".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.top_items_limit == 0 || self.top_items_limit > 50 {
            anyhow::bail!("TOP_ITEMS_LIMIT must be between 1 and 50");
        }
        if self.recent_plays_limit == 0 || self.recent_plays_limit > 50 {
            anyhow::bail!("RECENT_PLAYS_LIMIT must be between 1 and 50");
        }
        if self.sync_concurrency == 0 {
            anyhow::bail!("SYNC_CONCURRENCY must be at least 1");
        }
        self.report_offset()
            .context("REPORT_UTC_OFFSET_MINUTES is out of range")?;
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Offset used to decide which weekday an event belongs to.
    pub fn report_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.report_utc_offset_minutes * 60)
            .ok_or_else(|| anyhow::anyhow!("offset must be within +/- 24h"))
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => Ok(raw.trim().parse()?),
        Err(_) => Ok(default),
    }
}
