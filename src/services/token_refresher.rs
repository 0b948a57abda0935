use chrono::{DateTime, Duration, Utc};
use sea_orm::DatabaseConnection;

use crate::{
    clock::SharedClock,
    db::repositories::UserRepository,
    error::{AppError, Result},
    services::SpotifyService,
};

/// Hands out access tokens that are valid at the time of the call.
///
/// A stored token is returned as-is while `now < token_expires_at`. Once it
/// has expired, exactly one refresh exchange is made and its result persisted
/// before the new token is returned. Failed exchanges are not retried; the
/// next scheduled cycle is the retry.
pub struct TokenRefresher {
    users: UserRepository,
    spotify: SpotifyService,
    clock: SharedClock,
}

impl TokenRefresher {
    pub fn new(db: DatabaseConnection, spotify: SpotifyService, clock: SharedClock) -> Self {
        Self {
            users: UserRepository::new(db),
            spotify,
            clock,
        }
    }

    pub async fn get_valid_token(&self, user_id: &str) -> Result<String> {
        let user = self.users.get(user_id).await?;

        if self.clock.now() < user.token_expires_at.to_utc() {
            return Ok(user.access_token);
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let response = self
            .spotify
            .refresh_token(&user.refresh_token)
            .await
            .map_err(|e| AppError::Refresh {
                user_id: user_id.to_string(),
                reason: e.to_string(),
            })?;

        let now = self.clock.now();
        let expires_at =
            token_expiry(now, response.expires_in).ok_or_else(|| AppError::Refresh {
                user_id: user_id.to_string(),
                reason: format!("invalid expires_in: {}", response.expires_in),
            })?;
        let access_token = response.access_token;

        self.users
            .store_token(
                user,
                access_token.clone(),
                response.refresh_token,
                expires_at,
                now,
            )
            .await
            .map_err(|e| AppError::Refresh {
                user_id: user_id.to_string(),
                reason: format!("could not store refreshed token: {}", e),
            })?;

        tracing::debug!(user_id, %expires_at, "Stored refreshed access token");
        Ok(access_token)
    }
}

/// Expiry for a token issued at `now` that lives `expires_in` seconds.
/// Negative or unrepresentable lifetimes yield `None`.
fn token_expiry(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    if expires_in < 0 {
        return None;
    }
    now.checked_add_signed(Duration::try_seconds(expires_in)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_now;

    #[test]
    fn test_token_expiry() {
        assert_eq!(
            token_expiry(test_now(), 3600),
            Some(test_now() + Duration::hours(1))
        );
        assert_eq!(token_expiry(test_now(), 0), Some(test_now()));
        assert_eq!(token_expiry(test_now(), -1), None);
        assert_eq!(token_expiry(test_now(), 9_000_000_000_000_000), None);
        assert_eq!(token_expiry(test_now(), i64::MAX), None);
    }
}
