//! Mock music-service endpoints shared by the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn track_json(id: Option<&str>, name: &str, artist: &str, duration_ms: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "duration_ms": duration_ms,
        "album": {"id": "al1", "name": "Album"},
        "artists": [{"id": format!("id-{}", artist), "name": artist}]
    })
}

pub fn play_json(track: Value, played_at: &str) -> Value {
    json!({"track": track, "played_at": played_at})
}

pub fn artist_json(id: &str, name: &str, genres: &[&str]) -> Value {
    json!({"id": id, "name": name, "genres": genres})
}

/// Listening data served to one access token.
#[derive(Default)]
pub struct UserApi {
    pub top_tracks: Vec<Value>,
    pub top_artists: Vec<Value>,
    pub recent: Vec<Value>,
    pub email: Option<String>,
}

fn bearer(access_token: &str) -> String {
    format!("Bearer {}", access_token)
}

/// Serve every read endpoint for `access_token`.
pub async fn mount_user_api(server: &MockServer, access_token: &str, api: UserApi) {
    Mock::given(method("GET"))
        .and(path("/v1/me/top/tracks"))
        .and(header("Authorization", bearer(access_token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": api.top_tracks})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/me/top/artists"))
        .and(header("Authorization", bearer(access_token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": api.top_artists})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player/recently-played"))
        .and(header("Authorization", bearer(access_token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": api.recent})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .and(header("Authorization", bearer(access_token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": access_token,
            "display_name": null,
            "email": api.email,
        })))
        .mount(server)
        .await;
}

/// Every read endpoint answers 500 for `access_token`.
pub async fn mount_failing_user_api(server: &MockServer, access_token: &str) {
    Mock::given(method("GET"))
        .and(header("Authorization", bearer(access_token).as_str()))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(server)
        .await;
}

/// Read endpoints for `access_token` that must never be called.
pub async fn forbid_user_api(server: &MockServer, access_token: &str) {
    Mock::given(method("GET"))
        .and(header("Authorization", bearer(access_token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(0)
        .mount(server)
        .await;
}

/// Refresh exchange for `refresh_token`, expected `times` times.
pub async fn mount_refresh(
    server: &MockServer,
    refresh_token: &str,
    new_access_token: &str,
    rotated_refresh_token: Option<&str>,
    times: u64,
) {
    let mut body = json!({
        "access_token": new_access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
    });
    if let Some(rotated) = rotated_refresh_token {
        body["refresh_token"] = json!(rotated);
    }
    mount_refresh_response(server, refresh_token, body, times).await;
}

/// Refresh exchange that grants `new_access_token` for `expires_in` seconds.
pub async fn mount_refresh_with_lifetime(
    server: &MockServer,
    refresh_token: &str,
    new_access_token: &str,
    expires_in: i64,
) {
    let body = json!({
        "access_token": new_access_token,
        "token_type": "Bearer",
        "expires_in": expires_in,
    });
    mount_refresh_response(server, refresh_token, body, 1).await;
}

async fn mount_refresh_response(
    server: &MockServer,
    refresh_token: &str,
    body: Value,
    times: u64,
) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains(format!("refresh_token={}", refresh_token)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Refresh exchange for `refresh_token` rejected as revoked.
pub async fn mount_rejected_refresh(server: &MockServer, refresh_token: &str) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains(format!("refresh_token={}", refresh_token)))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .expect(1)
        .mount(server)
        .await;
}
