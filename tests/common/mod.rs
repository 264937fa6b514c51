#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Utc};
use httpmock::MockServer;
use relay_nexus::api::{Envelope, UpstreamClient};
use relay_nexus::config::Config;
use relay_nexus::db::{User, UserChanges, UserStorage, save};
use relay_nexus::router::{RelayState, relay_router};
use tower::ServiceExt;
use url::Url;

pub async fn memory_storage() -> UserStorage {
    UserStorage::connect("sqlite::memory:", 1)
        .await
        .expect("failed to open in-memory storage")
}

pub async fn seed_user(
    storage: &UserStorage,
    username: &str,
    token: Option<&str>,
    refresh_token: Option<&str>,
    acc_token_ts: Option<DateTime<Utc>>,
) -> User {
    let mut changes = UserChanges::default().username(username);
    if let Some(token) = token {
        changes = changes.token(token);
    }
    if let Some(refresh_token) = refresh_token {
        changes = changes.refresh_token(refresh_token);
    }
    if let Some(ts) = acc_token_ts {
        changes = changes.acc_token_ts(ts);
    }
    let mut db = storage.session().await.expect("failed to acquire session");
    save(&mut db, &User::new(changes))
        .await
        .expect("failed to seed user")
}

pub async fn count_users(storage: &UserStorage) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(storage.pool())
        .await
        .expect("failed to count users")
}

pub fn config_for(server: &MockServer) -> Arc<Config> {
    let mut cfg = Config::default();
    cfg.upstream.base_url = Url::parse(&server.base_url()).expect("mock server url should parse");
    Arc::new(cfg)
}

pub fn state_for(server: &MockServer, storage: UserStorage) -> RelayState {
    let cfg = config_for(server);
    let upstream = UpstreamClient::new(&cfg.upstream).expect("failed to build upstream client");
    RelayState::new(cfg, storage, upstream)
}

/// Drive one request through the router and decode the envelope it returns.
pub async fn call(state: RelayState, request: Request<Body>) -> (StatusCode, Envelope) {
    let resp = relay_router(state)
        .oneshot(request)
        .await
        .expect("request failed");
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let envelope: Envelope = serde_json::from_slice(&body).unwrap_or_else(|e| {
        panic!(
            "response body was not an envelope ({e}): {}",
            String::from_utf8_lossy(&body)
        )
    });
    (status, envelope)
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header("authorization", format!("Bearer {bearer}"));
    }
    builder.body(Body::empty()).expect("failed to build request")
}
