mod common;

use chrono::{Duration, Utc};
use httpmock::prelude::*;
use relay_nexus::RelayError;
use relay_nexus::db::{Filter, User, UserField, fetch};
use serde_json::json;

use common::{memory_storage, seed_user, state_for};

#[tokio::test]
async fn stale_token_is_refreshed_once() {
    let server = MockServer::start_async().await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/refresh")
                .query_param("refresh_token", "r-stale");
            then.status(200).json_body(json!({"token": "fresh-token"}));
        })
        .await;

    let storage = memory_storage().await;
    seed_user(
        &storage,
        "stale",
        Some("old-token"),
        Some("r-stale"),
        Some(Utc::now() - Duration::minutes(10)),
    )
    .await;
    let state = state_for(&server, storage.clone());

    let token = state.auth_gate.resolve("r-stale").await.unwrap();

    assert_eq!(token, "fresh-token");
    refresh.assert_calls_async(1).await;

    // The refreshed token is not written back.
    let mut db = storage.session().await.unwrap();
    let stored = fetch::<User>(&mut db, &Filter::by(UserField::RefreshToken, "r-stale"))
        .await
        .unwrap();
    assert_eq!(stored.token(), Some("old-token"));
}

#[tokio::test]
async fn fresh_token_is_returned_without_upstream_call() {
    let server = MockServer::start_async().await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(GET).path("/refresh");
            then.status(200).json_body(json!({"token": "unexpected"}));
        })
        .await;

    let storage = memory_storage().await;
    seed_user(&storage, "fresh", Some("jtoken"), Some("r-fresh"), Some(Utc::now())).await;
    let state = state_for(&server, storage);

    let token = state.auth_gate.resolve("r-fresh").await.unwrap();

    assert_eq!(token, "jtoken");
    refresh.assert_calls_async(0).await;
}

#[tokio::test]
async fn ttl_is_measured_against_the_supplied_clock() {
    let server = MockServer::start_async().await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(GET).path("/refresh");
            then.status(200).json_body(json!({"token": "later-token"}));
        })
        .await;

    let storage = memory_storage().await;
    let user = seed_user(&storage, "clock", Some("ctoken"), Some("r-clock"), Some(Utc::now())).await;
    let state = state_for(&server, storage);
    let issued = user.acc_token_ts().unwrap();

    let within = state
        .auth_gate
        .access_token(&user, issued + Duration::seconds(119))
        .await
        .unwrap();
    assert_eq!(within, "ctoken");

    let after = state
        .auth_gate
        .access_token(&user, issued + Duration::seconds(121))
        .await
        .unwrap();
    assert_eq!(after, "later-token");
    refresh.assert_calls_async(1).await;
}

#[tokio::test]
async fn unknown_bearer_is_not_found() {
    let server = MockServer::start_async().await;
    let storage = memory_storage().await;
    let state = state_for(&server, storage);

    let err = state.auth_gate.resolve("nobody").await.unwrap_err();

    assert!(matches!(err, RelayError::NotFound(ref detail) if detail == "User not found"));
}

#[tokio::test]
async fn failed_refresh_keeps_upstream_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/refresh");
            then.status(401);
        })
        .await;

    let storage = memory_storage().await;
    seed_user(&storage, "revoked", Some("rtoken"), Some("r-revoked"), Some(Utc::now() - Duration::hours(1))).await;
    let state = state_for(&server, storage);

    let err = state.auth_gate.resolve("r-revoked").await.unwrap_err();

    assert!(matches!(err, RelayError::Upstream { status: 401, .. }));
}

#[tokio::test]
async fn refresh_without_token_in_body_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/refresh");
            then.status(200).json_body(json!({"something": "else"}));
        })
        .await;

    let storage = memory_storage().await;
    seed_user(&storage, "odd", None, Some("r-odd"), None).await;
    let state = state_for(&server, storage);

    let err = state.auth_gate.resolve("r-odd").await.unwrap_err();

    assert!(matches!(err, RelayError::Upstream { status: 500, .. }));
}
