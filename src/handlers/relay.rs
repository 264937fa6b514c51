//! Relay routes. Each one receives its input, optionally authenticates,
//! calls the interactor and turns a non-success envelope into an error.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::Envelope;
use crate::error::RelayError;
use crate::middleware::AccessToken;
use crate::router::RelayState;

type EnvelopeResult = Result<Json<Envelope>, RelayError>;

fn respond(envelope: Envelope) -> EnvelopeResult {
    Ok(Json(envelope.into_result()?))
}

#[derive(Debug, Deserialize)]
pub struct ParamsQuery {
    pub param1: String,
    pub param_2_optional: Option<String>,
}

/// GET /api/simple_get_ep/
pub async fn simple_get(State(state): State<RelayState>, _token: AccessToken) -> EnvelopeResult {
    respond(state.interactor.simple_get().await)
}

/// GET /api/auth_get_ep/ -> forwards the resolved access token upstream.
pub async fn auth_get(
    State(state): State<RelayState>,
    AccessToken(token): AccessToken,
) -> EnvelopeResult {
    respond(state.interactor.auth_get(&token).await)
}

/// GET /api/params_get_ep/?param1=..&param_2_optional=..
pub async fn params_get(
    State(state): State<RelayState>,
    Query(params): Query<ParamsQuery>,
) -> EnvelopeResult {
    respond(
        state
            .interactor
            .params_get(&params.param1, params.param_2_optional.as_deref())
            .await,
    )
}

/// GET /api/dynamic_url_get_ep/{uri}
pub async fn dynamic_url_get(
    State(state): State<RelayState>,
    Path(uri): Path<String>,
) -> EnvelopeResult {
    respond(state.interactor.dynamic_url_get(&uri).await)
}

/// GET /api/saved_get_ep/
pub async fn saved_get(State(state): State<RelayState>) -> EnvelopeResult {
    respond(state.interactor.saved_get().await?)
}

/// GET /api/updated_get_ep/
pub async fn updated_get(State(state): State<RelayState>) -> EnvelopeResult {
    respond(state.interactor.updated_get().await?)
}

/// POST /api/simple_post_ep
pub async fn simple_post(State(state): State<RelayState>, Json(body): Json<Value>) -> EnvelopeResult {
    respond(state.interactor.simple_post(&body).await)
}

/// POST /api/auth_post_ep
pub async fn auth_post(
    State(state): State<RelayState>,
    AccessToken(token): AccessToken,
    Json(body): Json<Value>,
) -> EnvelopeResult {
    respond(state.interactor.auth_post(&body, &token).await)
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
