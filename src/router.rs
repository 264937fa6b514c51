use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::api::UpstreamClient;
use crate::config::Config;
use crate::db::UserStorage;
use crate::handlers::relay;
use crate::middleware::log_route;
use crate::service::{AuthGate, Interactor};

#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<Config>,
    pub storage: UserStorage,
    pub interactor: Interactor,
    pub auth_gate: AuthGate,
}

impl RelayState {
    pub fn new(config: Arc<Config>, storage: UserStorage, upstream: UpstreamClient) -> Self {
        let interactor = Interactor::new(upstream, storage.clone(), config.clone());
        let auth_gate = AuthGate::new(
            interactor.clone(),
            storage.clone(),
            config.access_token_ttl(),
        );
        Self {
            config,
            storage,
            interactor,
            auth_gate,
        }
    }
}

pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/api/simple_get_ep/", get(relay::simple_get))
        .route("/api/auth_get_ep/", get(relay::auth_get))
        .route("/api/params_get_ep/", get(relay::params_get))
        .route("/api/dynamic_url_get_ep/{uri}", get(relay::dynamic_url_get))
        .route("/api/saved_get_ep/", get(relay::saved_get))
        .route("/api/updated_get_ep/", get(relay::updated_get))
        .route("/api/simple_post_ep", post(relay::simple_post))
        .route("/api/auth_post_ep", post(relay::auth_post))
        .route("/health", get(relay::health))
        .layer(middleware::from_fn(log_route))
        .with_state(state)
}
